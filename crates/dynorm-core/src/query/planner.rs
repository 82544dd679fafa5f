//! Request planning.
//!
//! The planner turns a where clause into a [`QueryPlan`]: a targeted read when
//! the clause pins the primary hash attribute with an equality, a full-table
//! scan otherwise. In a targeted read the hash equality and at most one sort
//! condition form the key condition. Every other condition becomes a filter
//! fragment, and all filter fragments are ANDed.

use dynorm_proto::{Clause, WhereClause};
use serde::Serialize;
use tracing::debug;

use super::classify::{classify, Classification};
use super::expression::{translate, translate_any_of, Fragment, Placeholders, Position};
use crate::catalog::ModelDef;
use crate::coerce::coerce_where;
use crate::error::Error;
use crate::store::{Cursor, NameMap, ScanRequest, TargetedRead, ValueMap};

/// How the store is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Key-condition read of one partition, on the table or a secondary index.
    Lookup,
    /// Full-table scan with a filter.
    Scan,
}

/// A native read request, built fresh for each read.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Model being read.
    pub model: String,
    /// Backing table.
    pub table: String,
    /// Targeted read or scan.
    pub mode: ReadMode,
    /// Secondary index to read; `None` is the table itself.
    pub index: Option<String>,
    /// Hash equality, then the optional sort condition. Empty for scans.
    pub key_conditions: Vec<Fragment>,
    /// Remaining conditions, ANDed.
    pub filters: Vec<Fragment>,
    /// Alias to attribute name.
    pub names: NameMap,
    /// Placeholder to value.
    pub values: ValueMap,
    /// Classification the plan was derived from.
    pub classification: Classification,
    key_condition: Option<String>,
    filter: Option<String>,
}

impl QueryPlan {
    /// The full key condition expression.
    pub fn key_condition_expression(&self) -> Option<&str> {
        self.key_condition.as_deref()
    }

    /// The full filter expression.
    pub fn filter_expression(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Request for a targeted read, continuing from `cursor`.
    ///
    /// `None` for scan plans.
    pub fn targeted_read<'a>(&'a self, cursor: Option<&'a Cursor>) -> Option<TargetedRead<'a>> {
        let key_condition = self.key_condition.as_deref()?;
        Some(TargetedRead {
            table: &self.table,
            index: self.index.as_deref(),
            key_condition,
            filter: self.filter.as_deref(),
            names: &self.names,
            values: &self.values,
            cursor,
        })
    }

    /// Request for a full scan, continuing from `cursor`.
    pub fn scan_request<'a>(&'a self, cursor: Option<&'a Cursor>) -> ScanRequest<'a> {
        ScanRequest {
            table: &self.table,
            filter: self.filter.as_deref(),
            names: &self.names,
            values: &self.values,
            cursor,
        }
    }

    /// One-line description of the read.
    pub fn describe(&self) -> String {
        let op = match self.mode {
            ReadMode::Lookup => "QUERY",
            ReadMode::Scan => "SCAN",
        };
        format!("GET ITEMS FROM TABLE {} WITH {op} OPERATION", self.table)
    }
}

/// Plans reads for one model.
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner<'a> {
    model: &'a ModelDef,
}

impl<'a> QueryPlanner<'a> {
    /// Create a planner for `model`.
    pub fn new(model: &'a ModelDef) -> Self {
        Self { model }
    }

    /// Build the native request for `clause`.
    ///
    /// Operands are coerced to their declared types first; an operand that
    /// does not convert is an invalid argument.
    pub fn plan(&self, clause: &WhereClause) -> Result<QueryPlan, Error> {
        let schema = &self.model.schema;
        schema.hash_type()?;

        let clause = coerce_where(clause, schema)?;
        let classification = classify(schema, &clause);
        let mode = classification.mode();

        let mut placeholders = Placeholders::new();
        let mut key_conditions = Vec::new();
        let mut filters = Vec::new();

        let mut key_attributes: Vec<&str> = Vec::new();
        if mode == ReadMode::Lookup {
            if let Some(hash) = clause.get(&schema.hash_key) {
                key_conditions.push(translate(
                    &mut placeholders,
                    &schema.hash_key,
                    hash,
                    Position::KeyCondition,
                )?);
                key_attributes.push(&schema.hash_key);
            }
            if let Some(sort) = &classification.sort_key {
                if let Some(condition) = clause.get(&sort.attribute) {
                    key_conditions.push(translate(
                        &mut placeholders,
                        &sort.attribute,
                        condition,
                        Position::KeyCondition,
                    )?);
                    key_attributes.push(&sort.attribute);
                }
            }
        }

        for entry in clause.clauses() {
            match entry {
                Clause::Attribute { name, condition } => {
                    if key_attributes.contains(&name.as_str()) {
                        continue;
                    }
                    filters.push(translate(
                        &mut placeholders,
                        name,
                        condition,
                        Position::Filter,
                    )?);
                }
                Clause::AnyOf(entries) => {
                    filters.push(translate_any_of(&mut placeholders, entries)?);
                }
            }
        }

        let index = classification.target_index().map(str::to_string);
        let key_condition = Fragment::conjunction(&key_conditions);
        let filter = Fragment::conjunction(&filters);
        let (names, values) = placeholders.into_tables();

        debug!(
            model = %self.model.name,
            table = self.model.table_name(),
            mode = ?mode,
            index = ?index,
            key_condition = ?key_condition,
            filter = ?filter,
            "planned read"
        );

        Ok(QueryPlan {
            model: self.model.name.clone(),
            table: self.model.table_name().to_string(),
            mode,
            index,
            key_conditions,
            filters,
            names,
            values,
            classification,
            key_condition,
            filter,
        })
    }
}
