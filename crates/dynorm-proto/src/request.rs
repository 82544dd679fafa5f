//! Read request types: where clause plus ordering and pagination directives.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filter::WhereClause;

/// Ordering specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parse `"field"`, `"field ASC"` or `"field DESC"`.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let mut parts = spec.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| Error::InvalidOrder("empty order field".into()))?;
        let direction = match parts.next() {
            None => OrderDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => OrderDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => OrderDirection::Desc,
            Some(dir) => {
                return Err(Error::InvalidOrder(format!(
                    "unknown direction `{dir}` in `{spec}`"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(Error::InvalidOrder(format!("malformed order `{spec}`")));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }

    /// Parse an `order` directive: a string, a comma-separated string or a list
    /// of strings. `null` means no explicit order.
    pub fn parse_list(json: &serde_json::Value) -> Result<Vec<Self>, Error> {
        match json {
            serde_json::Value::Null => Ok(vec![]),
            serde_json::Value::String(s) => s.split(',').map(Self::parse).collect(),
            serde_json::Value::Array(items) => {
                let mut specs = Vec::with_capacity(items.len());
                for item in items {
                    let s = item.as_str().ok_or_else(|| {
                        Error::InvalidOrder(format!("order entries must be strings, got {item}"))
                    })?;
                    specs.push(Self::parse(s)?);
                }
                Ok(specs)
            }
            other => Err(Error::InvalidOrder(format!(
                "order must be a string or a list, got {other}"
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// A complete ORM read request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadFilter {
    /// Conditions to match.
    pub where_clause: WhereClause,
    /// Explicit ordering; empty means the model's default key order.
    pub order: Vec<OrderSpec>,
    /// Number of matching records to skip after sorting.
    pub offset: Option<usize>,
    /// Maximum number of records to return after the offset.
    pub limit: Option<usize>,
    /// Relation expansion directive, passed back to the caller untouched.
    pub include: Option<serde_json::Value>,
}

impl ReadFilter {
    /// Create a read filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the where clause.
    pub fn with_where(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = where_clause;
        self
    }

    /// Add an ordering.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order.push(order);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the include directive.
    pub fn with_include(mut self, include: serde_json::Value) -> Self {
        self.include = Some(include);
        self
    }

    /// Parse an ORM filter object `{where, order, offset|skip, limit, include}`.
    ///
    /// `offset` wins over `skip` when both are present. Unknown keys are ignored.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        let obj = match json {
            serde_json::Value::Null => return Ok(Self::new()),
            serde_json::Value::Object(obj) => obj,
            other => {
                return Err(Error::InvalidFilter(format!(
                    "filter must be an object, got {other}"
                )))
            }
        };

        let where_clause = match obj.get("where") {
            Some(w) => WhereClause::from_json(w)?,
            None => WhereClause::new(),
        };
        let order = match obj.get("order") {
            Some(o) => OrderSpec::parse_list(o)?,
            None => vec![],
        };
        let offset = match parse_count(obj.get("offset"), "offset")? {
            Some(offset) => Some(offset),
            None => parse_count(obj.get("skip"), "skip")?,
        };
        let limit = parse_count(obj.get("limit"), "limit")?;
        let include = obj.get("include").filter(|i| !i.is_null()).cloned();

        Ok(Self {
            where_clause,
            order,
            offset,
            limit,
            include,
        })
    }
}

fn parse_count(json: Option<&serde_json::Value>, key: &str) -> Result<Option<usize>, Error> {
    let json = match json {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(json) => json,
    };
    let invalid =
        || Error::InvalidPagination(format!("{key} must be a non-negative integer, got {json}"));

    let number = match json {
        serde_json::Value::Number(n) => n,
        _ => return Err(invalid()),
    };
    if let Some(n) = number.as_u64() {
        return usize::try_from(n).map(Some).map_err(|_| invalid());
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => {
            Ok(Some(f as usize))
        }
        _ => Err(invalid()),
    }
}
