//! Read explanation.
//!
//! Plans a read without touching the store and reports the native request it
//! would issue, with placeholders resolved for readability.

use dynorm_proto::{json::value_to_json, OrderDirection, ReadFilter};
use serde::Serialize;

use super::classify::KeyRole;
use super::expression::resolve_names;
use super::planner::{QueryPlanner, ReadMode};
use super::postprocess::effective_order;
use crate::catalog::ModelRegistry;
use crate::error::Error;

/// Summary of a planned read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainResult {
    pub model: String,
    pub table: String,
    pub mode: ReadMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Key condition as sent, with `#` aliases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition: Option<String>,
    /// Filter expression as sent, with `#` aliases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub names: serde_json::Map<String, serde_json::Value>,
    pub values: serde_json::Map<String, serde_json::Value>,
    /// Attribute to key role, in clause order.
    pub roles: Vec<(String, String)>,
    /// Effective ordering, e.g. `order DESC`.
    pub order: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Human-readable report.
    pub explanation: String,
}

/// Explains reads against a model registry.
pub struct ExplainService<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> ExplainService<'a> {
    /// Create an explain service.
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Explain `filter` against `model` without executing it.
    pub fn explain(&self, model: &str, filter: &ReadFilter) -> Result<ExplainResult, Error> {
        let model_def = self.registry.get(model)?;
        let plan = QueryPlanner::new(&model_def).plan(&filter.where_clause)?;

        let order: Vec<String> = effective_order(&filter.order, &model_def.schema)
            .into_iter()
            .map(|spec| match spec.direction {
                OrderDirection::Asc => format!("{} ASC", spec.field),
                OrderDirection::Desc => format!("{} DESC", spec.field),
            })
            .collect();

        let roles = plan
            .classification
            .roles
            .iter()
            .map(|(name, role)| (name.clone(), role_label(role)))
            .collect();

        let key_condition = plan.key_condition_expression().map(str::to_string);
        let filter_expr = plan.filter_expression().map(str::to_string);

        let mut lines = vec![plan.describe()];
        if let Some(index) = &plan.index {
            lines.push(format!("Index: {index}"));
        }
        if let Some(kc) = &key_condition {
            lines.push(format!("Key Condition: {}", resolve_names(kc, &plan.names)));
        }
        if let Some(f) = &filter_expr {
            lines.push(format!("Filter: {}", resolve_names(f, &plan.names)));
        }
        lines.push(format!("Order By: {}", order.join(", ")));
        let mut window = Vec::new();
        if let Some(offset) = filter.offset {
            window.push(format!("OFFSET {offset}"));
        }
        if let Some(limit) = filter.limit {
            window.push(format!("LIMIT {limit}"));
        }
        if !window.is_empty() {
            lines.push(format!("Pagination: {}", window.join(", ")));
        }

        Ok(ExplainResult {
            model: plan.model.clone(),
            table: plan.table.clone(),
            mode: plan.mode,
            index: plan.index.clone(),
            key_condition,
            filter: filter_expr,
            names: plan
                .names
                .iter()
                .map(|(alias, name)| (alias.clone(), serde_json::Value::String(name.clone())))
                .collect(),
            values: plan
                .values
                .iter()
                .map(|(placeholder, value)| (placeholder.clone(), value_to_json(value)))
                .collect(),
            roles,
            order,
            offset: filter.offset,
            limit: filter.limit,
            explanation: lines.join("\n"),
        })
    }
}

fn role_label(role: &KeyRole) -> String {
    match role {
        KeyRole::PrimaryHash => "hash".to_string(),
        KeyRole::PrimarySort => "sort".to_string(),
        KeyRole::IndexHash(index) => format!("hash of {index}"),
        KeyRole::IndexSort(index) => format!("sort of {index}"),
        KeyRole::NonKey => "non-key".to_string(),
    }
}
