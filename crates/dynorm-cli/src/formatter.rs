//! Output formatting for read results and plans.

use std::fmt;

use clap::ValueEnum;
use dynorm_core::{ExplainResult, ReadOutcome};
use dynorm_proto::item_to_json;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// One compact JSON record per line
    Lines,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Lines => write!(f, "lines"),
        }
    }
}

/// Render the records of a read.
pub fn format_outcome(outcome: &ReadOutcome, format: OutputFormat) -> String {
    let records: Vec<serde_json::Value> = outcome.items.iter().map(item_to_json).collect();
    match format {
        OutputFormat::Json => {
            let mut body = serde_json::json!({ "records": records });
            if let Some(include) = &outcome.include {
                body["include"] = include.clone();
            }
            serde_json::to_string_pretty(&body).unwrap_or_default()
        }
        OutputFormat::Lines => records
            .iter()
            .map(serde_json::Value::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render a plan explanation.
pub fn format_explain(result: &ExplainResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
        OutputFormat::Lines => result.explanation.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynorm_core::ReadMode;
    use dynorm_proto::{Item, Value};

    fn outcome() -> ReadOutcome {
        let mut item = Item::new();
        item.insert("id".into(), Value::from("1"));
        item.insert("order".into(), Value::Int(2));
        ReadOutcome {
            items: vec![item.clone(), item],
            include: Some(serde_json::json!("instruments")),
            mode: ReadMode::Lookup,
            pages: 1,
        }
    }

    #[test]
    fn test_lines_format() {
        let text = format_outcome(&outcome(), OutputFormat::Lines);
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().next(), Some(r#"{"id":"1","order":2}"#));
    }

    #[test]
    fn test_json_format_carries_include() {
        let text = format_outcome(&outcome(), OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["records"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["include"], "instruments");
    }
}
