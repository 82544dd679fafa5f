//! Typed `where` clause IR.
//!
//! An ORM filter arrives as a loosely-typed JSON object. It is parsed once into
//! a [`WhereClause`]: an ordered list of [`Clause`]s, each either a single
//! attribute [`Condition`] or an `or` group of attribute equalities. Everything
//! downstream works on the tagged variants and never re-inspects JSON shapes.

use crate::error::Error;
use crate::json::json_to_value;
use crate::value::Value;

/// Ordering comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `lt`
    Lt,
    /// `lte`
    Le,
    /// `gt`
    Gt,
    /// `gte`
    Ge,
}

impl CompareOp {
    /// The native expression symbol for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A condition on one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality, from a bare scalar or `{"=": v}`.
    Equals(Value),
    /// Ordering comparison.
    Compare { op: CompareOp, value: Value },
    /// Inclusive range. `start <= end` is not checked.
    Between { start: Value, end: Value },
    /// Membership, from a bare list or `{"inq": [..]}`.
    In(Vec<Value>),
}

impl Condition {
    /// Create an equality condition.
    pub fn eq(value: impl Into<Value>) -> Self {
        Condition::Equals(value.into())
    }

    /// Create a less-than condition.
    pub fn lt(value: impl Into<Value>) -> Self {
        Condition::Compare {
            op: CompareOp::Lt,
            value: value.into(),
        }
    }

    /// Create a less-than-or-equal condition.
    pub fn le(value: impl Into<Value>) -> Self {
        Condition::Compare {
            op: CompareOp::Le,
            value: value.into(),
        }
    }

    /// Create a greater-than condition.
    pub fn gt(value: impl Into<Value>) -> Self {
        Condition::Compare {
            op: CompareOp::Gt,
            value: value.into(),
        }
    }

    /// Create a greater-than-or-equal condition.
    pub fn ge(value: impl Into<Value>) -> Self {
        Condition::Compare {
            op: CompareOp::Ge,
            value: value.into(),
        }
    }

    /// Create an inclusive range condition.
    pub fn between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Condition::Between {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Create a membership condition.
    pub fn in_values(values: Vec<Value>) -> Self {
        Condition::In(values)
    }

    /// Whether this is a plain equality.
    pub fn is_equality(&self) -> bool {
        matches!(self, Condition::Equals(_))
    }

    /// Whether this is a membership list.
    pub fn is_membership(&self) -> bool {
        matches!(self, Condition::In(_))
    }

    /// Apply `f` to every operand, keeping the condition's shape.
    pub fn try_map_values<E>(
        &self,
        mut f: impl FnMut(&Value) -> Result<Value, E>,
    ) -> Result<Condition, E> {
        Ok(match self {
            Condition::Equals(v) => Condition::Equals(f(v)?),
            Condition::Compare { op, value } => Condition::Compare {
                op: *op,
                value: f(value)?,
            },
            Condition::Between { start, end } => Condition::Between {
                start: f(start)?,
                end: f(end)?,
            },
            Condition::In(values) => {
                Condition::In(values.iter().map(&mut f).collect::<Result<_, _>>()?)
            }
        })
    }
}

/// One entry of a where clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// A condition on a named attribute.
    Attribute { name: String, condition: Condition },
    /// `or`: any of the attribute equalities holds.
    AnyOf(Vec<(String, Value)>),
}

impl Clause {
    /// The attribute name, for attribute clauses.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Clause::Attribute { name, .. } => Some(name),
            Clause::AnyOf(_) => None,
        }
    }
}

/// An ordered conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    clauses: Vec<Clause>,
}

impl WhereClause {
    /// Create an empty where clause (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the condition on `name`.
    ///
    /// A replaced condition keeps its original position.
    pub fn with(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.push(name.into(), condition);
        self
    }

    /// Add an `or` group of equalities.
    pub fn with_any_of<N, V>(mut self, entries: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.clauses.push(Clause::AnyOf(
            entries
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        ));
        self
    }

    fn push(&mut self, name: String, condition: Condition) {
        for clause in &mut self.clauses {
            if let Clause::Attribute {
                name: existing,
                condition: slot,
            } = clause
            {
                if *existing == name {
                    *slot = condition;
                    return;
                }
            }
        }
        self.clauses.push(Clause::Attribute { name, condition });
    }

    /// Clauses in caller order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Iterate attribute conditions in caller order, skipping `or` groups.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Attribute { name, condition } => Some((name.as_str(), condition)),
            Clause::AnyOf(_) => None,
        })
    }

    /// The condition on `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Condition> {
        self.attributes()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    /// Whether the clause has no conditions.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Parse an ORM `where` object.
    ///
    /// `null` parses to the empty clause. Keys are kept in document order.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        let obj = match json {
            serde_json::Value::Null => return Ok(Self::new()),
            serde_json::Value::Object(obj) => obj,
            other => {
                return Err(Error::InvalidFilter(format!(
                    "where must be an object, got {other}"
                )))
            }
        };

        let mut clause = Self::new();
        for (key, value) in obj {
            if key.eq_ignore_ascii_case("or") {
                clause.clauses.push(parse_or_group(value)?);
            } else if key.eq_ignore_ascii_case("and") {
                return Err(Error::UnsupportedCombinator(key.clone()));
            } else {
                clause.push(key.clone(), parse_condition(key, value)?);
            }
        }
        Ok(clause)
    }
}

fn parse_or_group(json: &serde_json::Value) -> Result<Clause, Error> {
    let entries = json
        .as_array()
        .ok_or_else(|| Error::InvalidFilter("or expects a list of conditions".into()))?;
    if entries.is_empty() {
        return Err(Error::InvalidFilter(
            "or requires at least one condition".into(),
        ));
    }

    let mut group = Vec::with_capacity(entries.len());
    for entry in entries {
        let obj = entry
            .as_object()
            .filter(|obj| obj.len() == 1)
            .ok_or_else(|| {
                Error::InvalidFilter(format!(
                    "or entries must have exactly one attribute, got {entry}"
                ))
            })?;
        for (name, value) in obj {
            group.push((name.clone(), scalar_operand(name, value)?));
        }
    }
    Ok(Clause::AnyOf(group))
}

fn parse_condition(name: &str, json: &serde_json::Value) -> Result<Condition, Error> {
    match json {
        serde_json::Value::Array(items) => Ok(Condition::In(list_operand(name, items)?)),
        serde_json::Value::Object(obj) => {
            let mut ops = obj.iter();
            let (op, operand) = match (ops.next(), ops.next()) {
                (Some(entry), None) => entry,
                _ => {
                    return Err(Error::InvalidFilter(format!(
                        "condition on `{name}` must have exactly one operator"
                    )))
                }
            };
            parse_operator(name, op, operand)
        }
        scalar => Ok(Condition::Equals(json_to_value(scalar))),
    }
}

fn parse_operator(
    name: &str,
    op: &str,
    operand: &serde_json::Value,
) -> Result<Condition, Error> {
    let compare = |op: CompareOp| -> Result<Condition, Error> {
        Ok(Condition::Compare {
            op,
            value: scalar_operand(name, operand)?,
        })
    };

    match op.to_ascii_lowercase().as_str() {
        "=" => Ok(Condition::Equals(scalar_operand(name, operand)?)),
        "lt" => compare(CompareOp::Lt),
        "lte" => compare(CompareOp::Le),
        "gt" => compare(CompareOp::Gt),
        "gte" => compare(CompareOp::Ge),
        "between" => {
            let bounds = operand.as_array().ok_or_else(|| {
                Error::InvalidFilter(format!("between on `{name}` expects a two-element list"))
            })?;
            match list_operand(name, bounds)?.as_slice() {
                [start, end] => Ok(Condition::Between {
                    start: start.clone(),
                    end: end.clone(),
                }),
                other => Err(Error::InvalidFilter(format!(
                    "between on `{name}` expects two elements, got {}",
                    other.len()
                ))),
            }
        }
        "inq" => {
            let items = operand.as_array().ok_or_else(|| {
                Error::InvalidFilter(format!("inq on `{name}` expects a list"))
            })?;
            Ok(Condition::In(list_operand(name, items)?))
        }
        _ => Err(Error::UnknownOperator(op.to_string())),
    }
}

fn scalar_operand(name: &str, json: &serde_json::Value) -> Result<Value, Error> {
    let value = json_to_value(json);
    if value.is_scalar() {
        Ok(value)
    } else {
        Err(Error::InvalidFilter(format!(
            "operand for `{name}` must be a scalar, got {json}"
        )))
    }
}

fn list_operand(name: &str, items: &[serde_json::Value]) -> Result<Vec<Value>, Error> {
    if items.is_empty() {
        return Err(Error::InvalidFilter(format!(
            "list for `{name}` must not be empty"
        )));
    }
    items.iter().map(|item| scalar_operand(name, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_scalar_is_equality() {
        let clause = WhereClause::from_json(&json!({"realm": "beatles"})).unwrap();
        assert_eq!(clause.get("realm"), Some(&Condition::eq("beatles")));
    }

    #[test]
    fn test_operators_case_insensitive() {
        let clause = WhereClause::from_json(&json!({
            "a": {"GT": 1},
            "b": {"lte": 2},
            "c": {"Between": [1, 5]},
            "d": {"INQ": ["x", "y"]},
            "e": {"=": true}
        }))
        .unwrap();

        assert_eq!(clause.get("a"), Some(&Condition::gt(1)));
        assert_eq!(clause.get("b"), Some(&Condition::le(2)));
        assert_eq!(clause.get("c"), Some(&Condition::between(1, 5)));
        assert_eq!(
            clause.get("d"),
            Some(&Condition::in_values(vec!["x".into(), "y".into()]))
        );
        assert_eq!(clause.get("e"), Some(&Condition::eq(true)));
    }

    #[test]
    fn test_bare_list_is_membership() {
        let clause = WhereClause::from_json(&json!({"id": ["1", "2"]})).unwrap();
        assert!(clause.get("id").unwrap().is_membership());
    }

    #[test]
    fn test_key_order_preserved() {
        let clause = WhereClause::from_json(&json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let names: Vec<&str> = clause.attributes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_or_group() {
        let clause = WhereClause::from_json(&json!({
            "realm": "beatles",
            "or": [{"role": "leaders"}, {"role": "backer"}]
        }))
        .unwrap();

        assert_eq!(clause.len(), 2);
        assert_eq!(
            clause.clauses()[1],
            Clause::AnyOf(vec![
                ("role".into(), "leaders".into()),
                ("role".into(), "backer".into())
            ])
        );
        assert_eq!(clause.clauses()[1].attribute(), None);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            WhereClause::from_json(&json!({"a": {"like": "x"}})),
            Err(Error::UnknownOperator(op)) if op == "like"
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"and": [{"a": 1}]})),
            Err(Error::UnsupportedCombinator(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"a": {"between": [1]}})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"a": {"between": [1, 2, 3]}})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"a": {"gt": 1, "lt": 5}})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"a": []})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"or": [{"a": 1, "b": 2}]})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!({"a": {"gt": [1]}})),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            WhereClause::from_json(&json!("realm")),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_null_is_empty() {
        assert!(WhereClause::from_json(&serde_json::Value::Null)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_builder_replaces_in_place() {
        let clause = WhereClause::new()
            .with("a", Condition::eq(1))
            .with("b", Condition::eq(2))
            .with("a", Condition::gt(5));
        let entries: Vec<_> = clause.attributes().collect();
        assert_eq!(entries[0], ("a", &Condition::gt(5)));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_try_map_values() {
        let cond = Condition::between(1, 2);
        let mapped = cond
            .try_map_values(|v| Ok::<_, ()>(Value::Float(v.as_f64().unwrap())))
            .unwrap();
        assert_eq!(mapped, Condition::between(1.0, 2.0));
    }
}
