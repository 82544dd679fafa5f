//! Expression translation.
//!
//! Turns typed conditions into native expression fragments. Attribute names
//! never appear in a fragment: each attribute is referenced through a
//! deterministic `#` alias, and every operand is bound to a `:` value
//! placeholder named after its attribute.
//!
//! | Condition          | Fragment                              |
//! |--------------------|---------------------------------------|
//! | equality           | `#A = :a`                             |
//! | `lt` `lte` `gt` `gte` | `#A < :a` `<=` `>` `>=`            |
//! | `between`          | `#A BETWEEN :a_start AND :a_end`      |
//! | membership         | `#A IN (:a_0, :a_1, ...)`             |
//! | `or` group         | `(#A = :a OR #B = :b)`                |

use std::collections::HashMap;
use std::fmt;

use dynorm_proto::{Condition, Value};

use crate::error::Error;
use crate::store::{NameMap, ValueMap};

/// Where a fragment will be placed in the native request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Key condition of a targeted read. Membership is not allowed.
    KeyCondition,
    /// Filter expression.
    Filter,
}

/// A rendered expression fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    /// The fragment text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join fragments with `AND`. `None` when there are none.
    pub fn conjunction(fragments: &[Fragment]) -> Option<String> {
        if fragments.is_empty() {
            return None;
        }
        Some(
            fragments
                .iter()
                .map(Fragment::as_str)
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name and value placeholder tables for one request.
///
/// Aliases are `#` followed by the upper-cased leading characters of the
/// attribute name, lengthened one character at a time until unique. Value
/// placeholders are `:` followed by the attribute name, suffixed with a counter
/// on collision. Characters outside `[A-Za-z0-9_]` are replaced with `_`.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    names: NameMap,
    aliases: HashMap<String, String>,
    values: ValueMap,
}

impl Placeholders {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for `attribute`, assigning one on first use.
    pub fn alias(&mut self, attribute: &str) -> String {
        if let Some(alias) = self.aliases.get(attribute) {
            return alias.clone();
        }

        let base = sanitize(attribute).to_ascii_uppercase();
        let chars: Vec<char> = base.chars().collect();
        let mut alias = None;
        for len in 1..=chars.len() {
            let candidate: String = std::iter::once('#')
                .chain(chars[..len].iter().copied())
                .collect();
            if !self.names.contains_key(&candidate) {
                alias = Some(candidate);
                break;
            }
        }
        let alias = alias.unwrap_or_else(|| {
            (1..)
                .map(|n| format!("#{base}_{n}"))
                .find(|candidate| !self.names.contains_key(candidate))
                .unwrap_or_default()
        });

        self.names.insert(alias.clone(), attribute.to_string());
        self.aliases.insert(attribute.to_string(), alias.clone());
        alias
    }

    /// Bind `value` to a fresh placeholder derived from `base`.
    pub fn bind(&mut self, base: &str, value: Value) -> String {
        let base = format!(":{}", sanitize(base));
        let placeholder = if self.values.contains_key(&base) {
            (1..)
                .map(|n| format!("{base}_{n}"))
                .find(|candidate| !self.values.contains_key(candidate))
                .unwrap_or_default()
        } else {
            base
        };
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Alias to attribute name.
    pub fn names(&self) -> &NameMap {
        &self.names
    }

    /// Placeholder to value.
    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Consume into the name and value tables.
    pub fn into_tables(self) -> (NameMap, ValueMap) {
        (self.names, self.values)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Translate one attribute condition into a fragment.
pub fn translate(
    placeholders: &mut Placeholders,
    attribute: &str,
    condition: &Condition,
    position: Position,
) -> Result<Fragment, Error> {
    let alias = placeholders.alias(attribute);
    let text = match condition {
        Condition::Equals(value) => {
            let v = placeholders.bind(attribute, value.clone());
            format!("{alias} = {v}")
        }
        Condition::Compare { op, value } => {
            let v = placeholders.bind(attribute, value.clone());
            format!("{alias} {} {v}", op.symbol())
        }
        Condition::Between { start, end } => {
            let s = placeholders.bind(&format!("{attribute}_start"), start.clone());
            let e = placeholders.bind(&format!("{attribute}_end"), end.clone());
            format!("{alias} BETWEEN {s} AND {e}")
        }
        Condition::In(values) => {
            if position == Position::KeyCondition {
                return Err(Error::InvalidArgument(format!(
                    "membership on `{attribute}` cannot be a key condition"
                )));
            }
            if values.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "membership list for `{attribute}` is empty"
                )));
            }
            let bound: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, v)| placeholders.bind(&format!("{attribute}_{i}"), v.clone()))
                .collect();
            format!("{alias} IN ({})", bound.join(", "))
        }
    };
    Ok(Fragment(text))
}

/// Translate an `or` group into a parenthesized disjunction of equalities.
pub fn translate_any_of(
    placeholders: &mut Placeholders,
    entries: &[(String, Value)],
) -> Result<Fragment, Error> {
    if entries.is_empty() {
        return Err(Error::InvalidArgument("or group is empty".into()));
    }
    let mut parts = Vec::with_capacity(entries.len());
    for (attribute, value) in entries {
        let fragment = translate(
            placeholders,
            attribute,
            &Condition::Equals(value.clone()),
            Position::Filter,
        )?;
        parts.push(fragment.0);
    }
    Ok(Fragment(format!("({})", parts.join(" OR "))))
}

/// Replace `#alias` references in `expression` with attribute names.
pub fn resolve_names(expression: &str, names: &NameMap) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        let mut alias = String::from('#');
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                alias.push(next);
                chars.next();
            } else {
                break;
            }
        }
        match names.get(&alias) {
            Some(name) => out.push_str(name),
            None => out.push_str(&alias),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::expression::{parse, EvalContext};
    use dynorm_proto::{CompareOp, Item};

    #[test]
    fn test_alias_lengthens_on_collision() {
        let mut p = Placeholders::new();
        assert_eq!(p.alias("realm"), "#R");
        assert_eq!(p.alias("role"), "#RO");
        assert_eq!(p.alias("rank"), "#RA");
        assert_eq!(p.alias("realm"), "#R");
        assert_eq!(p.alias("order"), "#O");
        assert_eq!(p.names().len(), 4);
    }

    #[test]
    fn test_alias_exhausted_prefixes() {
        let mut p = Placeholders::new();
        assert_eq!(p.alias("a"), "#A");
        assert_eq!(p.alias("A"), "#A_1");
        assert_eq!(p.alias("user-name"), "#U");
        assert_eq!(p.names()["#U"], "user-name");
    }

    #[test]
    fn test_bind_disambiguates() {
        let mut p = Placeholders::new();
        assert_eq!(p.bind("role", "a".into()), ":role");
        assert_eq!(p.bind("role", "b".into()), ":role_1");
        assert_eq!(p.bind("first.name", "c".into()), ":first_name");
        assert_eq!(p.values().len(), 3);
    }

    #[test]
    fn test_operator_table() {
        let cases = [
            (Condition::eq(1), "#O = :order"),
            (Condition::lt(1), "#O < :order"),
            (Condition::le(1), "#O <= :order"),
            (Condition::gt(1), "#O > :order"),
            (Condition::ge(1), "#O >= :order"),
            (
                Condition::between(1, 5),
                "#O BETWEEN :order_start AND :order_end",
            ),
            (
                Condition::in_values(vec![1.into(), 2.into()]),
                "#O IN (:order_0, :order_1)",
            ),
        ];
        for (condition, expected) in cases {
            let mut p = Placeholders::new();
            let fragment = translate(&mut p, "order", &condition, Position::Filter).unwrap();
            assert_eq!(fragment.as_str(), expected);
        }
    }

    #[test]
    fn test_values_never_collide_within_request() {
        let mut p = Placeholders::new();
        translate(&mut p, "order", &Condition::gt(1), Position::Filter).unwrap();
        let fragment = translate(&mut p, "order", &Condition::lt(9), Position::Filter).unwrap();
        assert_eq!(fragment.as_str(), "#O < :order_1");
        assert_eq!(p.values()[":order"], Value::Int(1));
        assert_eq!(p.values()[":order_1"], Value::Int(9));
    }

    #[test]
    fn test_membership_rejected_as_key_condition() {
        let mut p = Placeholders::new();
        let result = translate(
            &mut p,
            "id",
            &Condition::in_values(vec!["1".into()]),
            Position::KeyCondition,
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_or_group() {
        let mut p = Placeholders::new();
        let fragment = translate_any_of(
            &mut p,
            &[
                ("role".into(), "leaders".into()),
                ("role".into(), "backer".into()),
            ],
        )
        .unwrap();
        assert_eq!(fragment.as_str(), "(#R = :role OR #R = :role_1)");
        assert!(translate_any_of(&mut p, &[]).is_err());
    }

    #[test]
    fn test_conjunction_and_resolve() {
        let mut p = Placeholders::new();
        let fragments = vec![
            translate(&mut p, "realm", &Condition::eq("beatles"), Position::KeyCondition).unwrap(),
            translate(&mut p, "id", &Condition::eq("1"), Position::KeyCondition).unwrap(),
        ];
        let joined = Fragment::conjunction(&fragments).unwrap();
        assert_eq!(joined, "#R = :realm AND #I = :id");
        assert_eq!(resolve_names(&joined, p.names()), "realm = :realm AND id = :id");
        assert_eq!(Fragment::conjunction(&[]), None);
    }

    /// Translating a condition and evaluating the fragment agrees with
    /// applying the operator directly.
    #[test]
    fn test_translate_evaluate_agrees_with_operator() {
        let conditions = [
            Condition::eq(3),
            Condition::lt(3),
            Condition::le(3),
            Condition::gt(3),
            Condition::ge(3),
            Condition::between(2, 4),
            Condition::in_values(vec![1.into(), 3.into(), 5.into()]),
        ];

        for condition in &conditions {
            for n in 0..7i64 {
                let mut p = Placeholders::new();
                let fragment = translate(&mut p, "order", condition, Position::Filter).unwrap();
                let expr = parse(fragment.as_str()).unwrap();

                let mut item = Item::new();
                item.insert("order".into(), Value::Int(n));
                let (names, values) = p.into_tables();
                let evaluated = EvalContext::new(&item, &names, &values)
                    .evaluate(&expr)
                    .unwrap();

                let direct = match condition {
                    Condition::Equals(v) => n == v.as_i64().unwrap(),
                    Condition::Compare { op, value } => {
                        let v = value.as_i64().unwrap();
                        match op {
                            CompareOp::Lt => n < v,
                            CompareOp::Le => n <= v,
                            CompareOp::Gt => n > v,
                            CompareOp::Ge => n >= v,
                        }
                    }
                    Condition::Between { start, end } => {
                        start.as_i64().unwrap() <= n && n <= end.as_i64().unwrap()
                    }
                    Condition::In(values) => values.iter().any(|v| v.as_i64() == Some(n)),
                };
                assert_eq!(evaluated, direct, "{fragment} with order = {n}");
            }
        }
    }
}
