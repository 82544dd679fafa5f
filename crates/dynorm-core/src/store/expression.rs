//! Native condition expression grammar.
//!
//! Parses and evaluates the key-condition and filter expressions the planner
//! emits, against a record and its name/value placeholder tables:
//!
//! ```text
//! expr      := and ("OR" and)*
//! and       := unary ("AND" unary)*
//! unary     := "NOT" unary | "(" expr ")" | condition
//! condition := operand cmp operand
//!            | operand "BETWEEN" operand "AND" operand
//!            | operand "IN" "(" operand ("," operand)* ")"
//! cmp       := "=" | "<>" | "<" | "<=" | ">" | ">="
//! operand   := "#alias" | ":placeholder" | attribute
//! ```

use std::cmp::Ordering;
use std::fmt;

use dynorm_proto::{Item, Value};
use thiserror::Error;

use super::{NameMap, ValueMap};

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// A character outside the grammar.
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    /// Tokens in an order the grammar does not allow.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A `#alias` missing from the name table.
    #[error("unresolved attribute name `{0}`")]
    UnresolvedName(String),

    /// A `:placeholder` missing from the value table.
    #[error("unresolved value `{0}`")]
    UnresolvedValue(String),
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        })
    }
}

/// A leaf of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute reference, either `#alias` or a bare name.
    Path(String),
    /// Value placeholder including its leading `:`.
    Value(String),
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
    },
    In {
        value: Operand,
        list: Vec<Operand>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Split a tree of `AND`s into its conjuncts, left to right.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(left, right) => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Value(String),
    Cmp(Comparator),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    Between,
    In,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '=' => tokens.push(Token::Cmp(Comparator::Eq)),
            '<' => match chars.peek() {
                Some((_, '=')) => {
                    chars.next();
                    tokens.push(Token::Cmp(Comparator::Le));
                }
                Some((_, '>')) => {
                    chars.next();
                    tokens.push(Token::Cmp(Comparator::Ne));
                }
                _ => tokens.push(Token::Cmp(Comparator::Lt)),
            },
            '>' => match chars.peek() {
                Some((_, '=')) => {
                    chars.next();
                    tokens.push(Token::Cmp(Comparator::Ge));
                }
                _ => tokens.push(Token::Cmp(Comparator::Gt)),
            },
            '#' | ':' => {
                let mut word = String::from(ch);
                while let Some((_, c)) = chars.peek().copied().filter(|(_, c)| is_ident_char(*c)) {
                    word.push(c);
                    chars.next();
                }
                if word.len() == 1 {
                    return Err(ExpressionError::UnexpectedChar { ch, offset });
                }
                tokens.push(if ch == '#' {
                    Token::Path(word)
                } else {
                    Token::Value(word)
                });
            }
            c if is_ident_char(c) => {
                let mut word = String::from(c);
                while let Some((_, c)) = chars.peek().copied().filter(|(_, c)| is_ident_char(*c)) {
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "BETWEEN" => Token::Between,
                    "IN" => Token::In,
                    _ => Token::Path(word),
                });
            }
            other => return Err(ExpressionError::UnexpectedChar { ch: other, offset }),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a condition expression.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::Syntax(format!(
            "unexpected {token:?} after expression"
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(ExpressionError::Syntax(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => self.parse_condition(),
        }
    }

    fn parse_condition(&mut self) -> Result<Expr, ExpressionError> {
        let value = self.parse_operand()?;
        match self.next() {
            Some(Token::Cmp(op)) => Ok(Expr::Compare {
                left: value,
                op,
                right: self.parse_operand()?,
            }),
            Some(Token::Between) => {
                let low = self.parse_operand()?;
                self.expect(Token::And)?;
                let high = self.parse_operand()?;
                Ok(Expr::Between { value, low, high })
            }
            Some(Token::In) => {
                self.expect(Token::LParen)?;
                let mut list = vec![self.parse_operand()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    list.push(self.parse_operand()?);
                }
                self.expect(Token::RParen)?;
                Ok(Expr::In { value, list })
            }
            other => Err(ExpressionError::Syntax(format!(
                "expected comparison, BETWEEN or IN, found {other:?}"
            ))),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.next() {
            Some(Token::Path(p)) => Ok(Operand::Path(p)),
            Some(Token::Value(v)) => Ok(Operand::Value(v)),
            other => Err(ExpressionError::Syntax(format!(
                "expected operand, found {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Binds a record to the placeholder tables of an expression.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The record being tested.
    pub item: &'a Item,
    /// `#alias` to attribute name.
    pub names: &'a NameMap,
    /// `:placeholder` to value.
    pub values: &'a ValueMap,
}

impl<'a> EvalContext<'a> {
    /// Create a context.
    pub fn new(item: &'a Item, names: &'a NameMap, values: &'a ValueMap) -> Self {
        Self {
            item,
            names,
            values,
        }
    }

    /// Evaluate an expression against the record.
    ///
    /// Missing attributes satisfy no condition other than `<>`.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ExpressionError> {
        match expr {
            Expr::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (self.resolve(left)?, self.resolve(right)?) else {
                    return Ok(*op == Comparator::Ne);
                };
                Ok(compare(l, *op, r))
            }
            Expr::Between { value, low, high } => {
                let (Some(v), Some(lo), Some(hi)) =
                    (self.resolve(value)?, self.resolve(low)?, self.resolve(high)?)
                else {
                    return Ok(false);
                };
                Ok(compare(v, Comparator::Ge, lo) && compare(v, Comparator::Le, hi))
            }
            Expr::In { value, list } => {
                let Some(v) = self.resolve(value)? else {
                    return Ok(false);
                };
                for candidate in list {
                    if let Some(c) = self.resolve(candidate)? {
                        if v.loose_eq(c) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Expr::And(left, right) => Ok(self.evaluate(left)? && self.evaluate(right)?),
            Expr::Or(left, right) => Ok(self.evaluate(left)? || self.evaluate(right)?),
            Expr::Not(inner) => Ok(!self.evaluate(inner)?),
        }
    }

    /// Resolve an attribute reference to its name.
    pub fn resolve_name<'b>(&'b self, path: &'b str) -> Result<&'b str, ExpressionError> {
        if path.starts_with('#') {
            self.names
                .get(path)
                .map(String::as_str)
                .ok_or_else(|| ExpressionError::UnresolvedName(path.to_string()))
        } else {
            Ok(path)
        }
    }

    fn resolve(&self, operand: &Operand) -> Result<Option<&'a Value>, ExpressionError> {
        match operand {
            Operand::Path(path) => {
                let name = self.resolve_name(path)?;
                Ok(self.item.get(name).filter(|v| !v.is_null()))
            }
            Operand::Value(placeholder) => self
                .values
                .get(placeholder)
                .map(Some)
                .ok_or_else(|| ExpressionError::UnresolvedValue(placeholder.clone())),
        }
    }
}

fn compare(left: &Value, op: Comparator, right: &Value) -> bool {
    match op {
        Comparator::Eq => left.loose_eq(right),
        Comparator::Ne => !left.loose_eq(right),
        _ => match left.compare(right) {
            Some(ordering) => match op {
                Comparator::Lt => ordering == Ordering::Less,
                Comparator::Le => ordering != Ordering::Greater,
                Comparator::Gt => ordering == Ordering::Greater,
                Comparator::Ge => ordering != Ordering::Less,
                Comparator::Eq | Comparator::Ne => false,
            },
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (Item, NameMap, ValueMap) {
        let mut item = Item::new();
        item.insert("realm".into(), Value::String("beatles".into()));
        item.insert("order".into(), Value::Int(3));
        item.insert("role".into(), Value::String("leaders".into()));

        let mut names = NameMap::new();
        names.insert("#R".into(), "realm".into());
        names.insert("#O".into(), "order".into());
        names.insert("#RO".into(), "role".into());
        names.insert("#M".into(), "missing".into());

        let mut values = ValueMap::new();
        values.insert(":realm".into(), Value::String("beatles".into()));
        values.insert(":order_start".into(), Value::Int(2));
        values.insert(":order_end".into(), Value::Float(4.0));
        values.insert(":role_0".into(), Value::String("backer".into()));
        values.insert(":role_1".into(), Value::String("leaders".into()));
        (item, names, values)
    }

    fn eval(expr: &str) -> Result<bool, ExpressionError> {
        let (item, names, values) = tables();
        EvalContext::new(&item, &names, &values).evaluate(&parse(expr)?)
    }

    #[test]
    fn test_parse_shapes() {
        let expr = parse("#R = :realm AND #O BETWEEN :a AND :b").unwrap();
        assert_eq!(expr.conjuncts().len(), 2);
        assert!(matches!(expr.conjuncts()[1], Expr::Between { .. }));

        let expr = parse("(#A = :a OR #B = :b) AND #C IN (:c_0, :c_1)").unwrap();
        let parts = expr.conjuncts();
        assert!(matches!(parts[0], Expr::Or(_, _)));
        assert!(matches!(parts[1], Expr::In { list, .. } if list.len() == 2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("#R = "), Err(ExpressionError::Syntax(_))));
        assert!(matches!(parse("#R ~ :x"), Err(ExpressionError::UnexpectedChar { ch: '~', .. })));
        assert!(matches!(parse("(#R = :x"), Err(ExpressionError::Syntax(_))));
        assert!(matches!(parse("#R = :x :y"), Err(ExpressionError::Syntax(_))));
        assert!(matches!(parse("# = :x"), Err(ExpressionError::UnexpectedChar { .. })));
    }

    #[test]
    fn test_evaluate() {
        assert!(eval("#R = :realm").unwrap());
        assert!(eval("#O BETWEEN :order_start AND :order_end").unwrap());
        assert!(eval("#O > :order_start AND #O <= :order_end").unwrap());
        assert!(eval("#RO IN (:role_0, :role_1)").unwrap());
        assert!(eval("(#RO = :role_0 OR #R = :realm)").unwrap());
        assert!(!eval("#O < :order_start").unwrap());
        assert!(eval("NOT #O < :order_start").unwrap());
        assert!(eval("order = :order_start OR realm = :realm").unwrap());
    }

    #[test]
    fn test_missing_attribute() {
        assert!(!eval("#M = :realm").unwrap());
        assert!(eval("#M <> :realm").unwrap());
        assert!(!eval("#M IN (:role_0)").unwrap());
    }

    #[test]
    fn test_unresolved_placeholders() {
        assert!(matches!(
            eval("#X = :realm"),
            Err(ExpressionError::UnresolvedName(n)) if n == "#X"
        ));
        assert!(matches!(
            eval("#R = :nope"),
            Err(ExpressionError::UnresolvedValue(v)) if v == ":nope"
        ));
    }

    #[test]
    fn test_type_mismatch_is_false() {
        assert!(!eval("#R > :order_start").unwrap());
    }
}
