//! Values and collections produced by expression evaluation
//!
//! Every expression evaluates to an ordered [`Collection`]. Items are either
//! system values created by literals and operators, or element nodes reached
//! by navigation. Primitive element nodes keep their identity (so `id`,
//! `extension` and `hasValue()` still work) and expose their value through
//! [`Value::primitive`].

use crate::error::{Error, Result};
use crate::temporal::Temporal;
use ferrum_model::{Node, PrimitiveValue};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;

const TEMPORAL_TYPES: &[&str] = &["date", "dateTime", "instant"];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Node(Node),
}

impl Value {
    pub fn boolean(b: bool) -> Self {
        Value::Boolean(b)
    }

    pub fn integer(i: i64) -> Self {
        Value::Integer(i)
    }

    pub fn decimal(d: Decimal) -> Self {
        Value::Decimal(d)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn node(node: Node) -> Self {
        Value::Node(node)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Type name used by `is`, `as` and `ofType`: the element type for
    /// nodes, the system type otherwise.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Node(node) => node.type_name(),
        }
    }

    /// The primitive value of a literal or of a primitive element node.
    pub fn primitive(&self) -> Option<PrimitiveValue> {
        match self {
            Value::Boolean(b) => Some(PrimitiveValue::Boolean(*b)),
            Value::Integer(i) => Some(PrimitiveValue::Integer(*i)),
            Value::Decimal(d) => Some(PrimitiveValue::Decimal(*d)),
            Value::String(s) => Some(PrimitiveValue::String(s.clone())),
            Value::Node(node) => node.value().cloned(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Node(node) => node.value().and_then(|v| v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Node(node) => node.value().and_then(|v| v.as_bool()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Node(node) => node.value().and_then(|v| v.as_i64()),
            _ => None,
        }
    }

    fn is_temporal_node(&self) -> bool {
        matches!(self, Value::Node(node) if TEMPORAL_TYPES.contains(&node.type_name()))
    }

    /// Temporal reading of a pair of string values, when at least one is a
    /// date-typed element and both parse.
    fn temporal_pair(&self, other: &Value) -> Option<(Temporal, Temporal)> {
        if !self.is_temporal_node() && !other.is_temporal_node() {
            return None;
        }
        Some((
            Temporal::parse(self.as_str()?)?,
            Temporal::parse(other.as_str()?)?,
        ))
    }

    /// `=` on single items. `None` means unknown (partial dates at
    /// different precisions).
    pub fn equals(&self, other: &Value) -> Option<bool> {
        if let (Value::Node(a), Value::Node(b)) = (self, other) {
            if !a.is_primitive() || !b.is_primitive() {
                return Some(a == b);
            }
        }
        if let Some((a, b)) = self.temporal_pair(other) {
            return a.compare(&b).map(|o| o == Ordering::Equal);
        }
        match (self.primitive()?, other.primitive()?) {
            (PrimitiveValue::String(a), PrimitiveValue::String(b)) => Some(a == b),
            (PrimitiveValue::Boolean(a), PrimitiveValue::Boolean(b)) => Some(a == b),
            (a, b) => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => Some(x == y),
                _ => Some(false),
            },
        }
    }

    /// `~` on single items: case and whitespace insensitive for strings.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => normalize(a) == normalize(b),
            _ => self.equals(other).unwrap_or(false),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. `Ok(None)` is an unknown result,
    /// an error means the operands cannot be ordered at all.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        if let Some((a, b)) = self.temporal_pair(other) {
            return Ok(a.compare(&b));
        }
        let not_comparable = || {
            Error::TypeError(format!(
                "cannot compare {} with {}",
                self.type_name(),
                other.type_name()
            ))
        };
        let (a, b) = match (self.primitive(), other.primitive()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(not_comparable()),
        };
        match (&a, &b) {
            (PrimitiveValue::String(x), PrimitiveValue::String(y)) => Ok(Some(x.cmp(y))),
            (PrimitiveValue::Boolean(_), _) | (_, PrimitiveValue::Boolean(_)) => {
                Err(not_comparable())
            }
            _ => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => Ok(Some(x.cmp(&y))),
                _ => Err(not_comparable()),
            },
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Node(node) => match node.value() {
                Some(v) => write!(f, "{}({})", node.type_name(), v),
                None => write!(f, "{}", node.type_name()),
            },
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Ordered result of an expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection(SmallVec<[Value; 2]>);

impl Collection {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn singleton(value: Value) -> Self {
        let mut items = SmallVec::new();
        items.push(value);
        Self(items)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(SmallVec::with_capacity(capacity))
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Value> {
        self.0.last()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// True if an equal item is already present.
    pub fn contains_value(&self, value: &Value) -> bool {
        self.iter().any(|item| item.equals(value) == Some(true))
    }

    /// Append `value` unless an equal item is already present.
    pub fn push_distinct(&mut self, value: Value) {
        if !self.contains_value(&value) {
            self.push(value);
        }
    }

    /// The single item, `None` when empty. More than one item is an error.
    pub fn singleton_value(&self, what: &str) -> Result<Option<&Value>> {
        match self.0.as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            items => Err(Error::EvaluationError(format!(
                "{} expects a single item, got {}",
                what,
                items.len()
            ))),
        }
    }

    /// Boolean reading of a collection: empty is unknown, a single boolean
    /// is itself and any other single item counts as `true`.
    pub fn as_boolean(&self) -> Result<Option<bool>> {
        Ok(self
            .singleton_value("boolean evaluation")?
            .map(|v| v.as_bool().unwrap_or(true)))
    }

    pub fn as_string(&self, what: &str) -> Result<Option<&str>> {
        match self.singleton_value(what)? {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| Error::TypeError(format!("{} expects a string", what))),
        }
    }

    pub fn as_integer(&self, what: &str) -> Result<Option<i64>> {
        match self.singleton_value(what)? {
            None => Ok(None),
            Some(v) => v
                .as_integer()
                .map(Some)
                .ok_or_else(|| Error::TypeError(format!("{} expects an integer", what))),
        }
    }

    /// `Some(true)` or `Some(false)` as a collection, `None` as empty.
    pub fn from_bool(value: Option<bool>) -> Self {
        value.map_or_else(Self::empty, |b| Self::singleton(Value::boolean(b)))
    }
}

impl IntoIterator for Collection {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 2]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Value> for Collection {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_model::datatypes;

    #[test]
    fn test_primitive_nodes_compare_by_value() {
        let node = Value::node(datatypes::string("abc").unwrap());
        assert_eq!(node.equals(&Value::string("abc")), Some(true));
        assert_eq!(
            Value::integer(2).equals(&Value::decimal(Decimal::new(20, 1))),
            Some(true)
        );
        assert_eq!(Value::integer(2).equals(&Value::string("2")), Some(false));
    }

    #[test]
    fn test_complex_nodes_compare_structurally() {
        let a = Value::node(datatypes::coding("urn:sys", "a").unwrap());
        let b = Value::node(datatypes::coding("urn:sys", "a").unwrap());
        let c = Value::node(datatypes::coding("urn:sys", "c").unwrap());
        assert_eq!(a.equals(&b), Some(true));
        assert_eq!(a.equals(&c), Some(false));
    }

    #[test]
    fn test_date_nodes_compare_temporally() {
        let start = Value::node(datatypes::date_time("2024-01-01T10:00:00+02:00").unwrap());
        let end = Value::node(datatypes::date_time("2024-01-01T09:00:00Z").unwrap());
        assert_eq!(start.compare(&end).unwrap(), Some(Ordering::Less));
        let month = Value::node(datatypes::date_time("2024-01").unwrap());
        assert_eq!(month.compare(&end).unwrap(), None);
    }

    #[test]
    fn test_boolean_reading() {
        assert_eq!(Collection::empty().as_boolean().unwrap(), None);
        assert_eq!(
            Collection::singleton(Value::string("x")).as_boolean().unwrap(),
            Some(true)
        );
        let two: Collection = vec![Value::boolean(true), Value::boolean(true)]
            .into_iter()
            .collect();
        assert!(two.as_boolean().is_err());
    }

    #[test]
    fn test_equivalence_normalizes_strings() {
        assert!(Value::string("Hello  World").equivalent(&Value::string("hello world")));
        assert!(!Value::string("a").equivalent(&Value::string("b")));
    }
}
