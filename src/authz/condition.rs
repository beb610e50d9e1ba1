use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Runtime attributes a condition map is evaluated against.
pub type ConditionContext = Map<String, Value>;

const GT: &str = "$gt";
const LT: &str = "$lt";
const IN: &str = "$in";
const NIN: &str = "$nin";

/// A single predicate on one context key.
///
/// Parsed once from its JSON form when the permission is loaded. An array is
/// a membership test, an object carrying `$gt`, `$lt`, `$in` or `$nin` is an
/// operator (first marker in that order wins), anything else is an equality
/// test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Condition {
    Equals(Value),
    OneOf(Vec<Value>),
    GreaterThan(Value),
    LessThan(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
}

impl Condition {
    /// Check the condition against the actual value, `None` when the key is
    /// absent from the context.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Condition::Equals(expected) => actual.is_some_and(|a| strict_eq(a, expected)),
            Condition::OneOf(set) | Condition::In(set) => {
                actual.is_some_and(|a| set.iter().any(|v| strict_eq(a, v)))
            }
            Condition::NotIn(set) => !actual.is_some_and(|a| set.iter().any(|v| strict_eq(a, v))),
            Condition::GreaterThan(threshold) => {
                actual.and_then(|a| compare(a, threshold)) == Some(Ordering::Greater)
            }
            Condition::LessThan(threshold) => {
                actual.and_then(|a| compare(a, threshold)) == Some(Ordering::Less)
            }
        }
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Condition::OneOf(items),
            Value::Object(mut obj) => {
                if let Some(threshold) = obj.remove(GT) {
                    Condition::GreaterThan(threshold)
                } else if let Some(threshold) = obj.remove(LT) {
                    Condition::LessThan(threshold)
                } else if let Some(set) = obj.remove(IN) {
                    Condition::In(into_set(set))
                } else if let Some(set) = obj.remove(NIN) {
                    Condition::NotIn(into_set(set))
                } else {
                    Condition::Equals(Value::Object(obj))
                }
            }
            other => Condition::Equals(other),
        }
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        fn marker(name: &str, value: Value) -> Value {
            let mut obj = Map::new();
            obj.insert(name.to_string(), value);
            Value::Object(obj)
        }

        match condition {
            Condition::Equals(v) => v,
            Condition::OneOf(items) => Value::Array(items),
            Condition::GreaterThan(v) => marker(GT, v),
            Condition::LessThan(v) => marker(LT, v),
            Condition::In(items) => marker(IN, Value::Array(items)),
            Condition::NotIn(items) => marker(NIN, Value::Array(items)),
        }
    }
}

fn into_set(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        single => vec![single],
    }
}

/// Equality with numbers compared by value, so `18` equals `18.0`.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Every key must be satisfied by the context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionMap(BTreeMap<String, Condition>);

impl ConditionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, condition: Condition) -> Self {
        self.0.insert(key.into(), condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.0.iter()
    }

    pub fn evaluate(&self, context: &ConditionContext) -> bool {
        self.0
            .iter()
            .all(|(key, condition)| condition.matches(context.get(key)))
    }
}

impl FromIterator<(String, Condition)> for ConditionMap {
    fn from_iter<I: IntoIterator<Item = (String, Condition)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Evaluate a condition map against a context.
pub fn evaluate(conditions: &ConditionMap, context: &ConditionContext) -> bool {
    conditions.evaluate(context)
}
