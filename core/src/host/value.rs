//! Host-side values

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::function::BoundFunction;
use crate::executor::types::values::format_number;

/// Largest integer a script number holds exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Opaque host identifier passed through scripts unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub i64);

/// A value on the host side of the boundary
#[derive(Debug, Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    List(Vec<HostValue>),
    Map(BTreeMap<String, HostValue>),
    Handle(Handle),
    Function(BoundFunction),
}

impl HostValue {
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, HostValue>> {
        match self {
            HostValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&BoundFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Field of a map; `None` for missing fields and non-maps
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_map().and_then(|fields| fields.get(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Int(_) | HostValue::Num(_) => "number",
            HostValue::Str(_) => "string",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "object",
            HostValue::Handle(_) => "handle",
            HostValue::Function(_) => "function",
        }
    }

    /// JSON rendering; handles become `{"handle": n}` and functions a marker string
    pub fn to_json(&self) -> JsonValue {
        match self {
            HostValue::Null => JsonValue::Null,
            HostValue::Bool(b) => JsonValue::Bool(*b),
            HostValue::Int(i) => JsonValue::from(*i),
            HostValue::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            HostValue::Str(s) => JsonValue::String(s.clone()),
            HostValue::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            HostValue::Map(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            HostValue::Handle(h) => serde_json::json!({ "handle": h.0 }),
            HostValue::Function(_) => JsonValue::String("<function>".to_string()),
        }
    }

    pub fn from_json(value: &JsonValue) -> HostValue {
        match value {
            JsonValue::Null => HostValue::Null,
            JsonValue::Bool(b) => HostValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => HostValue::Int(i),
                None => HostValue::Num(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => HostValue::Str(s.clone()),
            JsonValue::Array(items) => HostValue::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(fields) => HostValue::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Numbers compare by value across `Int` and `Num`
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Num(a), HostValue::Num(b)) => a == b,
            (HostValue::Int(a), HostValue::Num(b)) | (HostValue::Num(b), HostValue::Int(a)) => {
                *a as f64 == *b
            }
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a == b,
            (HostValue::Map(a), HostValue::Map(b)) => a == b,
            (HostValue::Handle(a), HostValue::Handle(b)) => a == b,
            (HostValue::Function(a), HostValue::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Num(n) => write!(f, "{}", format_number(*n)),
            HostValue::Str(s) => write!(f, "{}", s),
            HostValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HostValue::Map(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            HostValue::Handle(h) => write!(f, "handle: {}", h.0),
            HostValue::Function(func) => write!(f, "{:?}", func),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Num(n)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Handle> for HostValue {
    fn from(h: Handle) -> Self {
        HostValue::Handle(h)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::List(items)
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(fields: BTreeMap<String, HostValue>) -> Self {
        HostValue::Map(fields)
    }
}
