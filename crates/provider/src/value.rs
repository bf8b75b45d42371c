//! Runtime values carried in provider records
//!
//! Closed union over the kinds a rig script can put in a provider field.
//! Containers are mutable until frozen; freezing is one-way and recursive.
//! Cloning a `Value` shares the underlying container, it never deep-copies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::record::Record;

/// Errors raised by value mutation and conversion
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("cannot mutate frozen list")]
    FrozenList,

    #[error("cannot mutate frozen dict")]
    FrozenDict,

    #[error("cannot represent {kind} value as JSON")]
    Unrepresentable { kind: &'static str },
}

/// A value of the build-description language
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<List>),
    Dict(Arc<Dict>),
    /// A nested provider instance
    Record(Arc<Record>),
    /// Opaque handle to a host-language function
    Callable(Arc<Callable>),
}

impl Value {
    /// The type name as scripts see it
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Record(_) => "record",
            Value::Callable(_) => "function",
        }
    }

    /// Whether this value can no longer change
    ///
    /// Scalars, strings, and callables always qualify. Containers must be
    /// frozen and hold only immutable elements; a nested record answers
    /// through its own provider/export check. Evaluated fresh on every
    /// call: an unfrozen container or an unexported provider can become
    /// immutable later, never the reverse, so a cached answer could go
    /// stale.
    pub fn is_immutable(&self) -> bool {
        match self {
            Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::Callable(_) => true,
            Value::List(list) => list.is_immutable(),
            Value::Dict(dict) => dict.is_immutable(),
            Value::Record(record) => record.is_immutable(),
        }
    }

    /// Recursively freeze every container reachable from this value
    pub fn freeze(&self) {
        match self {
            Value::List(list) => list.freeze(),
            Value::Dict(dict) => dict.freeze(),
            Value::Record(record) => record.freeze_values(),
            _ => {}
        }
    }

    /// JSON view of this value, for introspection and logging
    ///
    /// Callables and non-finite floats have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        Ok(match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or(ValueError::Unrepresentable {
                    kind: "non-finite float",
                })?,
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(list) => {
                let items = list.items.read().unwrap();
                serde_json::Value::Array(
                    items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
                )
            }
            Value::Dict(dict) => {
                let entries = dict.entries.read().unwrap();
                let mut map = serde_json::Map::new();
                for (key, value) in entries.iter() {
                    map.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Record(record) => record.to_json()?,
            Value::Callable(_) => {
                return Err(ValueError::Unrepresentable { kind: "function" });
            }
        })
    }
}

// Values of different types are never equal. Floats follow IEEE-754
// (NaN != NaN); callables compare by handle identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || *a.items.read().unwrap() == *b.items.read().unwrap()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                Arc::ptr_eq(a, b) || *a.entries.read().unwrap() == *b.entries.read().unwrap()
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.token == b.token,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value.as_str()))
    }
}

/// A sequence value, mutable until frozen
#[derive(Debug)]
pub struct List {
    items: RwLock<Vec<Value>>,
    frozen: AtomicBool,
}

impl List {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().unwrap().get(index).cloned()
    }

    /// Snapshot of the current items
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().unwrap().clone()
    }

    pub fn push(&self, value: Value) -> Result<(), ValueError> {
        if self.is_frozen() {
            return Err(ValueError::FrozenList);
        }
        self.items.write().unwrap().push(value);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// One-way freeze, recursing into the current elements
    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        for item in self.items.read().unwrap().iter() {
            item.freeze();
        }
    }

    pub fn is_immutable(&self) -> bool {
        self.is_frozen() && self.items.read().unwrap().iter().all(Value::is_immutable)
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

/// A string-keyed mapping value, mutable until frozen
///
/// Keys iterate in sorted order, so downstream output is deterministic.
#[derive(Debug)]
pub struct Dict {
    entries: RwLock<BTreeMap<String, Value>>,
    frozen: AtomicBool,
}

impl Dict {
    pub fn new() -> Self {
        Self::from_map(BTreeMap::new())
    }

    pub fn from_map(entries: BTreeMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    /// Snapshot of the current entries
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries.read().unwrap().clone()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Result<(), ValueError> {
        if self.is_frozen() {
            return Err(ValueError::FrozenDict);
        }
        self.entries.write().unwrap().insert(key.into(), value);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// One-way freeze, recursing into the current entries
    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        for value in self.entries.read().unwrap().values() {
            value.freeze();
        }
    }

    pub fn is_immutable(&self) -> bool {
        self.is_frozen() && self.entries.read().unwrap().values().all(Value::is_immutable)
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle to a host-language function
///
/// The engine never calls it; the host keeps the token-to-function mapping
/// and uses the name for display. Callables count as immutable.
#[derive(Debug)]
pub struct Callable {
    token: u64,
    name: Arc<str>,
}

impl Callable {
    pub fn new(token: u64, name: impl Into<Arc<str>>) -> Self {
        Self {
            token,
            name: name.into(),
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
