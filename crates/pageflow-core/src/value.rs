use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One record produced by a multi-item extraction. Missing attributes stay `None`.
pub type Record = BTreeMap<String, Option<String>>;

/// Value stored in the shared execution context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum ContextValue {
    Text(String),
    Records(Vec<Record>),
    Json(serde_json::Value),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            ContextValue::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            ContextValue::Records(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ContextValue::Json(j) => Some(j),
            _ => None,
        }
    }

    /// JSON rendering used when a value leaves the engine, e.g. as an HTTP payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ContextValue::Text(s) => serde_json::Value::String(s.clone()),
            ContextValue::Records(records) => serde_json::Value::Array(
                records
                    .iter()
                    .map(|record| {
                        serde_json::Value::Object(
                            record
                                .iter()
                                .map(|(k, v)| {
                                    let v = v
                                        .clone()
                                        .map(serde_json::Value::String)
                                        .unwrap_or(serde_json::Value::Null);
                                    (k.clone(), v)
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            ),
            ContextValue::Json(j) => j.clone(),
        }
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<Vec<Record>> for ContextValue {
    fn from(r: Vec<Record>) -> Self {
        ContextValue::Records(r)
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(j: serde_json::Value) -> Self {
        ContextValue::Json(j)
    }
}

/// Per-run mapping shared by every node of one workflow.
///
/// Only the single sequential traversal of a workflow mutates it, so it needs no locking.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, ContextValue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted key list. Status reporting exposes keys only, never values.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}
