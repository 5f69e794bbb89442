use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One club, keyed by canonical field names and ready for the index file or
/// the database. Values are JSON scalars; lists have already been
/// comma-joined by the mapper. A record is never mutated after mapping
/// except through [`CanonicalRecord::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord(pub Map<String, Value>);

impl CanonicalRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The primary key. Stable across runs; records without one cannot be
    /// reconciled and are dropped before writing.
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last-write-wins key union: keys present in `enrichment` override the
    /// base record, everything else is kept. The mapper never emits empty
    /// values, so a merge cannot blank out a previously enriched field.
    pub fn merge(&mut self, enrichment: CanonicalRecord) {
        for (key, value) in enrichment.0 {
            self.0.insert(key, value);
        }
    }
}
