// src/store/memory.rs
use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use super::{IndicatorStore, InsertOutcome, StoreError};
use crate::ingest::types::IndicatorRecord;

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, Value>,
    order: Vec<Value>,
    index_calls: usize,
    insert_calls: usize,
}

/// In-process collection keyed by canonical `id`. Same skip-on-duplicate
/// semantics as the Mongo backend; also counts calls so tests can assert that
/// nothing was written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored document for `id`, matched by JSON value: `"7"` and `7` differ.
    pub fn get(&self, id: impl Into<Value>) -> Option<Value> {
        self.lock().docs.get(&id.into().to_string()).cloned()
    }

    /// Stored ids in insertion order.
    pub fn ids(&self) -> Vec<Value> {
        self.lock().order.clone()
    }

    pub fn index_calls(&self) -> usize {
        self.lock().index_calls
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait::async_trait]
impl IndicatorStore for MemoryStore {
    async fn ensure_unique_id(&self) -> Result<(), StoreError> {
        self.lock().index_calls += 1;
        Ok(())
    }

    async fn insert(&self, record: &IndicatorRecord) -> Result<InsertOutcome, StoreError> {
        let mut g = self.lock();
        g.insert_calls += 1;
        let key = record.id_key();
        if g.docs.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }
        g.docs.insert(key, record.to_json());
        g.order.push(record.id().clone());
        Ok(InsertOutcome::Inserted)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
