// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use ioc_feed_etl::ingest::fetch::{FeedReply, FeedTransport, TransportError};
use ioc_feed_etl::ingest::types::{FeedQuery, IndicatorRecord};
use ioc_feed_etl::store::{IndicatorStore, InsertOutcome, MemoryStore, StoreError};

/// Replays canned replies in order and records every query it was sent.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<FeedReply, TransportError>>>,
    pub seen: Mutex<Vec<FeedQuery>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<FeedReply, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn send(&self, query: &FeedQuery) -> Result<FeedReply, TransportError> {
        self.seen.lock().unwrap().push(query.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

pub fn query() -> FeedQuery {
    FeedQuery {
        endpoint: "http://feed.test/api/v1/".into(),
        auth_key: "test-key".into(),
        days: 7,
    }
}

pub fn timeout() -> Result<FeedReply, TransportError> {
    Err(TransportError::Timeout("operation timed out".into()))
}

pub fn record(v: Value) -> IndicatorRecord {
    IndicatorRecord::new(v.as_object().expect("object").clone(), Utc::now()).expect("has id")
}

/// Memory store that fails the n-th insert call (1-based) with an insert error.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on_insert: usize,
    pub fail_index: bool,
}

impl FailingStore {
    pub fn failing_insert(n: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on_insert: n,
            fail_index: false,
        }
    }

    pub fn failing_index() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on_insert: usize::MAX,
            fail_index: true,
        }
    }
}

#[async_trait]
impl IndicatorStore for FailingStore {
    async fn ensure_unique_id(&self) -> Result<(), StoreError> {
        if self.fail_index {
            return Err(StoreError::Connect("server selection timeout".into()));
        }
        self.inner.ensure_unique_id().await
    }

    async fn insert(&self, record: &IndicatorRecord) -> Result<InsertOutcome, StoreError> {
        if self.inner.insert_calls() + 1 == self.fail_on_insert {
            return Err(StoreError::Insert("connection reset".into()));
        }
        self.inner.insert(record).await
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
