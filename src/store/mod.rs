// src/store/mod.rs
pub mod memory;
pub mod mongo;

use thiserror::Error;

use crate::ingest::types::IndicatorRecord;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result of a single insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same `id` is already stored; nothing was written.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connect(String),
    #[error("creating unique index on `id` failed: {0}")]
    Index(String),
    #[error("insert failed: {0}")]
    Insert(String),
    #[error("record could not be encoded: {0}")]
    Encode(String),
}

/// Insert-only keyed collection with a uniqueness constraint on `id`.
#[async_trait::async_trait]
pub trait IndicatorStore: Send + Sync {
    /// Create the unique index on `id` if missing. Safe to call repeatedly.
    async fn ensure_unique_id(&self) -> Result<(), StoreError>;

    /// Insert one record. A uniqueness violation is reported as
    /// `InsertOutcome::Duplicate`, never as an error.
    async fn insert(&self, record: &IndicatorRecord) -> Result<InsertOutcome, StoreError>;

    fn name(&self) -> &'static str;
}
