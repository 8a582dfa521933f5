// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::EtlConfig;
pub use crate::ingest::fetch::{Fetcher, HttpTransport};
pub use crate::ingest::retry::{RetryPolicy, TokioSleeper};
pub use crate::ingest::{run_once, RunReport, RunStatus};
pub use crate::store::{IndicatorStore, MemoryStore, MongoStore};
