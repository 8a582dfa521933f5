// src/ingest/persist.rs
use thiserror::Error;

use crate::ingest::types::IndicatorRecord;
use crate::store::{IndicatorStore, InsertOutcome, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub inserted: usize,
    /// Records skipped because their `id` was already stored.
    pub duplicates: usize,
}

/// A store failure that stopped the batch. Inserts made before it stay committed.
#[derive(Debug, Error)]
#[error("persistence aborted after {} inserted: {source}", .summary.inserted)]
pub struct PersistFailure {
    pub summary: PersistSummary,
    #[source]
    pub source: StoreError,
}

/// Insert each record individually, skipping duplicates.
///
/// An empty batch touches nothing, not even the index.
pub async fn persist<S>(records: &[IndicatorRecord], store: &S) -> Result<PersistSummary, PersistFailure>
where
    S: IndicatorStore + ?Sized,
{
    let mut summary = PersistSummary::default();
    if records.is_empty() {
        return Ok(summary);
    }

    if let Err(source) = store.ensure_unique_id().await {
        return Err(PersistFailure { summary, source });
    }

    for rec in records {
        match store.insert(rec).await {
            Ok(InsertOutcome::Inserted) => summary.inserted += 1,
            Ok(InsertOutcome::Duplicate) => {
                tracing::trace!(target: "ingest", id = %rec.id_key(), "duplicate id, skipped");
                summary.duplicates += 1;
            }
            Err(source) => return Err(PersistFailure { summary, source }),
        }
    }

    Ok(summary)
}
