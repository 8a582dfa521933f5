// src/ingest/mod.rs
pub mod fetch;
pub mod normalize;
pub mod persist;
pub mod retry;
pub mod types;

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::fetch::{FeedTransport, FetchError, Fetcher};
use crate::ingest::persist::{PersistFailure, PersistSummary};
use crate::ingest::retry::Sleeper;
use crate::ingest::types::{FeedQuery, RawResponse};
use crate::store::IndicatorStore;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("etl_fetch_attempts_total", "Feed requests sent, retries included.");
        describe_counter!(
            "etl_fetch_retries_total",
            "Feed retries by reason (rate_limited, timeout, connect)."
        );
        describe_counter!(
            "etl_fetch_failures_total",
            "Runs whose extraction produced no payload, by error kind."
        );
        describe_histogram!("etl_fetch_ms", "Extraction time in milliseconds, retries included.");
        describe_counter!(
            "etl_normalize_kept_total",
            "Indicators kept after normalization."
        );
        describe_counter!(
            "etl_normalize_skipped_total",
            "Feed entries dropped (non-object or missing id)."
        );
        describe_counter!("etl_persist_inserted_total", "Indicators newly inserted.");
        describe_counter!(
            "etl_persist_duplicates_total",
            "Indicators skipped because their id was already stored."
        );
        describe_counter!(
            "etl_persist_errors_total",
            "Persistence batches aborted by a store error."
        );
        describe_gauge!("etl_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Coarse outcome of a run, for alerting on top of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one valid record reached the store (inserted or duplicate).
    Completed,
    /// Feed answered fine but nothing survived normalization.
    NoData,
    ExtractFailed,
    PersistFailed,
}

impl RunStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::ExtractFailed | RunStatus::PersistFailed)
    }
}

/// Everything a run produced. Stage failures are values here, never panics.
#[derive(Debug)]
pub struct RunReport {
    /// Entries in the feed's `data` array.
    pub received: usize,
    pub normalized: usize,
    pub skipped: usize,
    pub extract_error: Option<FetchError>,
    pub persist: Result<PersistSummary, PersistFailure>,
}

impl RunReport {
    pub fn inserted(&self) -> usize {
        match &self.persist {
            Ok(s) => s.inserted,
            Err(f) => f.summary.inserted,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.extract_error.is_some() {
            RunStatus::ExtractFailed
        } else if self.persist.is_err() {
            RunStatus::PersistFailed
        } else if self.normalized == 0 {
            RunStatus::NoData
        } else {
            RunStatus::Completed
        }
    }
}

/// Fetch → normalize → persist, once. Each stage absorbs its own failure and
/// hands "nothing" downstream; the report says what happened.
pub async fn run_once<T, S, St>(query: &FeedQuery, fetcher: &Fetcher<T, S>, store: &St) -> RunReport
where
    T: FeedTransport,
    S: Sleeper,
    St: IndicatorStore + ?Sized,
{
    ensure_metrics_described();

    tracing::info!(
        target: "ingest",
        endpoint = %query.endpoint,
        days = query.days,
        "extracting indicators from feed"
    );
    let t0 = Instant::now();
    let fetched = fetcher.fetch(query).await;
    histogram!("etl_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let (raw, extract_error) = match fetched {
        Ok(raw) => (Some(raw), None),
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, kind = e.kind(), "extraction failed");
            counter!("etl_fetch_failures_total", "kind" => e.kind()).increment(1);
            (None, Some(e))
        }
    };
    if let Some(status) = raw.as_ref().and_then(RawResponse::query_status) {
        tracing::debug!(target: "ingest", query_status = status, "feed query status");
    }

    let received = raw.as_ref().map(RawResponse::data_len).unwrap_or(0);
    let records = normalize::normalize(raw.as_ref());
    let skipped = received.saturating_sub(records.len());
    if records.is_empty() {
        tracing::warn!(target: "ingest", "no valid entries found in feed response");
    } else {
        tracing::info!(
            target: "ingest",
            received,
            kept = records.len(),
            skipped,
            "transformed feed entries"
        );
    }
    counter!("etl_normalize_kept_total").increment(records.len() as u64);
    counter!("etl_normalize_skipped_total").increment(skipped as u64);

    let persist = persist::persist(&records, store).await;
    match &persist {
        Ok(_) if records.is_empty() => {
            tracing::warn!(target: "ingest", store = store.name(), "no data to insert");
        }
        Ok(s) => {
            tracing::info!(
                target: "ingest",
                store = store.name(),
                inserted = s.inserted,
                duplicates = s.duplicates,
                "inserted new indicators"
            );
            counter!("etl_persist_inserted_total").increment(s.inserted as u64);
            counter!("etl_persist_duplicates_total").increment(s.duplicates as u64);
        }
        Err(f) => {
            tracing::error!(
                target: "ingest",
                store = store.name(),
                error = %f.source,
                inserted = f.summary.inserted,
                duplicates = f.summary.duplicates,
                "failed to insert indicators"
            );
            counter!("etl_persist_inserted_total").increment(f.summary.inserted as u64);
            counter!("etl_persist_duplicates_total").increment(f.summary.duplicates as u64);
            counter!("etl_persist_errors_total").increment(1);
        }
    }

    gauge!("etl_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    RunReport {
        received,
        normalized: records.len(),
        skipped,
        extract_error,
        persist,
    }
}
