//! Indicator feed ETL — Binary Entrypoint
//! Loads configuration, runs fetch → normalize → persist once, and exits.
//!
//! Meant to be invoked periodically by an external scheduler (cron, systemd
//! timer). Failures inside the pipeline are logged; the exit status is 0 unless
//! `ETL_STRICT_EXIT` is set.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ioc_feed_etl::config::{EtlConfig, LogFormat};
use ioc_feed_etl::metrics::Metrics;
use ioc_feed_etl::{run_once, Fetcher, HttpTransport, MongoStore, TokioSleeper};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ioc_feed_etl=info,ingest=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn run(cfg: EtlConfig) -> Result<ExitCode> {
    let metrics = match &cfg.metrics_textfile {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let transport =
        HttpTransport::new(cfg.feed.request_timeout).context("building feed http client")?;
    let fetcher = Fetcher::new(transport, TokioSleeper, cfg.feed.retry_policy());
    let store = MongoStore::new(cfg.store.clone());

    let report = run_once(&cfg.feed.query(), &fetcher, &store).await;
    let status = report.status();
    tracing::info!(
        target: "ingest",
        status = ?status,
        received = report.received,
        normalized = report.normalized,
        inserted = report.inserted(),
        "run finished"
    );

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }

    if cfg.strict_exit && status.is_failure() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    // Config errors surface through `main`'s Result before logging exists.
    let cfg = EtlConfig::load().context("loading configuration")?;
    init_tracing(cfg.log_format);

    tracing::info!(
        endpoint = %cfg.feed.endpoint,
        key_len = cfg.feed.auth_key.len(),
        days = cfg.feed.window_days,
        database = %cfg.store.database,
        collection = %cfg.store.collection,
        "configuration loaded"
    );

    run(cfg).await
}
