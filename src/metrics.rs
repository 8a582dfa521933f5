// src/metrics.rs
use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::io::Write;
use std::path::Path;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call at most once.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Current exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Dump the exposition for a node-exporter textfile collector.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}

/// Write via a sibling temp file and rename, so scrapers never see half a file.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(tmp, path)
}
