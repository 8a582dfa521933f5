// src/config/file.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional on-disk settings. Every key may be overridden by its environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub auth_key: Option<String>,
    pub days: Option<u32>,
    pub mongo_uri: Option<String>,
    pub db_name: Option<String>,
    pub collection_name: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub metrics_textfile: Option<PathBuf>,
    pub strict_exit: Option<bool>,
    pub log_format: Option<String>,
}

/// Load settings from an explicit path. Supports TOML or JSON formats.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_file_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

fn parse_file_config(s: &str, hint_ext: &str) -> Result<FileConfig> {
    match hint_ext {
        "toml" => return Ok(toml::from_str(s)?),
        "json" => return Ok(serde_json::from_str(s)?),
        _ => {}
    }
    // No usable extension: sniff. JSON must start with an object.
    if s.trim_start().starts_with('{') {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
}
