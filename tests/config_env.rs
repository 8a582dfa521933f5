// tests/config_env.rs
use std::{env, fs, time::Duration};

use ioc_feed_etl::config::{EtlConfig, LogFormat, ENV_CONFIG_PATH};

const KEYS: &[&str] = &[
    ENV_CONFIG_PATH,
    "API_URL",
    "THREATFOX_AUTH_KEY",
    "DAYS",
    "MONGO_URI",
    "DB_NAME",
    "COLLECTION_NAME",
    "FETCH_MAX_ATTEMPTS",
    "FETCH_RETRY_DELAY_SECS",
    "FETCH_TIMEOUT_SECS",
    "METRICS_TEXTFILE",
    "ETL_STRICT_EXIT",
    "LOG_FORMAT",
];

fn clear_env() {
    for k in KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn env_only_configuration() {
    clear_env();
    env::set_var("THREATFOX_AUTH_KEY", "abc123");
    env::set_var("MONGO_URI", "mongodb://localhost:27017");
    env::set_var("DAYS", "2");
    env::set_var("FETCH_RETRY_DELAY_SECS", "1");

    let cfg = EtlConfig::load().unwrap();
    assert_eq!(cfg.feed.auth_key, "abc123");
    assert_eq!(cfg.feed.window_days, 2);
    assert_eq!(cfg.feed.retry_delay, Duration::from_secs(1));
    assert_eq!(cfg.feed.query().days, 2);
    assert_eq!(cfg.store.uri, "mongodb://localhost:27017");

    clear_env();
}

#[serial_test::serial]
#[test]
fn file_layer_with_env_override() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("etl.toml");
    fs::write(
        &p,
        r#"
auth_key = "from-file"
mongo_uri = "mongodb://file-host:27017"
db_name = "intel"
collection_name = "iocs"
days = 1
log_format = "json"
"#,
    )
    .unwrap();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    env::set_var("COLLECTION_NAME", "iocs_override");

    let cfg = EtlConfig::load().unwrap();
    assert_eq!(cfg.feed.auth_key, "from-file");
    assert_eq!(cfg.feed.window_days, 1);
    assert_eq!(cfg.store.database, "intel");
    assert_eq!(cfg.store.collection, "iocs_override");
    assert_eq!(cfg.log_format, LogFormat::Json);

    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_config_file_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/etl.toml");
    let err = EtlConfig::load().unwrap_err();
    assert!(err.to_string().contains(ENV_CONFIG_PATH));
    clear_env();
}
