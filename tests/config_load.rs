//! `Config::load` against the real process environment
//!
//! These tests mutate process-wide environment variables and run serially.

use baidupcs_leecher::{Config, Error, TransferPolicy};
use serial_test::serial;
use std::path::Path;

const VARS: &[&str] = &[
    "DATA_DIR",
    "REMOTE_LEECHER_DIR",
    "RUNNER_SLEEP_SECONDS",
    "TRANSFER_POLICY",
    "PAN_BAIDU_BDUSS",
    "RETRY_TIMES_LIMIT",
    "IGNORE_PATH_RE",
];

fn clear_env() {
    for var in VARS {
        // SAFETY: tests touching the environment are #[serial]
        unsafe { std::env::remove_var(var) };
    }
}

fn set_env(key: &str, value: &str) {
    // SAFETY: tests touching the environment are #[serial]
    unsafe { std::env::set_var(key, value) };
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        r#"{"storage": {"data_root_dir": "/from/file", "sample_byte_limit": 2048},
            "pipeline": {"retry_limit": 9}}"#,
    )
    .unwrap();

    set_env("DATA_DIR", "/from/env");
    set_env("TRANSFER_POLICY", "always");
    set_env("PAN_BAIDU_BDUSS", "bduss-value");

    let config = Config::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.storage.data_root_dir, Path::new("/from/env"));
    assert_eq!(config.storage.sample_byte_limit, 2048);
    assert_eq!(config.pipeline.retry_limit, 9);
    assert_eq!(config.pipeline.transfer_policy, TransferPolicy::Always);
    assert_eq!(config.remote.bduss, "bduss-value");
}

#[test]
#[serial]
fn test_invalid_environment_is_a_config_error() {
    clear_env();
    set_env("RUNNER_SLEEP_SECONDS", "soon");
    let err = Config::load(None).unwrap_err();
    clear_env();

    match err {
        Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("RUNNER_SLEEP_SECONDS")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
#[serial]
fn test_loaded_config_is_validated() {
    clear_env();
    set_env("REMOTE_LEECHER_DIR", "relative/dir");
    let result = Config::load(None);
    clear_env();

    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
#[serial]
fn test_missing_file_is_reported() {
    clear_env();
    let err = Config::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
    assert!(err.to_string().contains("not/here.json"), "{}", err);
}
