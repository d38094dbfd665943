//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate STREAMLINE_CONFIG are marked with #[serial]
//! so they never race on the process environment.

use serial_test::serial;
use std::env;
use std::io::Write;
use streamline_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use streamline_common::Error;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    file
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_argument() {
    let file = write_config("transcode_endpoint = \"http://tx.local/t\"\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let resolved = resolve_config_path(None);
    assert_eq!(resolved.as_deref(), Some(file.path()));

    let config = TomlConfig::load(None).expect("Config should load from env path");
    assert_eq!(config.transcode_endpoint, "http://tx.local/t");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_argument_overrides_env_var() {
    let env_file = write_config("proxy_endpoint = \"http://from-env/p\"\n");
    let cli_file = write_config("proxy_endpoint = \"http://from-cli/p\"\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::load(Some(cli_file.path())).expect("Config should load");
    assert_eq!(config.proxy_endpoint, "http://from-cli/p");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_reported() {
    env::remove_var(CONFIG_ENV_VAR);
    let missing = std::path::Path::new("/nonexistent/streamline/config.toml");

    let result = TomlConfig::load(Some(missing));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_full_file_round_trip() {
    let file = write_config(
        r#"
        proxy_endpoint = "https://edge.example/proxy"
        transcode_endpoint = "https://edge.example/transcode"

        [playback]
        stall_delay_ms = 3000
        seek_debounce_ms = 200
        keyframe_interval_secs = 4.0
        quota_retry_limit = 10
        queue_high_water = 16

        [logging]
        level = "debug"
        "#,
    );

    let config = TomlConfig::from_file(file.path()).expect("Config should parse");
    assert_eq!(config.playback.stall_delay_ms, 3000);
    assert_eq!(config.playback.seek_debounce_ms, 200);
    assert_eq!(config.playback.keyframe_interval_secs, 4.0);
    assert_eq!(config.playback.quota_retry_limit, Some(10));
    assert_eq!(config.playback.queue_high_water, 16);
    assert_eq!(config.playback.max_recovery_attempts, 2);
    assert_eq!(config.logging.level, "debug");
}
