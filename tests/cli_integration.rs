//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use tempfile::NamedTempFile;

use ree_session::cli::{parse_args_from, Args};
use ree_session::config::{Config, ConfigError};
use ree_session::{TeeUuid, Timeout};

const SERVICE: &str = "8aaaf200-2450-11e4-abe2-0002a5d5c51b";

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("ree-session")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.config.is_none());
    assert!(result.service.is_none());
    assert!(result.command.is_none());
    assert!(result.log_level.is_none());
    assert!(!result.help);
    assert!(!result.version);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-s", SERVICE, "-C", "7", "-a", "999", "-t", "2000", "-l", "debug",
    ]))
    .unwrap();

    assert_eq!(result.service.unwrap().to_string(), SERVICE);
    assert_eq!(result.command, Some(7));
    assert_eq!(result.value, 999);
    assert_eq!(result.timeout_ms, Some(2000));
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_invalid_timeout() {
    assert!(parse_args_from(args(&["-t", "forever"])).is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = format!(
        r#"{{
        "session": {{
            "service": "{}",
            "timeout_ms": 1000,
            "command": 12
        }},
        "logging": {{
            "level": "debug"
        }}
    }}"#,
        SERVICE
    );

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.service().unwrap().to_string(), SERVICE);
    assert_eq!(config.timeout(), Timeout::from_millis(1000));
    assert_eq!(config.session.command, 12);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_invalid_uuid_in_file() {
    let json = r#"{"session": {"service": "nope"}}"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let result = Config::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::Json(_))));
}

#[test]
fn test_config_missing_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/ree-session.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "session": {
            "service": "00000000-0000-0000-0000-000000000001",
            "command": 3
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        service: Some(SERVICE.parse().unwrap()),
        command: Some(8),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.service().unwrap().to_string(), SERVICE);
    assert_eq!(config.session.command, 8);
}

#[test]
fn test_config_file_values_kept_without_cli_overrides() {
    let json = r#"{"session": {"timeout_ms": 75}}"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        timeout_ms: None,
        ..Args::default()
    };
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_args(&args);

    assert_eq!(config.timeout(), Timeout::from_millis(75));
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let mut original = Config::default();
    original.session.service = Some(TeeUuid::NIL);
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.session.service, loaded.session.service);
    assert_eq!(original.session.timeout_ms, loaded.session.timeout_ms);
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"session": {"command": 5}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.session.command, 5);
    assert_eq!(config.timeout(), Timeout::INFINITE);
    assert!(config.session.service.is_none());
    assert_eq!(config.logging.level, "info");
}

// ============================================================================
// Binary Tests
// ============================================================================

fn run_binary(args: &[&str]) -> serde_json::Value {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_ree-session"))
        .args(args)
        .env_remove("REE_SESSION_SERVICE")
        .env_remove("REE_SESSION_TIMEOUT_MS")
        .env_remove("REE_SESSION_LOG_LEVEL")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_binary_default_command() {
    let summary = run_binary(&["-s", SERVICE]);

    assert_eq!(summary["service"], SERVICE);
    assert_eq!(summary["command"], 0);
    assert_eq!(summary["sent"], 0);
    assert_eq!(summary["echoed"], 0);
    assert!(summary["handle"].as_str().unwrap().starts_with("ree-"));
}

#[test]
fn test_binary_explicit_command() {
    let summary = run_binary(&["-s", SERVICE, "-C", "7", "-a", "999"]);

    assert_eq!(summary["command"], 7);
    assert_eq!(summary["sent"], 999);
    assert_eq!(summary["echoed"], 999);
}

#[test]
fn test_binary_requires_service() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_ree-session"))
        .env_remove("REE_SESSION_SERVICE")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
