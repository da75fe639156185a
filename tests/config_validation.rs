//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bedrock_relay::config::{
    LoggingConfig, PacksConfig, RelayConfig, RemoteConfig, ServerConfig, DEFAULT_PORT,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = RelayConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_invalid_server_address() {
    let mut config = RelayConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
    assert!(config.server.socket_addr().is_err());
}

#[test]
fn test_empty_server_address() {
    let mut config = RelayConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_motd_cannot_break_discovery_string() {
    let server = ServerConfig {
        motd: "a;b".into(),
        ..ServerConfig::default()
    };
    assert!(server.validate().iter().any(|e| e.contains("';'")));
}

#[test]
fn test_blank_public_host_rejected() {
    let server = ServerConfig {
        public_host: Some("  ".into()),
        ..ServerConfig::default()
    };
    assert_eq!(server.validate().len(), 1);
}

#[test]
fn test_remote_requires_host_and_port() {
    let remote = RemoteConfig {
        host: String::new(),
        port: 0,
    };
    let errors = remote.validate();
    assert_eq!(errors.len(), 2);
    assert_eq!(RemoteConfig::default().port, DEFAULT_PORT);
}

#[test]
fn test_pack_limits() {
    let packs = PacksConfig {
        workers: 1000,
        download_timeout: Duration::from_millis(10),
        ..PacksConfig::default()
    };
    let errors = packs.validate();
    assert!(errors.iter().any(|e| e.contains("worker count too high")));
    assert!(errors.iter().any(|e| e.contains("timeout too short")));

    let disabled = PacksConfig {
        enabled: false,
        directory: PathBuf::new(),
        ..PacksConfig::default()
    };
    assert!(disabled.validate().is_empty());
}

#[test]
fn test_online_mode_needs_cache_file() {
    let config = RelayConfig::default_with_overrides(|c| {
        c.account.online = true;
        c.account.cache_file = PathBuf::new();
    });
    assert!(config.validate_strict().is_err());
}

#[test]
fn test_logging_needs_an_output() {
    let logging = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));

    let file_without_path = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(!file_without_path.validate().is_empty());
}

#[test]
fn test_strict_validation_lists_every_error() {
    let config = RelayConfig::default_with_overrides(|c| {
        c.server.max_players = 0;
        c.remote.port = 0;
    });
    let err = config.validate_strict().unwrap_err().to_string();
    assert!(err.contains("Max players"));
    assert!(err.contains("Remote port"));
}

#[test]
fn test_toml_partial_sections_use_defaults() {
    let config = RelayConfig::from_toml(
        r#"
        [remote]
        host = "play.example.net"

        [session]
        concurrent_after_start_game = true

        [packs]
        download_timeout = 5000
        "#,
    )
    .unwrap();

    assert_eq!(config.remote.host, "play.example.net");
    assert_eq!(config.remote.port, DEFAULT_PORT);
    assert!(config.session.auto_codec);
    assert!(config.session.concurrent_after_start_game);
    assert_eq!(config.packs.download_timeout, Duration::from_secs(5));
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_bad_toml_is_a_config_error() {
    assert!(RelayConfig::from_toml("[remote]\nport = \"many\"").is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.toml");
    let config = RelayConfig::default_with_overrides(|c| {
        c.server.public_host = Some("relay.example.net".into());
        c.logging.log_level = Level::DEBUG;
    });
    config.save_to_file(&path).unwrap();

    let loaded = RelayConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.public_host.as_deref(), Some("relay.example.net"));
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(RelayConfig::example_config().contains("[remote]"));
}
