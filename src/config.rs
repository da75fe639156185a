//! # Configuration Management
//!
//! Centralized configuration for the relay.
//!
//! This module provides structured configuration for the client-facing
//! listener, the upstream server, session behavior, resource pack extraction,
//! the online account cache and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default UDP port of the game protocol.
pub const DEFAULT_PORT: u16 = 19132;

/// Default file holding the cached online account.
pub const DEFAULT_ACCOUNT_CACHE: &str = "bedrockSession.json";

/// Default directory receiving extracted resource packs.
pub const DEFAULT_PACKS_DIR: &str = "packs";

/// Main relay configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Client-facing listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream game server
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Session behavior
    #[serde(default)]
    pub session: SessionConfig,

    /// Resource pack extraction
    #[serde(default)]
    pub packs: PacksConfig,

    /// Online account
    #[serde(default)]
    pub account: AccountConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RelayError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RelayError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RelayError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RELAY_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(host) = std::env::var("RELAY_REMOTE_HOST") {
            config.remote.host = host;
        }

        if let Ok(port) = std::env::var("RELAY_REMOTE_PORT") {
            config.remote.port = port.parse::<u16>().map_err(|e| {
                RelayError::ConfigError(format!("Invalid RELAY_REMOTE_PORT '{port}': {e}"))
            })?;
        }

        if let Ok(dir) = std::env::var("RELAY_PACKS_DIR") {
            config.packs.directory = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            if let Ok(parsed) = level.parse::<Level>() {
                config.logging.log_level = parsed;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RelayError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| RelayError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.remote.validate());
        errors.extend(self.packs.validate());
        errors.extend(self.account.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RelayError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client-facing listener and discovery advertisement
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:19132")
    pub address: String,

    /// Host clients are told to reconnect to on transfers.
    /// Falls back to the listen IP, or loopback when listening on all interfaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,

    /// Primary discovery line
    pub motd: String,

    /// Secondary discovery line
    pub sub_motd: String,

    /// Advertised game mode
    pub game_type: String,

    /// Advertised player limit
    pub max_players: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            public_host: None,
            motd: String::from("Bedrock Relay"),
            sub_motd: String::from("Intercepting relay"),
            game_type: String::from("Survival"),
            max_players: 20,
        }
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.address.parse::<SocketAddr>().map_err(|e| {
            RelayError::ConfigError(format!("Invalid server address '{}': {e}", self.address))
        })
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:19132')",
                self.address
            ));
        }

        if self.motd.contains(';') || self.sub_motd.contains(';') {
            errors.push("MOTD lines cannot contain ';'".to_string());
        }

        if self.max_players == 0 {
            errors.push("Max players must be greater than 0".to_string());
        }

        if matches!(&self.public_host, Some(host) if host.trim().is_empty()) {
            errors.push("Public host cannot be blank when set".to_string());
        }

        errors
    }
}

/// Upstream game server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_PORT,
        }
    }
}

impl RemoteConfig {
    /// Validate remote configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Remote host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Remote port must be greater than 0".to_string());
        }

        errors
    }
}

/// Session behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pick the codec matching the client's protocol version
    pub auto_codec: bool,

    /// Reuse older inventory serializers on newer protocols
    pub patch_codec: bool,

    /// Switch to per-direction workers once the game has started
    pub concurrent_after_start_game: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_codec: true,
            patch_codec: true,
            concurrent_after_start_game: false,
        }
    }
}

/// Resource pack extraction
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PacksConfig {
    /// Whether packs are captured at all
    pub enabled: bool,

    /// Directory receiving `<pack-uuid>.zip`
    pub directory: PathBuf,

    /// Worker count; 0 picks half the available cores (at least two)
    pub workers: usize,

    /// Timeout for CDN downloads
    #[serde(with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for PacksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(DEFAULT_PACKS_DIR),
            workers: 0,
            download_timeout: Duration::from_secs(60),
        }
    }
}

impl PacksConfig {
    /// Validate pack configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.enabled && self.directory.as_os_str().is_empty() {
            errors.push("Packs directory cannot be empty".to_string());
        }

        if self.workers > 256 {
            errors.push(format!(
                "Pack worker count too high: {} (maximum: 256)",
                self.workers
            ));
        }

        if self.download_timeout.as_millis() < 100 {
            errors.push("Download timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Online account
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Log in upstream with the cached account instead of a forged offline identity
    pub online: bool,

    /// Path of the cached account session
    pub cache_file: PathBuf,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            online: false,
            cache_file: PathBuf::from(DEFAULT_ACCOUNT_CACHE),
        }
    }
}

impl AccountConfig {
    /// Validate account configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.online && self.cache_file.as_os_str().is_empty() {
            errors.push("Account cache file must be set in online mode".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("bedrock-relay"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
