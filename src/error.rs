//! # Error Types
//!
//! Error handling for the relay core.
//!
//! This module defines the error variants that can surface while relaying a
//! session, from low-level I/O failures to login forging and resource pack
//! extraction problems.
//!
//! ## Error Categories
//! - **I/O Errors**: file system and download failures
//! - **Forge Errors**: certificate chain validation and token signing failures
//! - **Archive Errors**: malformed resource pack archives
//! - **Session Errors**: half-session installation and handshake ordering
//!
//! Nothing in here is allowed to take the process down. Handshake errors end
//! the one session with a disconnect message, pack errors end the one job.
//!
//! ## Example Usage
//! ```rust
//! use bedrock_relay::error::{RelayError, Result};
//! use std::fs;
//! use tracing::{error, info};
//!
//! fn read_cache(path: &str) -> Result<String> {
//!     fs::read_to_string(path).map_err(RelayError::Io)
//! }
//!
//! match read_cache("bedrockSession.json") {
//!     Ok(contents) => info!(len = contents.len(), "Loaded account cache"),
//!     Err(e) => error!(error = %e, "No account cache"),
//! }
//! ```

use crate::auth::ForgeError;
use crate::protocol::packet::Direction;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Login payload errors
    pub const ERR_AUTH_DATA_NOT_FOUND: &str = "AuthData was not found!";
    pub const ERR_IDENTITY_KEY_NOT_FOUND: &str = "Identity Public Key was not found!";
    pub const ERR_CLIENT_DATA_UNVERIFIED: &str = "Client data signature does not match identity key";
    pub const ERR_EMPTY_CHAIN: &str = "Certificate chain is empty";

    /// Handshake errors
    pub const ERR_NO_KEY_PAIR: &str = "No key pair for the outbound handshake";
    pub const ERR_SALT_NOT_FOUND: &str = "Handshake salt was not found";

    /// Command errors
    pub const ERR_MISMATCHED_ARGUMENTS: &str = "Mismatched argument(s)";

    /// Runtime errors
    pub const ERR_NO_RUNTIME: &str = "No tokio runtime available";
}

// RelayError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Cipher error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("{0:?} half-session is already installed")]
    AlreadyInstalled(Direction),

    #[error("No codec registered for protocol version {0}")]
    UnknownCodec(i32),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Maps a poisoned lock into a [`RelayError`].
pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> RelayError {
    RelayError::Custom(constants::ERR_LOCK_POISONED.to_string())
}
