//! # Identity Forging
//!
//! Everything the relay needs to impersonate both ends of the login:
//! compact ES384 tokens, P-384 key pairs, certificate chain validation,
//! token forging and the cached online account.
//!
//! ## Components
//! - **jwt**: compact token encode/decode/verify
//! - **keys**: identity key pairs and SubjectPublicKeyInfo helpers
//! - **chain**: client certificate chain validation
//! - **forge**: self-signed, chained online and appearance tokens, key agreement
//! - **account**: persisted online account and its provider

pub mod account;
pub mod chain;
pub mod forge;
pub mod jwt;
pub mod keys;

use thiserror::Error;

pub use account::{configured_account, fetch_account, Account, AccountProvider};
pub use chain::{validate_chain, verify_client_data, ValidatedChain};
pub use forge::{
    derive_session_key, forge_appearance, forge_chained_online, forge_self_signed,
    online_appearance_overrides, trusted_authority_key, verify, SessionKey, MOJANG_PUBLIC_KEY,
};
pub use keys::IdentityKeyPair;

/// Failures while reading, verifying or signing identity tokens.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid token JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    Key(String),

    #[error("Token signature does not verify")]
    SignatureInvalid,

    #[error("Certificate chain broken at entry {0}")]
    ChainBroken(usize),

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("{0}")]
    MissingClaim(&'static str),

    #[error("Certificate is not signed by the trusted authority")]
    Untrusted,
}
