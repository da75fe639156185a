//! Client certificate chain validation.
//!
//! The first entry is self-signed and verified with its own `x5u`. Every
//! later entry must verify against the `identityPublicKey` claimed by the
//! entry before it. The last entry carries the player identity.

use crate::auth::forge::MOJANG_PUBLIC_KEY;
use crate::auth::jwt::{self, Claims};
use crate::auth::keys::parse_public_key;
use crate::auth::ForgeError;
use crate::error::constants;
use serde_json::Value;
use tracing::debug;

/// Clock slack allowed on chain entries.
pub const CHAIN_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct ValidatedChain {
    /// Whether any entry was signed by the authority key.
    pub trusted: bool,
    /// Key the client signs its own data with.
    pub identity_public_key: String,
    /// `extraData` of the last entry (display name, identity, XUID).
    pub extra_data: Claims,
    /// All claims of the last entry.
    pub identity_claims: Claims,
}

pub fn validate_chain(chain: &[String], now: i64) -> Result<ValidatedChain, ForgeError> {
    let first = chain
        .first()
        .ok_or(ForgeError::Malformed(constants::ERR_EMPTY_CHAIN))?;

    let mut signer = jwt::decode_unverified(first)?
        .x5u()
        .ok_or(ForgeError::MissingClaim("x5u"))?
        .to_string();
    let mut trusted = false;
    let mut last_claims = Claims::new();

    for (index, entry) in chain.iter().enumerate() {
        let token = jwt::decode_unverified(entry)?;
        let key = parse_public_key(&signer)?;
        if !token.verify(&key) {
            return Err(ForgeError::ChainBroken(index));
        }
        token.check_validity(now, CHAIN_CLOCK_SKEW_SECS)?;
        if signer == MOJANG_PUBLIC_KEY {
            trusted = true;
        }

        // The last entry's key signs the client data, not another entry.
        if let Some(next) = token.claim_str("identityPublicKey") {
            signer = next.to_string();
        }
        last_claims = token.claims;
    }

    let extra_data = match last_claims.get("extraData") {
        Some(Value::Object(extra)) => extra.clone(),
        _ => return Err(ForgeError::MissingClaim(constants::ERR_AUTH_DATA_NOT_FOUND)),
    };
    let identity_public_key = match last_claims.get("identityPublicKey") {
        Some(Value::String(key)) => key.clone(),
        _ => {
            return Err(ForgeError::MissingClaim(
                constants::ERR_IDENTITY_KEY_NOT_FOUND,
            ))
        }
    };

    debug!(entries = chain.len(), trusted, "Certificate chain validated");
    Ok(ValidatedChain {
        trusted,
        identity_public_key,
        extra_data,
        identity_claims: last_claims,
    })
}

/// Verifies the client data token against the chain's identity key and
/// returns its claims.
pub fn verify_client_data(client_jwt: &str, identity_public_key: &str) -> Result<Claims, ForgeError> {
    let token = jwt::decode_unverified(client_jwt)?;
    let key = parse_public_key(identity_public_key)?;
    if !token.verify(&key) {
        return Err(ForgeError::SignatureInvalid);
    }
    Ok(token.claims)
}
