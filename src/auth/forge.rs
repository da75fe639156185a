//! Token forging and handshake key agreement.
//!
//! Offline logins get a fresh self-signed identity. Online logins re-sign a
//! short assertion in front of the account's authority-issued chain so the
//! server sees a chain rooted in the trusted authority key.

use crate::auth::jwt::{self, Claims};
use crate::auth::keys::{parse_public_key, IdentityKeyPair};
use crate::auth::{Account, ForgeError};
use p384::PublicKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// SubjectPublicKeyInfo of the authority that signs online identities.
pub const MOJANG_PUBLIC_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

const SELF_SIGNED_LIFETIME_SECS: i64 = 24 * 60 * 60;
const SELF_SIGNED_BACKDATE_SECS: i64 = 1;
const CHAINED_LIFETIME_SECS: i64 = 2 * 24 * 60 * 60;
const CHAINED_BACKDATE_SECS: i64 = 60;
const AUTHORITY_CLOCK_SKEW_SECS: i64 = 60;

/// Self-signed identity assertion carrying `extra_data`.
pub fn forge_self_signed(key: &IdentityKeyPair, extra_data: &Claims) -> Result<String, ForgeError> {
    forge_self_signed_at(key, extra_data, crate::utils::time::unix_seconds())
}

pub(crate) fn forge_self_signed_at(
    key: &IdentityKeyPair,
    extra_data: &Claims,
    now: i64,
) -> Result<String, ForgeError> {
    let exp = now + SELF_SIGNED_LIFETIME_SECS;
    let mut claims = Claims::new();
    claims.insert("nbf".into(), json!(now - SELF_SIGNED_BACKDATE_SECS));
    claims.insert("exp".into(), json!(exp));
    claims.insert("iat".into(), json!(exp));
    claims.insert("iss".into(), json!("self"));
    claims.insert("certificateAuthority".into(), json!(true));
    claims.insert("extraData".into(), Value::Object(extra_data.clone()));
    claims.insert("identityPublicKey".into(), json!(key.public_key_base64()?));
    jwt::encode(key, &claims)
}

/// Verifies the account's authority-signed certificate and puts a fresh
/// self-signed link in front of it.
///
/// Returns `[self_signed, authority_jwt, identity_jwt]`, the order the login
/// message carries them in.
#[instrument(skip_all)]
pub fn forge_chained_online(
    key: &IdentityKeyPair,
    authority_jwt: &str,
    identity_jwt: &str,
    trusted_authority: &PublicKey,
) -> Result<Vec<String>, ForgeError> {
    let now = crate::utils::time::unix_seconds();
    let authority = jwt::decode_unverified(authority_jwt)?;
    if !authority.verify(trusted_authority) {
        return Err(ForgeError::Untrusted);
    }
    authority.check_validity(now, AUTHORITY_CLOCK_SKEW_SECS)?;
    let authority_key = authority
        .x5u()
        .ok_or(ForgeError::MissingClaim("x5u"))?
        .to_string();

    let mut claims = Claims::new();
    claims.insert("certificateAuthority".into(), json!(true));
    claims.insert("identityPublicKey".into(), json!(authority_key));
    claims.insert("exp".into(), json!(now + CHAINED_LIFETIME_SECS));
    claims.insert("nbf".into(), json!(now - CHAINED_BACKDATE_SECS));
    let self_signed = jwt::encode(key, &claims)?;

    debug!("Online chain forged");
    Ok(vec![
        self_signed,
        authority_jwt.to_string(),
        identity_jwt.to_string(),
    ])
}

/// Signs the client's appearance data with `overrides` applied on top.
pub fn forge_appearance(
    key: &IdentityKeyPair,
    base_claims: &Claims,
    overrides: &Claims,
) -> Result<String, ForgeError> {
    let mut claims = base_claims.clone();
    for (name, value) in overrides {
        claims.insert(name.clone(), value.clone());
    }
    jwt::encode(key, &claims)
}

/// Account fields that replace the client's own in online appearance data.
pub fn online_appearance_overrides(account: &Account, server_address: &str) -> Claims {
    let mut overrides = Claims::new();
    overrides.insert("PlayFabId".into(), json!(account.play_fab_id.to_lowercase()));
    overrides.insert("DeviceId".into(), json!(account.device_id));
    overrides.insert("DeviceOS".into(), json!(1));
    overrides.insert("ThirdPartyName".into(), json!(account.display_name));
    overrides.insert("ServerAddress".into(), json!(server_address));
    overrides
}

pub fn verify(token: &str, key: &PublicKey) -> bool {
    jwt::verify(token, key)
}

pub fn trusted_authority_key() -> Result<PublicKey, ForgeError> {
    parse_public_key(MOJANG_PUBLIC_KEY)
}

/// Symmetric key for the outbound half-session.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// SHA-256 over the salt followed by the ECDH shared secret.
pub fn derive_session_key(key: &IdentityKeyPair, server_key: &PublicKey, salt: &[u8]) -> SessionKey {
    let shared = p384::ecdh::diffie_hellman(key.secret().to_nonzero_scalar(), server_key.as_affine());
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(shared.raw_secret_bytes());
    SessionKey(hasher.finalize().into())
}
