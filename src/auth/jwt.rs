//! Compact ES384 tokens.
//!
//! `base64url(header).base64url(claims).base64url(r || s)` where the header
//! names the signing key in `x5u`. Signatures are the raw 96-byte `r || s`
//! form, not DER.

use crate::auth::keys::IdentityKeyPair;
use crate::auth::ForgeError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use p384::ecdsa::signature::{Signer, Verifier};
use p384::ecdsa::{Signature, VerifyingKey};
use p384::PublicKey;
use serde_json::{json, Map, Value};

pub const ALGORITHM: &str = "ES384";

/// URL-safe alphabet, never padded on output, padding tolerated on input.
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub type Claims = Map<String, Value>;

/// A token split into its parts. Nothing about it has been verified yet.
#[derive(Debug, Clone)]
pub struct Token {
    pub header: Claims,
    pub claims: Claims,
    signing_input: String,
    signature: Vec<u8>,
}

impl Token {
    /// The signer's public key as announced in the header.
    pub fn x5u(&self) -> Option<&str> {
        self.header.get("x5u").and_then(Value::as_str)
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    pub fn verify(&self, key: &PublicKey) -> bool {
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        VerifyingKey::from(key)
            .verify(self.signing_input.as_bytes(), &signature)
            .is_ok()
    }

    /// Checks `nbf`/`exp` against `now` (unix seconds) with `skew` seconds of slack.
    pub fn check_validity(&self, now: i64, skew: i64) -> Result<(), ForgeError> {
        if let Some(exp) = self.claims.get("exp").and_then(Value::as_i64) {
            if now > exp + skew {
                return Err(ForgeError::Expired);
            }
        }
        if let Some(nbf) = self.claims.get("nbf").and_then(Value::as_i64) {
            if now + skew < nbf {
                return Err(ForgeError::NotYetValid);
            }
        }
        Ok(())
    }
}

/// Signs `claims` with `key`, announcing its public key in `x5u`.
pub fn encode(key: &IdentityKeyPair, claims: &Claims) -> Result<String, ForgeError> {
    let header = json!({ "alg": ALGORITHM, "x5u": key.public_key_base64()? });
    let header = URL_SAFE.encode(serde_json::to_vec(&header)?);
    let payload = URL_SAFE.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");

    let signature: Signature = key.signing_key().sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE.encode(signature.to_bytes())
    ))
}

pub fn decode_unverified(token: &str) -> Result<Token, ForgeError> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ForgeError::Malformed("expected three dot-separated parts"));
    };

    let header_json: Value = serde_json::from_slice(&URL_SAFE.decode(header)?)?;
    let claims_json: Value = serde_json::from_slice(&URL_SAFE.decode(payload)?)?;
    let (Value::Object(header_map), Value::Object(claims)) = (header_json, claims_json) else {
        return Err(ForgeError::Malformed("header and claims must be JSON objects"));
    };

    Ok(Token {
        header: header_map,
        claims,
        signing_input: format!("{header}.{payload}"),
        signature: URL_SAFE.decode(signature)?,
    })
}

/// Decodes and verifies in one step; any decoding failure counts as unverified.
pub fn verify(token: &str, key: &PublicKey) -> bool {
    decode_unverified(token).is_ok_and(|decoded| decoded.verify(key))
}
