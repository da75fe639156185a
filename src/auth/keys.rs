//! P-384 identity key pairs.
//!
//! Public keys travel as standard base64 of their SubjectPublicKeyInfo DER,
//! private keys are cached as standard base64 PKCS#8 DER.

use crate::auth::ForgeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use p384::ecdsa::SigningKey;
use p384::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use p384::{PublicKey, SecretKey};
use rand_core::OsRng;
use std::fmt;

pub struct IdentityKeyPair {
    secret: SecretKey,
}

impl IdentityKeyPair {
    /// Fresh ephemeral key pair.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        Self { secret }
    }

    pub fn from_pkcs8_base64(encoded: &str) -> Result<Self, ForgeError> {
        let der = STANDARD.decode(encoded.trim())?;
        let secret =
            SecretKey::from_pkcs8_der(&der).map_err(|e| ForgeError::Key(e.to_string()))?;
        Ok(Self { secret })
    }

    pub fn to_pkcs8_base64(&self) -> Result<String, ForgeError> {
        let der = self
            .secret
            .to_pkcs8_der()
            .map_err(|e| ForgeError::Key(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn public_key_base64(&self) -> Result<String, ForgeError> {
        encode_public_key(&self.public_key())
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public_key_base64().unwrap_or_default())
            .finish_non_exhaustive()
    }
}

/// Parses a base64 SubjectPublicKeyInfo as found in `x5u` and `identityPublicKey`.
pub fn parse_public_key(encoded: &str) -> Result<PublicKey, ForgeError> {
    let der = STANDARD.decode(encoded.trim())?;
    PublicKey::from_public_key_der(&der).map_err(|e| ForgeError::Key(e.to_string()))
}

pub fn encode_public_key(key: &PublicKey) -> Result<String, ForgeError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| ForgeError::Key(e.to_string()))?;
    Ok(STANDARD.encode(der.as_bytes()))
}
