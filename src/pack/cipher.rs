//! AES/CFB8 as used by encrypted resource packs.
//!
//! The key length picks AES-128, AES-192 or AES-256. The IV is always the
//! first 16 bytes of the key.

use crate::error::{RelayError, Result};
use aes::{Aes128, Aes192, Aes256};
use cfb8::cipher::{AsyncStreamCipher, KeyIvInit};

const IV_LEN: usize = 16;

fn invalid_key(len: usize) -> RelayError {
    RelayError::Crypto(format!("Unsupported pack key length: {len} bytes"))
}

/// Decrypts `data` in place with `key`.
pub fn decrypt_in_place(key: &[u8], data: &mut [u8]) -> Result<()> {
    let iv = key.get(..IV_LEN).ok_or_else(|| invalid_key(key.len()))?;
    let bad = |_| invalid_key(key.len());
    match key.len() {
        16 => cfb8::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad)?
            .decrypt(data),
        24 => cfb8::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad)?
            .decrypt(data),
        32 => cfb8::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad)?
            .decrypt(data),
        other => return Err(invalid_key(other)),
    }
    Ok(())
}

/// Encrypts `data` in place with `key`. The relay only decrypts; this exists
/// so packs can be built for tests and tools.
pub fn encrypt_in_place(key: &[u8], data: &mut [u8]) -> Result<()> {
    let iv = key.get(..IV_LEN).ok_or_else(|| invalid_key(key.len()))?;
    let bad = |_| invalid_key(key.len());
    match key.len() {
        16 => cfb8::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad)?
            .encrypt(data),
        24 => cfb8::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad)?
            .encrypt(data),
        32 => cfb8::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad)?
            .encrypt(data),
        other => return Err(invalid_key(other)),
    }
    Ok(())
}

/// Pack keys travel as strings whose chars are the key bytes (ISO-8859-1).
pub fn key_bytes(key: &str) -> Vec<u8> {
    key.chars().map(|c| c as u32 as u8).collect()
}
