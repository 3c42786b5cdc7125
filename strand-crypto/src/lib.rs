//! Cryptographic primitives for the MTProto session core.
//!
//! Provides:
//! - AES-256-IGE encryption/decryption
//! - SHA-1 / SHA-256 hash macros
//! - `AuthKey`, the 256-byte shared secret
//! - message key and key/IV derivation for MTProto 1.0 and 2.0
//! - whole-message encrypt / decrypt for both schemes
//! - [`CryptoProvider`], the async seam callers inject hashing and AES through

#![deny(unsafe_code)]

pub mod aes;
mod auth_key;
pub mod derive;
mod error;
pub mod hash;
mod provider;

pub use auth_key::{AUTH_KEY_LEN, AuthKey, key_id_of};
pub use derive::{Direction, KeyIv, MSG_KEY_LEN, Scheme, Side, derive_key_iv, derive_msg_key};
pub use error::{CryptoError, DecryptError};
pub use provider::{CryptoProvider, NativeCrypto, derive_key_iv_with, derive_msg_key_with};

// ─── Message encrypt / decrypt ───────────────────────────────────────────────

/// `auth_key_id || msg_key` header length.
pub const HEADER_LEN: usize = 8 + MSG_KEY_LEN;

/// Random padding appended before encryption.
///
/// 2.0 requires at least 12 bytes and block alignment; 1.0 only aligns.
pub fn padding_len(len: usize, scheme: Scheme) -> usize {
    match scheme {
        Scheme::V2 => 16 + (16 - (len % 16)),
        Scheme::V1 => (16 - (len % 16)) % 16,
    }
}

/// Encrypt `plaintext` sent in direction `dir`.
///
/// Returns `key_id || msg_key || ciphertext`.
pub fn encrypt_message(plaintext: &[u8], auth_key: &AuthKey, dir: Direction, scheme: Scheme) -> Result<Vec<u8>, CryptoError> {
    let mut rnd = [0u8; 32];
    getrandom::getrandom(&mut rnd).map_err(|e| CryptoError::Provider(e.to_string()))?;
    do_encrypt_message(plaintext, auth_key, dir, scheme, &rnd)
}

pub(crate) fn do_encrypt_message(
    plaintext: &[u8],
    auth_key: &AuthKey,
    dir: Direction,
    scheme: Scheme,
    rnd: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    let pad = padding_len(plaintext.len(), scheme);
    let mut buffer = Vec::with_capacity(HEADER_LEN + plaintext.len() + pad);
    buffer.extend_from_slice(&auth_key.key_id);
    buffer.extend_from_slice(&[0u8; MSG_KEY_LEN]);
    buffer.extend_from_slice(plaintext);
    buffer.extend(rnd.iter().take(pad).copied());

    let msg_key = derive_msg_key(auth_key, &buffer[HEADER_LEN..], dir, scheme);
    let KeyIv { key, iv } = derive_key_iv(auth_key, &msg_key, dir, scheme);
    aes::ige_encrypt(&mut buffer[HEADER_LEN..], &key, &iv)?;

    buffer[8..HEADER_LEN].copy_from_slice(&msg_key);
    Ok(buffer)
}

/// Decrypt a `key_id || msg_key || ciphertext` buffer sent in direction `dir`.
///
/// On success returns a slice of `buffer` holding the plaintext with its padding.
pub fn decrypt_message<'a>(
    buffer: &'a mut [u8],
    auth_key: &AuthKey,
    dir: Direction,
    scheme: Scheme,
) -> Result<&'a mut [u8], DecryptError> {
    if buffer.len() < HEADER_LEN || (buffer.len() - HEADER_LEN) % 16 != 0 {
        return Err(DecryptError::InvalidBuffer);
    }
    if auth_key.key_id != buffer[..8] {
        return Err(DecryptError::AuthKeyMismatch);
    }
    let mut msg_key = [0u8; MSG_KEY_LEN];
    msg_key.copy_from_slice(&buffer[8..HEADER_LEN]);

    let KeyIv { key, iv } = derive_key_iv(auth_key, &msg_key, dir, scheme);
    aes::ige_decrypt(&mut buffer[HEADER_LEN..], &key, &iv).map_err(|_| DecryptError::InvalidBuffer)?;

    let ours = derive_msg_key(auth_key, &buffer[HEADER_LEN..], dir, scheme);
    if msg_key != ours {
        return Err(DecryptError::MessageKeyMismatch);
    }
    Ok(&mut buffer[HEADER_LEN..])
}
