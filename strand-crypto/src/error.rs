//! Error types for strand-crypto.

use std::fmt;

/// Errors from [`crate::decrypt_message`].
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// Ciphertext too short or not block-aligned.
    InvalidBuffer,
    /// The `auth_key_id` in the ciphertext does not match our key.
    AuthKeyMismatch,
    /// The `msg_key` in the ciphertext does not match our computed value.
    MessageKeyMismatch,
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBuffer => write!(f, "invalid ciphertext buffer length"),
            Self::AuthKeyMismatch => write!(f, "auth_key_id mismatch"),
            Self::MessageKeyMismatch => write!(f, "msg_key mismatch"),
        }
    }
}

impl std::error::Error for DecryptError {}

/// Failures of the primitives themselves or of an injected [`crate::CryptoProvider`].
#[derive(Clone, Debug, PartialEq)]
pub enum CryptoError {
    /// Key material was not 256 bytes long.
    InvalidKeyLength(usize),
    /// AES-IGE input length is not a multiple of the block size.
    UnalignedInput(usize),
    /// A provider returned a digest of the wrong size.
    DigestLength { expected: usize, got: usize },
    /// The provider rejected the operation.
    Provider(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength(n) => write!(f, "auth key must be 256 bytes, got {n}"),
            Self::UnalignedInput(n) => write!(f, "AES-IGE input of {n} bytes is not 16-byte aligned"),
            Self::DigestLength { expected, got } => {
                write!(f, "digest length {got}, expected {expected}")
            }
            Self::Provider(s) => write!(f, "crypto provider: {s}"),
        }
    }
}

impl std::error::Error for CryptoError {}
