//! Error types for strand-mtproto.

use std::{fmt, io};

use strand_crypto::{CryptoError, DecryptError};

// ─── DecodeError ──────────────────────────────────────────────────────────────

/// Failures of the binary helpers in [`crate::binary`].
#[derive(Debug)]
pub enum DecodeError {
    /// Neither gzip nor zlib framing could be inflated.
    Decompress(io::Error),
    /// Inflated bytes are not valid UTF-8.
    Utf8(std::string::FromUtf8Error),
    /// A decimal long could not be parsed or does not fit in 64 bits.
    InvalidLong(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decompress(e) => write!(f, "decompression failed: {e}"),
            Self::Utf8(e) => write!(f, "decompressed data is not UTF-8: {e}"),
            Self::InvalidLong(s) => write!(f, "invalid long: {s:?}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self { Self::Decompress(e) }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(e: std::string::FromUtf8Error) -> Self { Self::Utf8(e) }
}

// ─── PushError ────────────────────────────────────────────────────────────────

/// Why a push payload could not be turned into a notification.
///
/// Every variant is final for the payload in question: retrying with the
/// same input cannot succeed.
#[derive(Debug)]
pub enum PushError {
    /// No cached push key has the requested id.
    NoMatchingKey,
    /// The matching key is the "do not encrypt" sentinel or has the wrong size.
    KeyUnavailable,
    /// The payload is not valid base64.
    Base64(base64::DecodeError),
    /// The payload is shorter than `key_id || msg_key` or not block-aligned.
    PayloadTooShort(usize),
    /// The leading 8 bytes do not match the key id.
    KeyIdMismatch,
    /// The recomputed message key differs from the one carried in the payload.
    MessageKeyMismatch,
    /// The crypto provider rejected an operation.
    Crypto(CryptoError),
    /// The decrypted length-prefixed field is malformed.
    Payload(String),
    /// The decrypted field is not the expected JSON.
    Json(serde_json::Error),
    /// The push backend refused the new key set.
    Registration(String),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingKey        => write!(f, "no push key found"),
            Self::KeyUnavailable       => write!(f, "push key is not usable for decryption"),
            Self::Base64(e)            => write!(f, "invalid base64: {e}"),
            Self::PayloadTooShort(n)   => write!(f, "payload of {n} bytes is too short or unaligned"),
            Self::KeyIdMismatch        => write!(f, "invalid auth key id"),
            Self::MessageKeyMismatch   => write!(f, "server messageKey mismatch"),
            Self::Crypto(e)            => write!(f, "crypto: {e}"),
            Self::Payload(s)           => write!(f, "malformed payload: {s}"),
            Self::Json(e)              => write!(f, "invalid notification JSON: {e}"),
            Self::Registration(s)      => write!(f, "device registration failed: {s}"),
        }
    }
}

impl std::error::Error for PushError {}

impl From<CryptoError> for PushError {
    fn from(e: CryptoError) -> Self { Self::Crypto(e) }
}

impl From<base64::DecodeError> for PushError {
    fn from(e: base64::DecodeError) -> Self { Self::Base64(e) }
}

impl From<serde_json::Error> for PushError {
    fn from(e: serde_json::Error) -> Self { Self::Json(e) }
}

impl PushError {
    /// `true` for tampering or wrong-key failures, as opposed to lookup or format problems.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::KeyIdMismatch | Self::MessageKeyMismatch)
    }
}

// ─── SessionError ─────────────────────────────────────────────────────────────

/// Errors that can occur when packing or unpacking an encrypted frame.
#[derive(Debug)]
pub enum SessionError {
    /// The underlying crypto layer rejected the message.
    Decrypt(DecryptError),
    /// Encryption could not run.
    Crypto(CryptoError),
    /// The decrypted inner message was too short to contain a valid header.
    FrameTooShort,
    /// Session-ID mismatch (possible replay or wrong connection).
    SessionMismatch,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypt(e) => write!(f, "decrypt: {e}"),
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::FrameTooShort => write!(f, "inner plaintext too short"),
            Self::SessionMismatch => write!(f, "session_id mismatch"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DecryptError> for SessionError {
    fn from(e: DecryptError) -> Self { Self::Decrypt(e) }
}

impl From<CryptoError> for SessionError {
    fn from(e: CryptoError) -> Self { Self::Crypto(e) }
}
