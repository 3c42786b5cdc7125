//! The long-lived shared secret ("auth key") every derivation starts from.

use crate::{CryptoError, sha1};

/// Length of an MTProto authorization key in bytes.
pub const AUTH_KEY_LEN: usize = 256;

/// A 2048-bit authorization key plus its pre-computed identifier.
///
/// The key is read-only once constructed. `Debug` never prints key bytes.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; AUTH_KEY_LEN],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Construct from raw 256-byte key material.
    pub fn from_bytes(data: [u8; AUTH_KEY_LEN]) -> Self {
        let key_id = key_id_of(&data);
        Self { data, key_id }
    }

    /// Construct from a slice, failing unless it is exactly 256 bytes long.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let data: [u8; AUTH_KEY_LEN] = data
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(data.len()))?;
        Ok(Self::from_bytes(data))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_LEN] { &self.data }

    /// The 8-byte key identifier (SHA-1(key)[12..20]).
    pub fn key_id(&self) -> [u8; 8] { self.key_id }
}

/// The identifier MTProto assigns to arbitrary key material: the low 8 bytes
/// of its SHA-1 digest. Defined for any length, including the empty key.
pub fn key_id_of(data: &[u8]) -> [u8; 8] {
    let sha = sha1!(data);
    let mut key_id = [0u8; 8];
    key_id.copy_from_slice(&sha[12..20]);
    key_id
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={})", u64::from_le_bytes(self.key_id))
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool { self.key_id == other.key_id }
}

impl Eq for AuthKey {}
