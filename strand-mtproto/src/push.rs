//! Decryption of push-delivered payloads.
//!
//! Each signed-in account has a push key. When local passcode encryption is
//! off every account uses the empty key, which tells the server not to
//! encrypt that account's pushes. Keys are cached until credentials change.
//!
//! Envelope: `base64(key_id[8] || msg_key[16] || aes_ige(len:i32 || json || padding))`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strand_crypto::{
    AuthKey, CryptoProvider, Direction, HEADER_LEN, KeyIv, MSG_KEY_LEN, Scheme, derive_key_iv_with,
    derive_msg_key_with, key_id_of,
};

use crate::errors::PushError;

/// Accepts padded and unpadded input.
const LENIENT_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ─── Keys ─────────────────────────────────────────────────────────────────────

/// Local account slot (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub u32);

/// Push key material for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct PushKey {
    /// Raw key; empty means "this account does not encrypt pushes".
    pub key:       Vec<u8>,
    /// Low 8 bytes of SHA-1(key).
    pub id:        [u8; 8],
    /// `id` in base64 without padding and without its last character, so a
    /// raw payload string can be matched by prefix.
    pub id_base64: String,
}

impl PushKey {
    /// Wrap raw key bytes and compute their id.
    pub fn from_key(key: Vec<u8>) -> Self {
        let id = key_id_of(&key);
        let id_base64 = key_id_base64(&id);
        Self { key, id, id_base64 }
    }

    /// The empty-key sentinel.
    pub fn sentinel() -> Self { Self::from_key(Vec::new()) }

    /// `false` for the sentinel.
    pub fn encrypts(&self) -> bool { !self.key.is_empty() }
}

impl fmt::Debug for PushKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushKey")
            .field("id_base64", &self.id_base64)
            .field("encrypts", &self.encrypts())
            .finish()
    }
}

/// Base64 form of a key id as used for prefix matching.
pub fn key_id_base64(id: &[u8; 8]) -> String {
    let mut s = STANDARD.encode(id);
    s.truncate(s.trim_end_matches('=').len());
    // 8 bytes do not fill the last base64 digit
    s.pop();
    s
}

/// Where per-account push key material comes from. Never touches the network.
pub trait AccountKeySource: Send + Sync {
    /// Accounts currently signed in.
    fn accounts(&self) -> Vec<AccountId>;

    /// Stored push key bytes for `account`.
    fn push_key(&self, account: AccountId) -> Option<Vec<u8>>;
}

/// Fixed account table, mainly for tests and single-process embedding.
#[derive(Clone, Debug, Default)]
pub struct StaticAccounts {
    keys: BTreeMap<AccountId, Vec<u8>>,
}

impl StaticAccounts {
    /// Table from `(account, key bytes)` pairs.
    pub fn new(keys: impl IntoIterator<Item = (AccountId, Vec<u8>)>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }
}

impl AccountKeySource for StaticAccounts {
    fn accounts(&self) -> Vec<AccountId> { self.keys.keys().copied().collect() }

    fn push_key(&self, account: AccountId) -> Option<Vec<u8>> { self.keys.get(&account).cloned() }
}

/// Registers this device with the push backend.
#[async_trait]
pub trait DeviceRegistrar: Send + Sync {
    /// Upload the current key set for every account.
    async fn register_device(&self, keys: &[(AccountId, PushKey)]) -> Result<(), PushError>;
}

// ─── Notification ─────────────────────────────────────────────────────────────

/// Routing data attached to a notification. Ids arrive as strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PushCustom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Channel the message was posted in.
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Basic group the message was posted in.
    pub chat_id:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Sending user.
    pub from_id:    Option<String>,
    #[serde(default)]
    /// Server message id.
    pub msg_id:     String,
    #[serde(default, rename = "peerId", skip_serializing_if = "Option::is_none")]
    /// Peer for direct messages.
    pub peer_id:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// `"1"` when the notification must not make a sound.
    pub silent:     Option<String>,
    #[serde(flatten)]
    /// Fields not modelled above.
    pub extra:      serde_json::Map<String, serde_json::Value>,
}

impl PushCustom {
    /// `true` when the sender asked for a silent notification.
    pub fn is_silent(&self) -> bool { self.silent.as_deref() == Some("1") }
}

/// A decrypted notification, handed to whoever renders it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    #[serde(default)]
    /// Localization key, e.g. `MESSAGE_TEXT`.
    pub loc_key:     String,
    #[serde(default)]
    /// Arguments for `loc_key`.
    pub loc_args:    Vec<String>,
    #[serde(default)]
    /// Routing data.
    pub custom:      PushCustom,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Sound name.
    pub sound:       Option<String>,
    #[serde(default)]
    /// Deduplication id.
    pub random_id:   i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Unread counter to show.
    pub badge:       Option<String>,
    #[serde(default)]
    /// Human-readable fallback text.
    pub description: String,
    #[serde(default)]
    /// `"1"` if the chat is muted.
    pub mute:        String,
    #[serde(default)]
    /// Notification title.
    pub title:       String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Message preview.
    pub message:     Option<String>,
    /// Receiving user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id:     Option<i64>,
    #[serde(flatten)]
    /// Fields not modelled above.
    pub extra:       serde_json::Map<String, serde_json::Value>,
}

// ─── Decryptor ────────────────────────────────────────────────────────────────

/// Per-process push key cache and payload decryption.
pub struct PushDecryptor {
    provider:         Arc<dyn CryptoProvider>,
    accounts:         Arc<dyn AccountKeySource>,
    scheme:           Scheme,
    passcode_enabled: bool,
    cache:            HashMap<AccountId, PushKey>,
}

impl PushDecryptor {
    /// Empty cache; keys are computed lazily.
    pub fn new(
        provider:         Arc<dyn CryptoProvider>,
        accounts:         Arc<dyn AccountKeySource>,
        passcode_enabled: bool,
        scheme:           Scheme,
    ) -> Self {
        Self { provider, accounts, scheme, passcode_enabled, cache: HashMap::new() }
    }

    /// Whether push keys currently encrypt.
    pub fn passcode_enabled(&self) -> bool { self.passcode_enabled }

    /// Push key for `account`, computed on first use.
    ///
    /// With passcode encryption off every account gets the sentinel. With
    /// it on, an account without stored key material is an error and
    /// nothing is cached for it.
    pub fn get_key(&mut self, account: AccountId) -> Result<PushKey, PushError> {
        if let Some(k) = self.cache.get(&account) {
            return Ok(k.clone());
        }
        let key = if self.passcode_enabled {
            self.accounts.push_key(account).ok_or_else(|| {
                tracing::warn!("[push] account {} has no push key while passcode is on", account.0);
                PushError::KeyUnavailable
            })?
        } else {
            Vec::new()
        };
        let key = PushKey::from_key(key);
        self.cache.insert(account, key.clone());
        Ok(key)
    }

    /// Keys of every signed-in account, in account order.
    pub fn keys(&mut self) -> Result<Vec<(AccountId, PushKey)>, PushError> {
        let mut accounts = self.accounts.accounts();
        accounts.sort();
        accounts.into_iter().map(|a| Ok((a, self.get_key(a)?))).collect()
    }

    /// The `id_base64` of every signed-in account's key.
    pub fn ids_base64(&mut self) -> Result<Vec<String>, PushError> {
        Ok(self.keys()?.into_iter().map(|(_, k)| k.id_base64).collect())
    }

    /// Find the key whose `id_base64` prefixes a raw base64 payload.
    pub fn key_for_payload(&mut self, payload: &str) -> Result<Option<PushKey>, PushError> {
        match self.find_key(|k| payload.starts_with(&k.id_base64)) {
            Ok(k) => Ok(Some(k)),
            Err(PushError::NoMatchingKey) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// First account key matching `pred`.
    ///
    /// Accounts whose key cannot be built do not hide the others; their
    /// error is returned only when no usable key matches.
    fn find_key(&mut self, pred: impl Fn(&PushKey) -> bool) -> Result<PushKey, PushError> {
        let mut accounts = self.accounts.accounts();
        accounts.sort();
        let mut failure = None;
        for account in accounts {
            match self.get_key(account) {
                Ok(k) if pred(&k) => return Ok(k),
                Ok(_) => {}
                Err(e) => failure = failure.or(Some(e)),
            }
        }
        Err(failure.unwrap_or(PushError::NoMatchingKey))
    }

    /// Drop every cached key.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Passcode state changed: rebuild all keys and re-register the device.
    pub async fn credentials_changed(
        &mut self,
        passcode_enabled: bool,
        registrar: &dyn DeviceRegistrar,
    ) -> Result<Vec<(AccountId, PushKey)>, PushError> {
        self.passcode_enabled = passcode_enabled;
        self.invalidate();
        let keys = self.keys()?;
        tracing::info!("[push] regenerated {} push key(s), passcode={passcode_enabled}", keys.len());
        registrar.register_device(&keys).await?;
        tracing::info!("[push] device registered");
        Ok(keys)
    }

    /// Decrypt a payload into an untyped JSON value.
    pub async fn decrypt(&mut self, payload: &str, id_base64: &str) -> Result<serde_json::Value, PushError> {
        self.decrypt_as(payload, id_base64).await
    }

    /// Decrypt a payload into a [`PushNotification`].
    pub async fn decrypt_notification(&mut self, payload: &str, id_base64: &str) -> Result<PushNotification, PushError> {
        self.decrypt_as(payload, id_base64).await
    }

    /// Decrypt a payload and JSON-decode it as `T`.
    pub async fn decrypt_as<T: DeserializeOwned>(&mut self, payload: &str, id_base64: &str) -> Result<T, PushError> {
        let plaintext = self.decrypt_bytes(payload, id_base64).await?;
        let data = read_length_prefixed(&plaintext)?;
        Ok(serde_json::from_slice(data)?)
    }

    async fn decrypt_bytes(&mut self, payload: &str, id_base64: &str) -> Result<Vec<u8>, PushError> {
        let push_key = self.find_key(|k| k.id_base64 == id_base64).inspect_err(|e| {
            tracing::warn!("[push] no push key for id {id_base64}: {e}");
        })?;

        let bytes = decode_payload(payload)?;
        if bytes.len() < HEADER_LEN || (bytes.len() - HEADER_LEN) % 16 != 0 {
            return Err(PushError::PayloadTooShort(bytes.len()));
        }
        if bytes[..8] != push_key.id {
            tracing::warn!("[push] auth key id mismatch for {id_base64}");
            return Err(PushError::KeyIdMismatch);
        }
        let auth_key = AuthKey::from_slice(&push_key.key).map_err(|_| PushError::KeyUnavailable)?;

        let mut msg_key = [0u8; MSG_KEY_LEN];
        msg_key.copy_from_slice(&bytes[8..HEADER_LEN]);

        let provider = &*self.provider;
        let KeyIv { key, iv } =
            derive_key_iv_with(provider, &auth_key, &msg_key, Direction::Incoming, self.scheme).await?;
        let decrypted = provider.aes_decrypt(&bytes[HEADER_LEN..], &key, &iv).await?;

        let ours = derive_msg_key_with(provider, &auth_key, &decrypted, Direction::Incoming, self.scheme).await?;
        if ours != msg_key {
            tracing::warn!("[push] message key mismatch for {id_base64}, dropping payload");
            return Err(PushError::MessageKeyMismatch);
        }
        Ok(decrypted)
    }
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, PushError> {
    let normalized: String = payload
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    Ok(LENIENT_B64.decode(normalized)?)
}

/// `length:i32 || data[length]`, trailing padding ignored.
fn read_length_prefixed(buf: &[u8]) -> Result<&[u8], PushError> {
    let Some(head) = buf.get(..4) else {
        return Err(PushError::Payload("missing length prefix".into()));
    };
    let mut len = [0u8; 4];
    len.copy_from_slice(head);
    let len = i32::from_le_bytes(len);
    let rest = &buf[4..];
    match usize::try_from(len) {
        Ok(n) if n <= rest.len() => Ok(&rest[..n]),
        _ => Err(PushError::Payload(format!("length {len} exceeds {} available bytes", rest.len()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_base64_is_ten_chars_and_prefixes_payload() {
        let key = PushKey::from_key(vec![1u8; 256]);
        assert_eq!(key.id_base64.len(), 10);

        let mut envelope = key.id.to_vec();
        envelope.extend_from_slice(&[0xFF; 40]);
        assert!(STANDARD.encode(&envelope).starts_with(&key.id_base64));
    }

    #[test]
    fn sentinel_is_hash_of_empty_key() {
        let s = PushKey::sentinel();
        assert!(!s.encrypts());
        assert_eq!(s.id, key_id_of(&[]));
        assert_eq!(s, PushKey::from_key(Vec::new()));
    }

    #[test]
    fn length_prefix_parsing() {
        let mut buf = 3i32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"abc\0\0\0");
        assert_eq!(read_length_prefixed(&buf).unwrap(), b"abc");

        let buf = 100i32.to_le_bytes();
        assert!(matches!(read_length_prefixed(&buf), Err(PushError::Payload(_))));
        let buf = (-1i32).to_le_bytes();
        assert!(matches!(read_length_prefixed(&buf), Err(PushError::Payload(_))));
        assert!(matches!(read_length_prefixed(&[1, 2]), Err(PushError::Payload(_))));
    }

    #[test]
    fn url_safe_payloads_decode() {
        let raw = [0xFBu8, 0xFF, 0xBF];
        assert_eq!(decode_payload("-_-_").unwrap(), raw.to_vec());
        assert_eq!(decode_payload(&STANDARD.encode(raw)).unwrap(), raw.to_vec());
    }

    #[test]
    fn debug_hides_key_bytes() {
        let shown = format!("{:?}", PushKey::from_key(vec![0x41; 256]));
        assert!(shown.contains("encrypts: true"));
        assert!(!shown.contains("65, 65"));
    }
}
