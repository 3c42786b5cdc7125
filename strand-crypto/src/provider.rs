//! Pluggable asynchronous crypto backend.
//!
//! Hashing and AES are the only suspension points of the session core.
//! Everything else (byte layouts, comparisons) runs synchronously around
//! these calls, so a fake provider is enough to unit-test the callers.

use async_trait::async_trait;

use crate::derive::{self, Direction, KeyIv, MSG_KEY_LEN, Scheme};
use crate::hash::HashAlgo;
use crate::{AuthKey, CryptoError, aes, sha1, sha256};

/// Hash and block-cipher operations the core delegates.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// SHA-1 of `data`.
    async fn sha1(&self, data: &[u8]) -> Result<[u8; 20], CryptoError>;

    /// SHA-256 of `data`.
    async fn sha256(&self, data: &[u8]) -> Result<[u8; 32], CryptoError>;

    /// AES-256-IGE encrypt. `data` must be 16-byte aligned.
    async fn aes_encrypt(&self, data: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

    /// AES-256-IGE decrypt. `data` must be 16-byte aligned.
    async fn aes_decrypt(&self, data: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

    /// Dispatch on [`HashAlgo`].
    async fn digest(&self, algo: HashAlgo, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(match algo {
            HashAlgo::Sha1 => self.sha1(data).await?.to_vec(),
            HashAlgo::Sha256 => self.sha256(data).await?.to_vec(),
        })
    }
}

/// In-process implementation backed by the `sha1`, `sha2` and `aes` crates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeCrypto;

#[async_trait]
impl CryptoProvider for NativeCrypto {
    async fn sha1(&self, data: &[u8]) -> Result<[u8; 20], CryptoError> {
        Ok(sha1!(data))
    }

    async fn sha256(&self, data: &[u8]) -> Result<[u8; 32], CryptoError> {
        Ok(sha256!(data))
    }

    async fn aes_encrypt(&self, data: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let mut out = data.to_vec();
        aes::ige_encrypt(&mut out, key, iv)?;
        Ok(out)
    }

    async fn aes_decrypt(&self, data: &[u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let mut out = data.to_vec();
        aes::ige_decrypt(&mut out, key, iv)?;
        Ok(out)
    }
}

/// Derive `(key, iv)` through `provider`.
pub async fn derive_key_iv_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    auth_key: &AuthKey,
    msg_key: &[u8; MSG_KEY_LEN],
    dir: Direction,
    scheme: Scheme,
) -> Result<KeyIv, CryptoError> {
    let plan = derive::key_iv_plan(auth_key, msg_key, dir, scheme);
    let mut digests = Vec::with_capacity(plan.inputs.len());
    for input in &plan.inputs {
        digests.push(provider.digest(plan.algo, input).await?);
    }
    derive::key_iv_from_digests(scheme, &digests)
}

/// Derive the message key of `data_with_padding` through `provider`.
pub async fn derive_msg_key_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    auth_key: &AuthKey,
    data_with_padding: &[u8],
    dir: Direction,
    scheme: Scheme,
) -> Result<[u8; MSG_KEY_LEN], CryptoError> {
    let plan = derive::msg_key_plan(auth_key, dir, scheme);
    let mut input = Vec::with_capacity(plan.prefix.len() + data_with_padding.len());
    input.extend_from_slice(plan.prefix);
    input.extend_from_slice(data_with_padding);
    let digest = provider.digest(plan.algo, &input).await?;
    derive::msg_key_from_digest(scheme, &digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{derive_key_iv, derive_msg_key};

    /// Delegates to native crypto but hands back truncated SHA-256 digests.
    struct Truncating;

    #[async_trait]
    impl CryptoProvider for Truncating {
        async fn sha1(&self, data: &[u8]) -> Result<[u8; 20], CryptoError> {
            NativeCrypto.sha1(data).await
        }
        async fn sha256(&self, data: &[u8]) -> Result<[u8; 32], CryptoError> {
            NativeCrypto.sha256(data).await
        }
        async fn aes_encrypt(&self, _: &[u8], _: &[u8; 32], _: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
            Err(CryptoError::Provider("offline".into()))
        }
        async fn aes_decrypt(&self, _: &[u8], _: &[u8; 32], _: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
            Err(CryptoError::Provider("offline".into()))
        }
        async fn digest(&self, algo: HashAlgo, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
            let mut d = algo.digest(data);
            d.truncate(16);
            Ok(d)
        }
    }

    #[tokio::test]
    async fn provider_path_matches_native() {
        let key = AuthKey::from_bytes([0x5a; 256]);
        let msg_key = [3u8; 16];
        for scheme in [Scheme::V1, Scheme::V2] {
            for dir in [Direction::Incoming, Direction::Outgoing] {
                let via = derive_key_iv_with(&NativeCrypto, &key, &msg_key, dir, scheme).await.unwrap();
                assert_eq!(via, derive_key_iv(&key, &msg_key, dir, scheme));

                let data = [0x11u8; 64];
                let mk = derive_msg_key_with(&NativeCrypto, &key, &data, dir, scheme).await.unwrap();
                assert_eq!(mk, derive_msg_key(&key, &data, dir, scheme));
            }
        }
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let key = AuthKey::from_bytes([1; 256]);
        let err = derive_key_iv_with(&Truncating, &key, &[0; 16], Direction::Incoming, Scheme::V2)
            .await
            .unwrap_err();
        assert_eq!(err, CryptoError::DigestLength { expected: 32, got: 16 });

        let err = Truncating.aes_decrypt(&[0; 16], &[0; 32], &[0; 32]).await.unwrap_err();
        assert_eq!(err, CryptoError::Provider("offline".into()));
    }

    #[tokio::test]
    async fn native_aes_round_trip() {
        let data = vec![0xC3u8; 32];
        let enc = NativeCrypto.aes_encrypt(&data, &[4; 32], &[5; 32]).await.unwrap();
        let dec = NativeCrypto.aes_decrypt(&enc, &[4; 32], &[5; 32]).await.unwrap();
        assert_eq!(dec, data);
    }
}
