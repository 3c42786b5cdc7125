//! Message key and AES key/IV derivation.
//!
//! Both schemes are split in two halves: a synchronous *plan* that lays out
//! the exact bytes each hash call consumes, and an *assembly* step that cuts
//! the digests back into key material. The hashing in between is either done
//! natively here or delegated to a [`crate::CryptoProvider`].
//!
//! Every offset below is part of the wire contract with the server.

use crate::hash::HashAlgo;
use crate::{AuthKey, CryptoError};

/// Message key length in bytes.
pub const MSG_KEY_LEN: usize = 16;

/// Key derivation scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// MTProto 1.0: SHA-1 based. Only for old key material.
    V1,
    /// MTProto 2.0: SHA-256 based.
    #[default]
    V2,
}

/// Direction of a message, seen from the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server.
    Outgoing,
    /// Server to client (also used for push payloads).
    Incoming,
}

impl Direction {
    /// Byte offset `x` into the auth key.
    pub fn x(self) -> usize {
        match self {
            Self::Outgoing => 0,
            Self::Incoming => 8,
        }
    }

    /// Map a plain `incoming` flag.
    pub fn from_incoming(incoming: bool) -> Self {
        if incoming { Self::Incoming } else { Self::Outgoing }
    }
}

/// Which end of the connection is doing the work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Direction of messages this side encrypts.
    pub fn sending(self) -> Direction {
        match self {
            Self::Client => Direction::Outgoing,
            Self::Server => Direction::Incoming,
        }
    }

    /// Direction of messages this side decrypts.
    pub fn receiving(self) -> Direction {
        match self {
            Self::Client => Direction::Incoming,
            Self::Server => Direction::Outgoing,
        }
    }
}

/// AES-256-IGE key and IV for one message.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyIv {
    pub key: [u8; 32],
    pub iv: [u8; 32],
}

impl std::fmt::Debug for KeyIv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyIv(..)")
    }
}

/// The hash inputs a key/IV derivation needs, in order.
#[derive(Clone, Debug)]
pub struct KeyIvPlan {
    pub scheme: Scheme,
    pub algo: HashAlgo,
    pub inputs: Vec<Vec<u8>>,
}

/// The hash input for a message key: `prefix || data`.
#[derive(Clone, Copy, Debug)]
pub struct MsgKeyPlan<'a> {
    pub scheme: Scheme,
    pub algo: HashAlgo,
    pub prefix: &'a [u8],
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for p in parts {
        out.extend_from_slice(p);
    }
    out
}

/// Lay out the hash inputs for `(key, iv)` derivation.
pub fn key_iv_plan(auth_key: &AuthKey, msg_key: &[u8; MSG_KEY_LEN], dir: Direction, scheme: Scheme) -> KeyIvPlan {
    let a = &auth_key.data;
    let x = dir.x();
    match scheme {
        Scheme::V2 => KeyIvPlan {
            scheme,
            algo: HashAlgo::Sha256,
            // two 52-byte strings
            inputs: vec![
                concat(&[msg_key, &a[x..x + 36]]),
                concat(&[&a[40 + x..76 + x], msg_key]),
            ],
        },
        Scheme::V1 => KeyIvPlan {
            scheme,
            algo: HashAlgo::Sha1,
            inputs: vec![
                concat(&[msg_key, &a[x..x + 32]]),
                concat(&[&a[32 + x..48 + x], msg_key, &a[48 + x..64 + x]]),
                concat(&[&a[64 + x..96 + x], msg_key]),
                concat(&[msg_key, &a[96 + x..128 + x]]),
            ],
        },
    }
}

fn check_digests(plan_len: usize, algo: HashAlgo, digests: &[Vec<u8>]) -> Result<(), CryptoError> {
    if digests.len() != plan_len {
        return Err(CryptoError::DigestLength { expected: plan_len, got: digests.len() });
    }
    for d in digests {
        if d.len() != algo.output_len() {
            return Err(CryptoError::DigestLength { expected: algo.output_len(), got: d.len() });
        }
    }
    Ok(())
}

/// Cut the digests produced for a [`KeyIvPlan`] into the final key and IV.
pub fn key_iv_from_digests(scheme: Scheme, digests: &[Vec<u8>]) -> Result<KeyIv, CryptoError> {
    match scheme {
        Scheme::V2 => check_digests(2, HashAlgo::Sha256, digests)?,
        Scheme::V1 => check_digests(4, HashAlgo::Sha1, digests)?,
    }
    Ok(assemble_key_iv(scheme, digests))
}

// Callers must have checked digest count and sizes.
fn assemble_key_iv(scheme: Scheme, digests: &[Vec<u8>]) -> KeyIv {
    let mut key = [0u8; 32];
    let mut iv = [0u8; 32];
    match scheme {
        Scheme::V2 => {
            let (a, b) = (&digests[0], &digests[1]);
            key[..8].copy_from_slice(&a[..8]);
            key[8..24].copy_from_slice(&b[8..24]);
            key[24..].copy_from_slice(&a[24..32]);

            iv[..8].copy_from_slice(&b[..8]);
            iv[8..24].copy_from_slice(&a[8..24]);
            iv[24..].copy_from_slice(&b[24..32]);
        }
        Scheme::V1 => {
            let (a, b, c, d) = (&digests[0], &digests[1], &digests[2], &digests[3]);
            key[..8].copy_from_slice(&a[..8]);
            key[8..20].copy_from_slice(&b[8..20]);
            key[20..].copy_from_slice(&c[4..16]);

            iv[..12].copy_from_slice(&a[8..20]);
            iv[12..20].copy_from_slice(&b[..8]);
            iv[20..24].copy_from_slice(&c[16..20]);
            iv[24..].copy_from_slice(&d[..8]);
        }
    }
    KeyIv { key, iv }
}

/// Lay out the hash input for a message key over `data_with_padding`.
pub fn msg_key_plan(auth_key: &AuthKey, dir: Direction, scheme: Scheme) -> MsgKeyPlan<'_> {
    let x = dir.x();
    match scheme {
        Scheme::V2 => MsgKeyPlan {
            scheme,
            algo: HashAlgo::Sha256,
            prefix: &auth_key.data[88 + x..120 + x],
        },
        Scheme::V1 => MsgKeyPlan { scheme, algo: HashAlgo::Sha1, prefix: &[] },
    }
}

/// Extract the 16-byte message key from its digest.
pub fn msg_key_from_digest(scheme: Scheme, digest: &[u8]) -> Result<[u8; MSG_KEY_LEN], CryptoError> {
    let (algo, start) = match scheme {
        Scheme::V2 => (HashAlgo::Sha256, 8),
        Scheme::V1 => (HashAlgo::Sha1, 4),
    };
    if digest.len() != algo.output_len() {
        return Err(CryptoError::DigestLength { expected: algo.output_len(), got: digest.len() });
    }
    let mut msg_key = [0u8; MSG_KEY_LEN];
    msg_key.copy_from_slice(&digest[start..start + MSG_KEY_LEN]);
    Ok(msg_key)
}

/// Derive `(key, iv)` with the native hash implementation.
pub fn derive_key_iv(auth_key: &AuthKey, msg_key: &[u8; MSG_KEY_LEN], dir: Direction, scheme: Scheme) -> KeyIv {
    let plan = key_iv_plan(auth_key, msg_key, dir, scheme);
    let digests: Vec<Vec<u8>> = plan.inputs.iter().map(|i| plan.algo.digest(i)).collect();
    assemble_key_iv(scheme, &digests)
}

/// Derive the message key of `data_with_padding` with the native hash implementation.
pub fn derive_msg_key(auth_key: &AuthKey, data_with_padding: &[u8], dir: Direction, scheme: Scheme) -> [u8; MSG_KEY_LEN] {
    let plan = msg_key_plan(auth_key, dir, scheme);
    let mut msg_key = [0u8; MSG_KEY_LEN];
    match plan.algo {
        HashAlgo::Sha256 => msg_key.copy_from_slice(&crate::sha256!(plan.prefix, data_with_padding)[8..24]),
        HashAlgo::Sha1 => msg_key.copy_from_slice(&crate::sha1!(plan.prefix, data_with_padding)[4..20]),
    }
    msg_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sha1, sha256};

    fn auth_key() -> AuthKey {
        let mut data = [0u8; 256];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        AuthKey::from_bytes(data)
    }

    #[test]
    fn v2_inputs_are_52_bytes() {
        let plan = key_iv_plan(&auth_key(), &[1; 16], Direction::Outgoing, Scheme::V2);
        assert_eq!(plan.inputs.len(), 2);
        assert!(plan.inputs.iter().all(|i| i.len() == 52));
        // sha256_a = msg_key || auth_key[0..36]
        assert_eq!(&plan.inputs[0][..16], &[1; 16]);
        assert_eq!(plan.inputs[0][16], 0);
        // sha256_b = auth_key[48..84] || msg_key when incoming
        let plan = key_iv_plan(&auth_key(), &[1; 16], Direction::Incoming, Scheme::V2);
        assert_eq!(plan.inputs[1][0], 48);
        assert_eq!(plan.inputs[0][16], 8);
    }

    #[test]
    fn v2_layout_matches_reference() {
        let key = auth_key();
        let msg_key = [0x42u8; 16];
        let a = sha256!(&msg_key, &key.data[8..44]);
        let b = sha256!(&key.data[48..84], &msg_key);
        let KeyIv { key: k, iv } = derive_key_iv(&key, &msg_key, Direction::Incoming, Scheme::V2);
        assert_eq!(k[..8], a[..8]);
        assert_eq!(k[8..24], b[8..24]);
        assert_eq!(k[24..], a[24..]);
        assert_eq!(iv[..8], b[..8]);
        assert_eq!(iv[8..24], a[8..24]);
        assert_eq!(iv[24..], b[24..]);
    }

    #[test]
    fn v1_layout_matches_reference() {
        let key = auth_key();
        let m = [0x24u8; 16];
        let a = sha1!(&m, &key.data[0..32]);
        let b = sha1!(&key.data[32..48], &m, &key.data[48..64]);
        let c = sha1!(&key.data[64..96], &m);
        let d = sha1!(&m, &key.data[96..128]);
        let KeyIv { key: k, iv } = derive_key_iv(&key, &m, Direction::Outgoing, Scheme::V1);
        assert_eq!(k[..8], a[..8]);
        assert_eq!(k[8..20], b[8..20]);
        assert_eq!(k[20..], c[4..16]);
        assert_eq!(iv[..12], a[8..20]);
        assert_eq!(iv[12..20], b[..8]);
        assert_eq!(iv[20..24], c[16..20]);
        assert_eq!(iv[24..], d[..8]);
    }

    #[test]
    fn msg_key_slices() {
        let key = auth_key();
        let data = [5u8; 32];
        let v2 = sha256!(&key.data[96..128], &data);
        assert_eq!(derive_msg_key(&key, &data, Direction::Incoming, Scheme::V2)[..], v2[8..24]);
        let v1 = sha1!(&data);
        assert_eq!(derive_msg_key(&key, &data, Direction::Incoming, Scheme::V1)[..], v1[4..20]);
    }

    #[test]
    fn derivations_are_pure_and_directional() {
        let key = auth_key();
        let m = [9u8; 16];
        for scheme in [Scheme::V1, Scheme::V2] {
            let out = derive_key_iv(&key, &m, Direction::Outgoing, scheme);
            assert_eq!(out, derive_key_iv(&key, &m, Direction::Outgoing, scheme));
            assert_ne!(out, derive_key_iv(&key, &m, Direction::Incoming, scheme));
        }
        let data = [1u8; 48];
        assert_ne!(
            derive_msg_key(&key, &data, Direction::Outgoing, Scheme::V2),
            derive_msg_key(&key, &data, Direction::Incoming, Scheme::V2),
        );
    }

    #[test]
    fn wrong_digest_shape_is_rejected() {
        let err = key_iv_from_digests(Scheme::V2, &[vec![0; 32]]).unwrap_err();
        assert_eq!(err, CryptoError::DigestLength { expected: 2, got: 1 });
        let err = msg_key_from_digest(Scheme::V1, &[0; 32]).unwrap_err();
        assert_eq!(err, CryptoError::DigestLength { expected: 20, got: 32 });
    }

    #[test]
    fn sides_pair_up() {
        assert_eq!(Side::Client.sending(), Side::Server.receiving());
        assert_eq!(Side::Server.sending(), Side::Client.receiving());
        assert_eq!(Direction::from_incoming(true), Direction::Incoming);
    }
}
