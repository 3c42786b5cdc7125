//! SHA-1 / SHA-256 helpers.
//!
//! The macros hash any number of byte slices as if they were concatenated,
//! which is how every MTProto derivation feeds its inputs.

/// Calculate the SHA-1 digest of one or more byte slices concatenated.
#[macro_export]
macro_rules! sha1 {
    ( $( $x:expr ),+ $(,)? ) => {{
        use sha1::{Digest, Sha1};
        let mut h = Sha1::new();
        $( h.update($x); )+
        let out: [u8; 20] = h.finalize().into();
        out
    }};
}

/// Calculate the SHA-256 digest of one or more byte slices concatenated.
#[macro_export]
macro_rules! sha256 {
    ( $( $x:expr ),+ $(,)? ) => {{
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        $( h.update($x); )+
        let out: [u8; 32] = h.finalize().into();
        out
    }};
}

/// Which digest a derivation step asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgo {
    /// 160-bit SHA-1 (legacy scheme).
    Sha1,
    /// 256-bit SHA-256 (current scheme).
    Sha256,
}

impl HashAlgo {
    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Hash `data` synchronously with the native implementation.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1!(data).to_vec(),
            Self::Sha256 => sha256!(data).to_vec(),
        }
    }
}
