//! AES-256 in Infinite Garble Extension (IGE) mode.
//!
//! MTProto splits the 32-byte IV into two halves: the first stands in for
//! the "previous ciphertext block" and the second for the "previous
//! plaintext block" when processing the first block.

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::CryptoError;

const BLOCK: usize = 16;

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (a, b) in dst.iter_mut().zip(src) {
        *a ^= b;
    }
}

fn check_aligned(buffer: &[u8]) -> Result<(), CryptoError> {
    if buffer.len() % BLOCK != 0 {
        return Err(CryptoError::UnalignedInput(buffer.len()));
    }
    Ok(())
}

/// Encrypt `buffer` in place. Its length must be a multiple of 16.
pub fn ige_encrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), CryptoError> {
    check_aligned(buffer)?;
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; BLOCK];
    let mut prev_plain = [0u8; BLOCK];
    prev_cipher.copy_from_slice(&iv[..BLOCK]);
    prev_plain.copy_from_slice(&iv[BLOCK..]);

    for chunk in buffer.chunks_exact_mut(BLOCK) {
        let mut plain = [0u8; BLOCK];
        plain.copy_from_slice(chunk);

        xor_in_place(chunk, &prev_cipher);
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        xor_in_place(chunk, &prev_plain);

        prev_cipher.copy_from_slice(chunk);
        prev_plain = plain;
    }
    Ok(())
}

/// Decrypt `buffer` in place. Its length must be a multiple of 16.
pub fn ige_decrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), CryptoError> {
    check_aligned(buffer)?;
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; BLOCK];
    let mut prev_plain = [0u8; BLOCK];
    prev_cipher.copy_from_slice(&iv[..BLOCK]);
    prev_plain.copy_from_slice(&iv[BLOCK..]);

    for chunk in buffer.chunks_exact_mut(BLOCK) {
        let mut ciphertext = [0u8; BLOCK];
        ciphertext.copy_from_slice(chunk);

        xor_in_place(chunk, &prev_plain);
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        xor_in_place(chunk, &prev_cipher);

        prev_plain.copy_from_slice(chunk);
        prev_cipher = ciphertext;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [7u8; 32];
        let iv = [9u8; 32];
        let original: Vec<u8> = (0..64u8).collect();
        let mut buf = original.clone();
        ige_encrypt(&mut buf, &key, &iv).unwrap();
        assert_ne!(buf, original);
        ige_decrypt(&mut buf, &key, &iv).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn rejects_unaligned() {
        let mut buf = vec![0u8; 17];
        assert_eq!(
            ige_encrypt(&mut buf, &[0; 32], &[0; 32]),
            Err(CryptoError::UnalignedInput(17))
        );
    }

    #[test]
    fn garble_propagates_forward() {
        // Flipping one ciphertext byte corrupts that block and every later one.
        let key = [1u8; 32];
        let iv = [2u8; 32];
        let original = vec![0x55u8; 48];
        let mut buf = original.clone();
        ige_encrypt(&mut buf, &key, &iv).unwrap();
        buf[3] ^= 0x01;
        ige_decrypt(&mut buf, &key, &iv).unwrap();
        assert_ne!(buf[..16], original[..16]);
        assert_ne!(buf[16..32], original[16..32]);
    }
}
