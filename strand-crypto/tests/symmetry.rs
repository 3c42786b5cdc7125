use strand_crypto::{
    AUTH_KEY_LEN, AuthKey, DecryptError, Direction, Scheme, Side, decrypt_message, derive_key_iv,
    encrypt_message,
};

fn shared_key() -> AuthKey {
    let mut data = [0u8; AUTH_KEY_LEN];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(17);
    }
    AuthKey::from_bytes(data)
}

#[test]
fn client_to_server_round_trip() {
    let key = shared_key();
    for scheme in [Scheme::V1, Scheme::V2] {
        let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut wire = encrypt_message(&plaintext, &key, Side::Client.sending(), scheme).unwrap();
        let out = decrypt_message(&mut wire, &key, Side::Server.receiving(), scheme).unwrap();
        assert_eq!(&out[..plaintext.len()], &plaintext[..]);
    }
}

#[test]
fn server_to_client_round_trip() {
    let key = shared_key();
    for scheme in [Scheme::V1, Scheme::V2] {
        let plaintext = vec![0xA5u8; 100];
        let mut wire = encrypt_message(&plaintext, &key, Side::Server.sending(), scheme).unwrap();
        let out = decrypt_message(&mut wire, &key, Side::Client.receiving(), scheme).unwrap();
        assert_eq!(&out[..plaintext.len()], &plaintext[..]);
    }
}

#[test]
fn wrong_direction_fails_authentication() {
    let key = shared_key();
    let mut wire = encrypt_message(b"ping", &key, Direction::Outgoing, Scheme::V2).unwrap();
    assert_eq!(
        decrypt_message(&mut wire, &key, Direction::Incoming, Scheme::V2).unwrap_err(),
        DecryptError::MessageKeyMismatch
    );
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let key = shared_key();
    let mut wire = encrypt_message(&[7u8; 64], &key, Direction::Incoming, Scheme::V2).unwrap();
    let last = wire.len() - 1;
    wire[last] ^= 0x80;
    assert_eq!(
        decrypt_message(&mut wire, &key, Direction::Incoming, Scheme::V2).unwrap_err(),
        DecryptError::MessageKeyMismatch
    );
}

#[test]
fn schemes_do_not_interoperate() {
    let key = shared_key();
    let msg_key = [0x10u8; 16];
    assert_ne!(
        derive_key_iv(&key, &msg_key, Direction::Incoming, Scheme::V1),
        derive_key_iv(&key, &msg_key, Direction::Incoming, Scheme::V2),
    );
}
