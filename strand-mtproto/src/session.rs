//! Encrypted MTProto session framing.
//!
//! Wraps an [`AuthKey`] and tracks per-session counters (session_id, seq_no,
//! server salt). Message ids come from the caller's [`MessageIdGenerator`],
//! so one generator can serve every connection of a session.

use strand_crypto::{AuthKey, CryptoError, Direction, Scheme, decrypt_message, encrypt_message};

use crate::errors::SessionError;
use crate::message::{MessageId, MessageIdGenerator};

/// `salt + session_id + msg_id + seq_no + len`.
const INNER_HEADER_LEN: usize = 8 + 8 + 8 + 4 + 4;

/// The inner payload extracted from a successfully decrypted server frame.
#[derive(Debug)]
pub struct DecryptedMessage {
    /// `salt` sent by the server.
    pub salt:       i64,
    /// The `session_id` from the frame.
    pub session_id: i64,
    /// The `msg_id` of the inner message.
    pub msg_id:     MessageId,
    /// `seq_no` of the inner message.
    pub seq_no:     i32,
    /// Serialized body of the inner message.
    pub body:       Vec<u8>,
}

/// Encrypted session state for one auth key.
pub struct EncryptedSession {
    auth_key:   AuthKey,
    session_id: i64,
    sequence:   i32,
    scheme:     Scheme,
    /// Current server salt to include in outgoing messages.
    pub salt:   i64,
}

impl EncryptedSession {
    /// Start a session with a random session id.
    pub fn new(auth_key: AuthKey, first_salt: i64, scheme: Scheme) -> Result<Self, CryptoError> {
        let mut rnd = [0u8; 8];
        getrandom::getrandom(&mut rnd).map_err(|e| CryptoError::Provider(e.to_string()))?;
        Ok(Self::with_session_id(auth_key, first_salt, scheme, i64::from_le_bytes(rnd)))
    }

    /// Start a session with a known session id.
    pub fn with_session_id(auth_key: AuthKey, first_salt: i64, scheme: Scheme, session_id: i64) -> Self {
        Self { auth_key, session_id, sequence: 0, scheme, salt: first_salt }
    }

    /// Next content-related seq_no (odd) and advance the counter.
    fn next_seq_no(&mut self) -> i32 {
        let n = self.sequence * 2 + 1;
        self.sequence += 1;
        n
    }

    /// seq_no for a content-unrelated message (ack, ping); does not advance.
    pub fn seq_no_unrelated(&self) -> i32 { self.sequence * 2 }

    /// Frame and encrypt `body`, returning the wire bytes and the allocated id.
    ///
    /// Layout of the plaintext before encryption:
    /// ```text
    /// salt:       i64
    /// session_id: i64
    /// msg_id:     i64
    /// seq_no:     i32
    /// body_len:   i32
    /// body:       [u8; body_len]
    /// ```
    pub fn pack(&mut self, ids: &mut MessageIdGenerator, body: &[u8]) -> Result<(Vec<u8>, MessageId), SessionError> {
        let msg_id = ids.next_id();
        let seq_no = self.next_seq_no();

        let mut buf = Vec::with_capacity(INNER_HEADER_LEN + body.len());
        buf.extend(self.salt.to_le_bytes());
        buf.extend(self.session_id.to_le_bytes());
        buf.extend(msg_id.0.to_le_bytes());
        buf.extend(seq_no.to_le_bytes());
        buf.extend((body.len() as u32).to_le_bytes());
        buf.extend_from_slice(body);

        let wire = encrypt_message(&buf, &self.auth_key, Direction::Outgoing, self.scheme)?;
        Ok((wire, msg_id))
    }

    /// Decrypt an encrypted server frame.
    pub fn unpack(&self, frame: &mut [u8]) -> Result<DecryptedMessage, SessionError> {
        let plaintext = decrypt_message(frame, &self.auth_key, Direction::Incoming, self.scheme)?;
        if plaintext.len() < INNER_HEADER_LEN {
            return Err(SessionError::FrameTooShort);
        }

        let word = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&plaintext[at..at + 8]);
            b
        };
        let half = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&plaintext[at..at + 4]);
            b
        };

        let salt       = i64::from_le_bytes(word(0));
        let session_id = i64::from_le_bytes(word(8));
        let msg_id     = MessageId(u64::from_le_bytes(word(16)));
        let seq_no     = i32::from_le_bytes(half(24));
        let body_len   = u32::from_le_bytes(half(28)) as usize;

        if session_id != self.session_id {
            return Err(SessionError::SessionMismatch);
        }

        let available = plaintext.len() - INNER_HEADER_LEN;
        if body_len > available {
            return Err(SessionError::FrameTooShort);
        }
        let body = plaintext[INNER_HEADER_LEN..INNER_HEADER_LEN + body_len].to_vec();

        Ok(DecryptedMessage { salt, session_id, msg_id, seq_no, body })
    }

    /// The auth key this session encrypts with.
    pub fn auth_key(&self) -> &AuthKey { &self.auth_key }

    /// Return the current session_id.
    pub fn session_id(&self) -> i64 { self.session_id }
}
