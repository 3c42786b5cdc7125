//! MTProto session core.
//!
//! This crate handles:
//! * Binary helpers (decimal longs, padding, gzip)
//! * Monotonic message ids and the server clock offset
//! * Per-endpoint connection status bookkeeping
//! * Decryption of push-delivered payloads for several accounts
//! * Encrypted message framing on top of `strand-crypto`
//!
//! It is intentionally transport-agnostic: sockets, RPC dispatch and retry
//! policy live with the caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod binary;
pub mod config;
mod context;
pub mod errors;
pub mod message;
pub mod push;
pub mod session;
pub mod status;
pub mod storage;

pub use config::CoreConfig;
pub use context::SessionContext;
pub use errors::{DecodeError, PushError, SessionError};
pub use message::{MessageId, MessageIdGenerator, server_time_from_msg_id};
pub use push::{AccountId, AccountKeySource, DeviceRegistrar, PushDecryptor, PushKey, PushNotification};
pub use session::EncryptedSession;
pub use status::{ConnectionStatus, EndpointKey, StatusEvent, StatusRecord, StatusTracker};
pub use storage::{FileStore, InMemoryStore, OffsetStore};
