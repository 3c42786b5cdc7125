//! Owned per-process state of the session core.

use std::sync::Arc;

use strand_crypto::CryptoProvider;

use crate::config::CoreConfig;
use crate::errors::PushError;
use crate::message::MessageIdGenerator;
use crate::push::{AccountId, AccountKeySource, DeviceRegistrar, PushDecryptor, PushKey};
use crate::status::StatusTracker;

/// Everything the core keeps between calls, passed explicitly to callers.
///
/// Create one at session start and drop it at session end.
pub struct SessionContext {
    /// Settings the context was built with.
    pub config: CoreConfig,
    /// Message ids for the session.
    pub ids:    MessageIdGenerator,
    /// Connection state per endpoint.
    pub status: StatusTracker,
    /// Push keys and decryption.
    pub push:   PushDecryptor,
}

impl SessionContext {
    /// Build every component from `config`, restoring the stored clock offset.
    pub fn new(
        config:           CoreConfig,
        provider:         Arc<dyn CryptoProvider>,
        accounts:         Arc<dyn AccountKeySource>,
        passcode_enabled: bool,
    ) -> Self {
        let ids = MessageIdGenerator::new(&config);
        let push = PushDecryptor::new(provider, accounts, passcode_enabled, config.scheme);
        tracing::debug!("[session] context created ({config:?}, offset={}s)", ids.time_offset());
        Self { config, ids, status: StatusTracker::new(), push }
    }

    /// Credentials (passcode state) changed: regenerate push keys and re-register.
    pub async fn credentials_changed(
        &mut self,
        passcode_enabled: bool,
        registrar: &dyn DeviceRegistrar,
    ) -> Result<Vec<(AccountId, PushKey)>, PushError> {
        self.push.credentials_changed(passcode_enabled, registrar).await
    }
}
