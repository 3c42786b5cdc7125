//! Configuration for a [`crate::SessionContext`].

use std::sync::Arc;

use strand_crypto::Scheme;

use crate::storage::{InMemoryStore, OffsetStore};

/// Storage name the clock offset is persisted under by default.
pub const DEFAULT_TIME_OFFSET_KEY: &str = "server_time_offset";

/// Offset changes larger than this many seconds are reported as drift.
pub const DEFAULT_DRIFT_THRESHOLD_SECS: i64 = 10;

/// Tunables for the session core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Key the clock offset is stored under.
    pub time_offset_key:      String,
    /// Drift threshold for [`crate::MessageIdGenerator::apply_server_time`].
    pub drift_threshold_secs: i64,
    /// Key derivation scheme for push payloads and encrypted frames.
    pub scheme:               Scheme,
    /// Where the clock offset is persisted (default: in memory).
    pub store:                Arc<dyn OffsetStore>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            time_offset_key:      DEFAULT_TIME_OFFSET_KEY.to_owned(),
            drift_threshold_secs: DEFAULT_DRIFT_THRESHOLD_SECS,
            scheme:               Scheme::V2,
            store:                Arc::new(InMemoryStore::new()),
        }
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("time_offset_key", &self.time_offset_key)
            .field("drift_threshold_secs", &self.drift_threshold_secs)
            .field("scheme", &self.scheme)
            .field("store", &self.store.name())
            .finish()
    }
}
