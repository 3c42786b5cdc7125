//! MTProto message identifiers and the generator that mints them.
//!
//! A client message id is a 64-bit value made of two 32-bit words:
//!
//! ```text
//! high: server-corrected unix seconds
//! low:  msec << 21 | random16 << 3 | 0b100
//! ```
//!
//! The two least significant bits are always zero for client messages and
//! bit 2 is the client marker. Every id a generator returns is strictly
//! greater than the previous one; when the clock would not produce a larger
//! value the previous low word is bumped by 4 instead.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::binary::long_from_parts;
use crate::config::CoreConfig;
use crate::storage::OffsetStore;

/// Low-word increment used when the clock does not move forward.
pub const MSG_ID_STEP: u32 = 4;

/// A 64-bit MTProto message identifier.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Assemble from `(seconds, low word)`.
    pub fn from_parts(seconds: u32, word: u32) -> Self {
        Self((u64::from(seconds) << 32) | u64::from(word))
    }

    /// The seconds word.
    pub fn seconds(self) -> u32 { (self.0 >> 32) as u32 }

    /// The fractional/random/sequence word.
    pub fn word(self) -> u32 { self.0 as u32 }
}

impl fmt::Display for MessageId {
    /// Decimal, the representation the rest of the client passes around.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&long_from_parts(self.seconds(), self.word()))
    }
}

/// Server unix time encoded in a server-issued message id.
pub fn server_time_from_msg_id(id: MessageId) -> u32 { id.seconds() }

// ─── Sources ──────────────────────────────────────────────────────────────────

/// Wall clock in unix milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Source of the 16 random bits mixed into each id.
pub trait RandomSource: Send + Sync {
    /// One uniformly random draw.
    fn random_u16(&self) -> u16;
}

/// [`RandomSource`] backed by the OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_u16(&self) -> u16 {
        let mut b = [0u8; 2];
        // The monotonic bump covers collisions if the OS source fails.
        if let Err(e) = getrandom::getrandom(&mut b) {
            tracing::warn!("[msg_id] OS randomness unavailable ({e}), using zero random bits");
            b = [0; 2];
        }
        u16::from_le_bytes(b)
    }
}

// ─── Generator ────────────────────────────────────────────────────────────────

/// Mints strictly increasing message ids for one session.
pub struct MessageIdGenerator {
    last:            (u32, u32),
    time_offset:     i64,
    drift_threshold: i64,
    offset_key:      String,
    store:           Arc<dyn OffsetStore>,
    clock:           Arc<dyn Clock>,
    random:          Arc<dyn RandomSource>,
}

impl MessageIdGenerator {
    /// Create a generator using the system clock and OS randomness.
    ///
    /// The persisted clock offset is restored best-effort: a missing or
    /// unreadable value means an offset of zero.
    pub fn new(config: &CoreConfig) -> Self {
        Self::with_sources(config, Arc::new(SystemClock), Arc::new(OsRandom))
    }

    /// Create a generator with explicit time and randomness sources.
    pub fn with_sources(config: &CoreConfig, clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>) -> Self {
        let time_offset = match config.store.load(&config.time_offset_key) {
            Ok(v) => v.unwrap_or(0),
            Err(e) => {
                tracing::warn!(
                    "[msg_id] could not read {} from {} store ({e}), assuming 0",
                    config.time_offset_key,
                    config.store.name()
                );
                0
            }
        };
        Self {
            last: (0, 0),
            time_offset,
            drift_threshold: config.drift_threshold_secs,
            offset_key: config.time_offset_key.clone(),
            store: Arc::clone(&config.store),
            clock,
            random,
        }
    }

    /// The current `server - local` offset in seconds.
    pub fn time_offset(&self) -> i64 { self.time_offset }

    /// Server-corrected unix time in seconds.
    pub fn server_time(&self) -> i64 {
        (self.clock.now_ms() / 1000) as i64 + self.time_offset
    }

    /// Allocate the next message id.
    pub fn next_id(&mut self) -> MessageId {
        let now = self.clock.now_ms();
        let secs = corrected_seconds(now, self.time_offset);
        let msec = (now % 1000) as u32;
        let random = u32::from(self.random.random_u16());
        let word = (msec << 21) | (random << 3) | 4;

        let candidate = (secs, word);
        let next = if candidate > self.last {
            candidate
        } else {
            match self.last.1.checked_add(MSG_ID_STEP) {
                Some(w) => (self.last.0, w),
                // low word exhausted: carry into the seconds
                None => (self.last.0.wrapping_add(1), 4),
            }
        };
        self.last = next;
        MessageId::from_parts(next.0, next.1)
    }

    /// Allocate the next message id in its decimal form.
    pub fn generate(&mut self) -> String {
        self.next_id().to_string()
    }

    /// Learn the clock offset from a server timestamp.
    ///
    /// `local_time_ms` defaults to the current clock. Resets the last issued
    /// id, so ids minted afterwards are derived from the new offset and are
    /// not comparable to earlier ones. Returns `true` when the offset moved
    /// by more than the drift threshold.
    pub fn apply_server_time(&mut self, server_time_secs: i64, local_time_ms: Option<u64>) -> bool {
        let local_ms = local_time_ms.unwrap_or_else(|| self.clock.now_ms());
        let new_offset = server_time_secs - (local_ms / 1000) as i64;
        let changed = (self.time_offset - new_offset).abs() > self.drift_threshold;

        if let Err(e) = self.store.save(&self.offset_key, new_offset) {
            tracing::warn!("[msg_id] could not persist {} ({e})", self.offset_key);
        }
        self.last = (0, 0);
        self.time_offset = new_offset;
        tracing::info!("[msg_id] server time applied: offset={new_offset}s changed={changed}");
        changed
    }

    /// [`Self::apply_server_time`] with the time carried in a server message id.
    pub fn apply_server_msg_id(&mut self, server_msg_id: MessageId) -> bool {
        self.apply_server_time(i64::from(server_time_from_msg_id(server_msg_id)), None)
    }

    /// The last issued id, if any since creation or the last reset.
    pub fn last_issued(&self) -> Option<MessageId> {
        (self.last != (0, 0)).then(|| MessageId::from_parts(self.last.0, self.last.1))
    }
}

/// `now / 1000 + offset`, clamped into the 32-bit seconds word.
fn corrected_seconds(now_ms: u64, offset: i64) -> u32 {
    let secs = i64::try_from(now_ms / 1000).unwrap_or(i64::MAX).saturating_add(offset);
    u32::try_from(secs).unwrap_or_else(|_| {
        tracing::warn!("[msg_id] corrected time {secs}s outside the id range, clamping");
        if secs < 0 { 0 } else { u32::MAX }
    })
}

impl fmt::Debug for MessageIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageIdGenerator")
            .field("last", &self.last)
            .field("time_offset", &self.time_offset)
            .finish()
    }
}
