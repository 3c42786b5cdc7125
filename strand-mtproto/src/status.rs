//! Per-endpoint connection status bookkeeping.
//!
//! The transport reports what it is doing; this module only records it.
//! Any status may follow any other. `Connected` is the only healthy state.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;

/// Capacity of the change-notification channel.
const EVENT_CAPACITY: usize = 64;

/// Connection state of one endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Ready for traffic.
    Connected,
    /// Handshake or reconnect in progress.
    Connecting,
    /// Closed by either side.
    Closed,
    /// No answer within the transport deadline.
    TimedOut,
}

impl ConnectionStatus {
    /// `true` only for [`ConnectionStatus::Connected`].
    pub fn is_healthy(self) -> bool { self == Self::Connected }

    /// Anything that is not connected counts as connecting.
    pub fn is_connecting(self) -> bool { !self.is_healthy() }
}

/// What a connection to a data center is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// RPC and updates.
    Client,
    /// File download.
    Download,
    /// File upload.
    Upload,
}

/// Identity of one logical connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Data center id.
    pub dc_id: i32,
    /// What the connection carries.
    pub kind:  ConnectionKind,
}

impl EndpointKey {
    /// The RPC connection to `dc_id`.
    pub fn client(dc_id: i32) -> Self { Self { dc_id, kind: ConnectionKind::Client } }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConnectionKind::Client   => "client",
            ConnectionKind::Download => "download",
            ConnectionKind::Upload   => "upload",
        };
        write!(f, "DC{}/{kind}", self.dc_id)
    }
}

/// The one status record kept per endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusRecord {
    /// Last reported status.
    pub status:   ConnectionStatus,
    /// Absolute time of the next reconnect attempt.
    pub retry_at: Option<SystemTime>,
}

impl StatusRecord {
    /// Time left until `retry_at`, clamped to zero once it has passed.
    pub fn retry_in(&self, now: SystemTime) -> Option<Duration> {
        self.retry_at.map(|at| at.duration_since(now).unwrap_or(Duration::ZERO))
    }
}

/// A status report from the transport. The same shape is broadcast to
/// subscribers whenever an endpoint's status actually changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    /// Affected endpoint.
    pub endpoint: EndpointKey,
    /// New status.
    pub status:   ConnectionStatus,
    /// Next reconnect attempt, if scheduled.
    pub retry_at: Option<SystemTime>,
}

/// Outcome of [`StatusTracker::set_status`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The status differs from the previous record (or there was none).
    pub changed:         bool,
    /// First `Connecting -> Connected` of a client connection since startup.
    /// The caller should force a full state resynchronization.
    pub resync_required: bool,
}

/// Flat map of endpoint → status record.
pub struct StatusTracker {
    records:      HashMap<EndpointKey, StatusRecord>,
    had_connect:  bool,
    events:       broadcast::Sender<StatusEvent>,
}

impl StatusTracker {
    /// Tracker with no endpoints recorded.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { records: HashMap::new(), had_connect: false, events }
    }

    /// Overwrite the record for `endpoint`.
    pub fn set_status(
        &mut self,
        endpoint: EndpointKey,
        status:   ConnectionStatus,
        retry_at: Option<SystemTime>,
    ) -> StatusUpdate {
        let prev = self.records.insert(endpoint, StatusRecord { status, retry_at }).map(|r| r.status);
        let changed = prev != Some(status);

        let resync_required = !self.had_connect
            && endpoint.kind == ConnectionKind::Client
            && prev == Some(ConnectionStatus::Connecting)
            && status == ConnectionStatus::Connected;
        if resync_required {
            self.had_connect = true;
            tracing::info!("[status] {endpoint} connected for the first time, state resync required");
        }

        if changed {
            tracing::debug!("[status] {endpoint}: {prev:?} -> {status:?}");
            // No subscribers is fine.
            let _ = self.events.send(StatusEvent { endpoint, status, retry_at });
        }
        StatusUpdate { changed, resync_required }
    }

    /// Record a transport event.
    pub fn apply(&mut self, event: StatusEvent) -> StatusUpdate {
        self.set_status(event.endpoint, event.status, event.retry_at)
    }

    /// Current record for `endpoint`.
    pub fn get_status(&self, endpoint: &EndpointKey) -> Option<StatusRecord> {
        self.records.get(endpoint).copied()
    }

    /// `true` when `endpoint` is known and not connected.
    pub fn is_connecting(&self, endpoint: &EndpointKey) -> bool {
        self.get_status(endpoint).is_some_and(|r| r.status.is_connecting())
    }

    /// All known endpoints and their records.
    pub fn iter(&self) -> impl Iterator<Item = (&EndpointKey, &StatusRecord)> {
        self.records.iter()
    }

    /// Receive every subsequent status change.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }
}

impl Default for StatusTracker {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connecting_is_everything_but_connected() {
        assert!(!ConnectionStatus::Connected.is_connecting());
        for s in [ConnectionStatus::Connecting, ConnectionStatus::Closed, ConnectionStatus::TimedOut] {
            assert!(s.is_connecting());
        }
    }

    #[test]
    fn countdown_clamps_to_zero() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let rec = StatusRecord {
            status:   ConnectionStatus::Closed,
            retry_at: Some(now + Duration::from_secs(5)),
        };
        assert_eq!(rec.retry_in(now), Some(Duration::from_secs(5)));
        assert_eq!(rec.retry_in(now + Duration::from_secs(9)), Some(Duration::ZERO));

        let rec = StatusRecord { status: ConnectionStatus::Connected, retry_at: None };
        assert_eq!(rec.retry_in(now), None);
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(EndpointKey::client(2).to_string(), "DC2/client");
        let k = EndpointKey { dc_id: 4, kind: ConnectionKind::Download };
        assert_eq!(k.to_string(), "DC4/download");
    }
}
