use std::time::{Duration, SystemTime};

use strand_mtproto::status::ConnectionKind;
use strand_mtproto::{ConnectionStatus, EndpointKey, StatusEvent, StatusRecord, StatusTracker};

#[test]
fn connecting_then_connected_leaves_clean_record() {
    let mut t = StatusTracker::new();
    let e = EndpointKey::client(2);
    let retry = SystemTime::now() + Duration::from_secs(3);

    t.set_status(e, ConnectionStatus::Connecting, Some(retry));
    t.set_status(e, ConnectionStatus::Connected, None);

    assert_eq!(
        t.get_status(&e),
        Some(StatusRecord { status: ConnectionStatus::Connected, retry_at: None })
    );
    assert!(!t.is_connecting(&e));
}

#[test]
fn endpoints_are_independent() {
    let mut t = StatusTracker::new();
    let e = EndpointKey::client(2);
    let f = EndpointKey::client(4);
    let e_download = EndpointKey { dc_id: 2, kind: ConnectionKind::Download };

    t.set_status(f, ConnectionStatus::Connected, None);
    t.set_status(e, ConnectionStatus::TimedOut, None);
    t.set_status(e_download, ConnectionStatus::Closed, None);

    assert_eq!(t.get_status(&f).map(|r| r.status), Some(ConnectionStatus::Connected));
    assert_eq!(t.get_status(&e).map(|r| r.status), Some(ConnectionStatus::TimedOut));
    assert_eq!(t.get_status(&e_download).map(|r| r.status), Some(ConnectionStatus::Closed));
    assert_eq!(t.get_status(&EndpointKey::client(1)), None);
    assert_eq!(t.iter().count(), 3);
}

#[test]
fn resync_is_requested_once() {
    let mut t = StatusTracker::new();
    let e = EndpointKey::client(2);

    // Connected without a preceding Connecting does not count.
    assert!(!t.set_status(e, ConnectionStatus::Connected, None).resync_required);

    t.set_status(e, ConnectionStatus::Connecting, None);
    let update = t.set_status(e, ConnectionStatus::Connected, None);
    assert!(update.changed);
    assert!(update.resync_required);

    t.set_status(e, ConnectionStatus::Connecting, None);
    assert!(!t.set_status(e, ConnectionStatus::Connected, None).resync_required);
}

#[test]
fn file_connections_never_request_resync() {
    let mut t = StatusTracker::new();
    let up = EndpointKey { dc_id: 1, kind: ConnectionKind::Upload };
    t.set_status(up, ConnectionStatus::Connecting, None);
    assert!(!t.set_status(up, ConnectionStatus::Connected, None).resync_required);

    let e = EndpointKey::client(1);
    t.set_status(e, ConnectionStatus::Connecting, None);
    assert!(t.set_status(e, ConnectionStatus::Connected, None).resync_required);
}

#[test]
fn repeated_status_is_not_a_change_but_updates_retry_time() {
    let mut t = StatusTracker::new();
    let e = EndpointKey::client(2);
    let first = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
    let second = SystemTime::UNIX_EPOCH + Duration::from_secs(20);

    assert!(t.set_status(e, ConnectionStatus::Closed, Some(first)).changed);
    assert!(!t.set_status(e, ConnectionStatus::Closed, Some(second)).changed);
    assert_eq!(t.get_status(&e).and_then(|r| r.retry_at), Some(second));
}

#[tokio::test]
async fn subscribers_see_changes_only() {
    let mut t = StatusTracker::new();
    let mut rx = t.subscribe();
    let e = EndpointKey::client(5);

    t.apply(StatusEvent { endpoint: e, status: ConnectionStatus::Connecting, retry_at: None });
    t.apply(StatusEvent { endpoint: e, status: ConnectionStatus::Connecting, retry_at: None });
    t.apply(StatusEvent { endpoint: e, status: ConnectionStatus::Connected, retry_at: None });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.status, ConnectionStatus::Connecting);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.status, ConnectionStatus::Connected);
    assert_eq!(second.endpoint, e);
    assert!(rx.try_recv().is_err());
}
