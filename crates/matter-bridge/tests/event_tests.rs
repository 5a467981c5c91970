use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use matter_bridge::icd::{
    AttributePath, AttributeType, AttributeValue, BridgeEvent, ListenerId,
};
use matter_bridge::{
    Bridge, BridgeConfig, BridgeError, CompletionToken, Listener,
    NetworkStatus, SimulatedStack, StackCallbacks,
};
use tokio::sync::mpsc::error::TryRecvError;

fn make_bridge() -> Bridge<SimulatedStack> {
    Bridge::new(SimulatedStack::new(), BridgeConfig::default())
}

/// Token that records every status it is completed with.
fn recording_token(log: &Arc<Mutex<Vec<NetworkStatus>>>) -> CompletionToken {
    let log = log.clone();
    CompletionToken::new(move |status| log.lock().unwrap().push(status))
}

fn counting_token(hits: &Arc<AtomicUsize>) -> CompletionToken {
    let hits = hits.clone();
    CompletionToken::new(move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

#[test]
fn registration_displaces_previous_listener() {
    let bridge = make_bridge();
    let a = bridge.acquire().unwrap();
    let b = bridge.acquire().unwrap();

    let (first, mut first_rx) = Listener::channel(ListenerId(1));
    let (second, mut second_rx) = Listener::channel(ListenerId(2));

    assert_eq!(a.register_listener(first), None);
    assert_eq!(b.register_listener(second), Some(ListenerId(1)));
    assert_eq!(bridge.listener(), Some(ListenerId(2)));

    // The displaced handle keeps its flag; liveness is not tracked.
    assert!(a.has_listener());
    assert!(b.has_listener());

    let path = AttributePath::new(1, 6, 0);
    bridge.on_attribute_changed(path, AttributeType::BOOLEAN, &[1]);

    assert_eq!(first_rx.try_recv(), Err(TryRecvError::Empty));
    assert!(matches!(
        second_rx.try_recv(),
        Ok(BridgeEvent::AttributeChanged(_))
    ));

    // The displaced channel only closes once its registering handle goes.
    drop(a);
    assert_eq!(first_rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn listener_survives_registering_handle() {
    let bridge = make_bridge();
    let owner = bridge.acquire().unwrap();
    let guest = bridge.acquire().unwrap();

    let (listener, mut rx) = Listener::channel(ListenerId(5));
    guest.register_listener(listener);
    drop(guest);

    bridge.on_attribute_changed(
        AttributePath::new(1, 8, 0),
        AttributeType::INT8U,
        &[42],
    );
    let Ok(BridgeEvent::AttributeChanged(report)) = rx.try_recv() else {
        panic!("expected attribute_changed");
    };
    assert_eq!(report.value, AttributeValue::U8(42));
    drop(owner);
}

#[test]
fn dead_listener_loses_events_quietly() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);
    drop(rx);

    let hits = Arc::new(AtomicUsize::new(0));
    // Still accepted: the bridge cannot tell the listener is gone.
    bridge.on_scan_requested(counting_token(&hits)).unwrap();
    assert!(bridge.is_scan_pending());
}

// ---------------------------------------------------------------------------
// Attribute notifications
// ---------------------------------------------------------------------------

#[test]
fn attribute_change_without_listener_is_dropped() {
    let bridge = make_bridge();
    bridge.on_attribute_changed(
        AttributePath::new(1, 6, 0),
        AttributeType::BOOLEAN,
        &[1],
    );
    assert_eq!(bridge.listener(), None);
}

#[test]
fn attribute_change_decodes_unaligned_int16() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let storage = [0u8, 0xCD, 0xAB];
    let path = AttributePath::new(2, 0x0008, 0x0011);
    bridge.on_attribute_changed(path, AttributeType::INT16U, &storage[1..]);

    let Ok(BridgeEvent::AttributeChanged(report)) = rx.try_recv() else {
        panic!("expected attribute_changed");
    };
    assert_eq!(report.path, path);
    assert_eq!(report.type_tag, AttributeType::INT16U);
    assert_eq!(report.value, AttributeValue::U16(0xABCD));
}

// ---------------------------------------------------------------------------
// Network commissioning
// ---------------------------------------------------------------------------

#[test]
fn scan_requires_listener() {
    let bridge = make_bridge();
    let hits = Arc::new(AtomicUsize::new(0));

    let Err((err, token)) = bridge.on_scan_requested(counting_token(&hits))
    else {
        panic!("scan accepted without listener");
    };
    assert_eq!(err, BridgeError::NoListener);
    assert!(!bridge.is_scan_pending());
    drop(token);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn second_scan_abandons_first_token() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    bridge.on_scan_requested(counting_token(&first)).unwrap();
    bridge.on_scan_requested(counting_token(&second)).unwrap();

    for _ in 0..2 {
        assert_eq!(
            rx.try_recv(),
            Ok(BridgeEvent::ScanNetworks { filter: None })
        );
    }

    assert!(handle.report_wifi_scan_result(0));
    assert!(!handle.report_wifi_scan_result(0));

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert!(!bridge.is_scan_pending());
}

#[test]
fn scan_status_mapping() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, _rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let log = Arc::new(Mutex::new(Vec::new()));
    bridge.on_scan_requested(recording_token(&log)).unwrap();
    handle.report_wifi_scan_result(3);
    bridge.on_scan_requested(recording_token(&log)).unwrap();
    handle.report_wifi_scan_result(0);

    assert_eq!(
        *log.lock().unwrap(),
        [NetworkStatus::UnknownError, NetworkStatus::Success]
    );
}

#[test]
fn connect_carries_stored_credentials() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    bridge.on_network_added(b"home", b"first-secret");
    bridge.on_network_added(b"home", b"second-secret");
    assert_eq!(bridge.network_count(), 1);

    let Err((err, _token)) =
        bridge.on_connect_requested(counting_token(&hits), b"home")
    else {
        panic!("connect accepted without listener");
    };
    assert_eq!(err, BridgeError::NoListener);
    assert!(!bridge.is_connect_pending());

    let (listener, mut rx) = Listener::channel(ListenerId(7));
    handle.register_listener(listener);
    bridge.on_connect_requested(counting_token(&hits), b"home").unwrap();

    let Ok(BridgeEvent::ConnectNetwork { ssid, credentials }) = rx.try_recv()
    else {
        panic!("expected connect_network");
    };
    assert_eq!(ssid.as_slice(), b"home");
    assert_eq!(credentials.as_slice(), b"second-secret");
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    assert!(handle.report_wifi_connect_result(0));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn connect_without_stored_network_sends_empty_credentials() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let log = Arc::new(Mutex::new(Vec::new()));
    bridge.on_connect_requested(recording_token(&log), b"cafe").unwrap();

    let Ok(BridgeEvent::ConnectNetwork { credentials, .. }) = rx.try_recv()
    else {
        panic!("expected connect_network");
    };
    assert!(credentials.is_empty());

    handle.report_wifi_connect_result(-3);
    assert_eq!(*log.lock().unwrap(), [NetworkStatus::NetworkNotFound]);
}

#[test]
fn add_network_reports_full_values_but_stores_bounded_copy() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let ssid = vec![b's'; 40];
    let secret = vec![b'k'; 80];
    bridge.on_network_added(&ssid, &secret);

    assert_eq!(
        rx.try_recv(),
        Ok(BridgeEvent::AddNetwork {
            ssid: ssid.clone(),
            credentials: secret.clone(),
        })
    );

    let stored = bridge.stored_network().unwrap();
    assert_eq!(stored.ssid.as_slice(), &ssid[..32]);
    assert_eq!(stored.credentials.as_slice(), &secret[..64]);
}

#[test]
fn connect_passes_long_ssid_through() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(1));
    handle.register_listener(listener);

    let ssid = vec![b's'; 40];
    bridge.on_network_added(&ssid, b"secret");
    let hits = Arc::new(AtomicUsize::new(0));
    bridge.on_connect_requested(counting_token(&hits), &ssid).unwrap();

    assert!(matches!(rx.try_recv(), Ok(BridgeEvent::AddNetwork { .. })));
    let Ok(BridgeEvent::ConnectNetwork { ssid: sent, credentials }) =
        rx.try_recv()
    else {
        panic!("expected connect_network");
    };
    assert_eq!(sent, ssid);
    assert_eq!(credentials.as_slice(), b"secret");
    assert_eq!(bridge.stored_network().unwrap().ssid.len(), 32);
}

#[test]
fn result_without_pending_request_is_ignored() {
    let bridge = make_bridge();
    let handle = bridge.acquire().unwrap();

    assert!(!handle.report_wifi_connect_result(0));
    assert!(!handle.report_wifi_scan_result(0));
}

#[test]
fn advisory_timeouts_come_from_config() {
    let config =
        BridgeConfig::from_json(r#"{ "connect_timeout_secs": 45 }"#).unwrap();
    let bridge = Bridge::new(SimulatedStack::new(), config);

    assert_eq!(bridge.scan_timeout_secs(), 10);
    assert_eq!(bridge.connect_timeout_secs(), 45);
    assert_eq!(bridge.max_networks(), 1);
}

// ---------------------------------------------------------------------------
// Cross-thread flow
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stack_thread_round_trip() {
    let bridge: &'static Bridge<SimulatedStack> =
        Box::leak(Box::new(make_bridge()));
    let handle = bridge.acquire().unwrap();
    let (listener, mut rx) = Listener::channel(ListenerId(11));
    handle.register_listener(listener);

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let stack = tokio::task::spawn_blocking(move || {
        bridge.on_network_added(b"lab", b"pass");
        bridge
            .on_connect_requested(
                CompletionToken::new(move |status| {
                    let _ = done_tx.send(status);
                }),
                b"lab",
            )
            .unwrap();
        done_rx.recv_timeout(Duration::from_secs(5))
    });

    let added = rx.recv().await.unwrap();
    assert_eq!(added.tag(), "add_network");

    let BridgeEvent::ConnectNetwork { credentials, .. } =
        rx.recv().await.unwrap()
    else {
        panic!("expected connect_network");
    };
    assert_eq!(credentials.as_slice(), b"pass");
    assert!(handle.report_wifi_connect_result(0));

    let status = stack.await.unwrap().unwrap();
    assert_eq!(status, NetworkStatus::Success);
}
