use core::cell::RefCell;
use core::mem;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use matter_bridge_icd::{truncate_into, BridgeEvent, Credentials, Ssid};
use tracing::{debug, trace, warn};

use crate::error::BridgeError;
use crate::listener::ListenerRegistry;
use crate::stack::{CompletionToken, NetworkStatus, RequestResult};

/// Scan or connect: the two request kinds that wait for a host result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Scan,
    Connect,
}

#[derive(Debug, Default)]
enum Pending {
    #[default]
    Idle,
    Waiting(CompletionToken),
}

impl Pending {
    fn is_waiting(&self) -> bool {
        matches!(self, Pending::Waiting(_))
    }
}

/// The one network entry the bridge remembers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredNetwork {
    pub ssid: Ssid,
    pub credentials: Credentials,
}

#[derive(Debug, Default)]
struct State {
    scan: Pending,
    connect: Pending,
    network: Option<StoredNetwork>,
}

impl State {
    fn slot(&mut self, kind: RequestKind) -> &mut Pending {
        match kind {
            RequestKind::Scan => &mut self.scan,
            RequestKind::Connect => &mut self.connect,
        }
    }
}

/// Turns the stack's scan/connect requests into listener events and holds
/// their completion tokens until the host reports a result.
///
/// At most one token of each kind is outstanding. A new request of the same
/// kind replaces the old token, which is dropped without being completed.
pub struct NetworkCommissioning<M: RawMutex> {
    state: Mutex<M, RefCell<State>>,
}

impl<M: RawMutex> NetworkCommissioning<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                scan: Pending::Idle,
                connect: Pending::Idle,
                network: None,
            })),
        }
    }

    pub fn request_scan(
        &self,
        listeners: &ListenerRegistry<M>,
        token: CompletionToken,
    ) -> RequestResult {
        self.request(listeners, RequestKind::Scan, token, |_| {
            BridgeEvent::ScanNetworks { filter: None }
        })
    }

    /// Emits `connect_network` with `ssid` as given and the credentials of
    /// the stored network, or empty credentials if none was stored.
    pub fn request_connect(
        &self,
        listeners: &ListenerRegistry<M>,
        token: CompletionToken,
        ssid: &[u8],
    ) -> RequestResult {
        self.request(listeners, RequestKind::Connect, token, |state| {
            let credentials = state
                .network
                .as_ref()
                .map(|n| n.credentials.clone())
                .unwrap_or_default();
            BridgeEvent::ConnectNetwork { ssid: ssid.to_vec(), credentials }
        })
    }

    fn request(
        &self,
        listeners: &ListenerRegistry<M>,
        kind: RequestKind,
        token: CompletionToken,
        event: impl FnOnce(&State) -> BridgeEvent,
    ) -> RequestResult {
        let abandoned = self.state.lock(|cell| {
            // Listener lookup, slot swap and emit share one lock domain.
            if listeners.lookup().is_none() {
                return Err((BridgeError::NoListener, token));
            }

            let mut state = cell.borrow_mut();
            let event = event(&*state);
            let previous =
                mem::replace(state.slot(kind), Pending::Waiting(token));
            listeners.with_listener(|listener| listener.emit(event));
            Ok(previous)
        })?;

        // Dropped outside the lock: the token may run arbitrary stack code.
        if let Pending::Waiting(old) = abandoned {
            warn!(?kind, "pending request replaced, previous token abandoned");
            drop(old);
        }
        Ok(())
    }

    /// Completes the pending scan, if any. Returns whether one was pending.
    pub fn resolve_scan(&self, status: NetworkStatus) -> bool {
        self.resolve(RequestKind::Scan, status)
    }

    /// Completes the pending connect, if any. Returns whether one was
    /// pending.
    pub fn resolve_connect(&self, status: NetworkStatus) -> bool {
        self.resolve(RequestKind::Connect, status)
    }

    fn resolve(&self, kind: RequestKind, status: NetworkStatus) -> bool {
        let pending = self
            .state
            .lock(|cell| mem::take(cell.borrow_mut().slot(kind)));

        match pending {
            Pending::Waiting(token) => {
                debug!(?kind, ?status, "resolving pending request");
                token.complete(status);
                true
            }
            Pending::Idle => {
                debug!(?kind, "no pending request to resolve");
                false
            }
        }
    }

    /// Records the stack's network configuration and tells the listener, if
    /// there is one.
    ///
    /// The stored copy is bounded by the SSID/credential buffers and anything
    /// beyond them is silently cut off. The emitted event carries the values
    /// as reported.
    pub fn store_network(
        &self,
        listeners: &ListenerRegistry<M>,
        ssid: &[u8],
        credentials: &[u8],
    ) {
        let (stored_ssid, ssid_cut) = truncate_into(ssid);
        let (stored_credentials, credentials_cut) = truncate_into(credentials);
        if ssid_cut || credentials_cut {
            warn!(
                ssid_len = ssid.len(),
                credentials_len = credentials.len(),
                "network entry truncated for storage"
            );
        }

        self.state.lock(|cell| {
            cell.borrow_mut().network = Some(StoredNetwork {
                ssid: stored_ssid,
                credentials: stored_credentials,
            });

            let sent = listeners.with_listener(|listener| {
                listener.emit(BridgeEvent::AddNetwork {
                    ssid: ssid.to_vec(),
                    credentials: credentials.to_vec(),
                })
            });
            if sent.is_none() {
                trace!("add_network dropped, no listener");
            }
        })
    }

    pub fn stored_network(&self) -> Option<StoredNetwork> {
        self.state.lock(|cell| cell.borrow().network.clone())
    }

    /// Number of stored networks, zero or one.
    pub fn network_count(&self) -> usize {
        self.state.lock(|cell| cell.borrow().network.is_some() as usize)
    }

    pub fn is_scan_pending(&self) -> bool {
        self.state.lock(|cell| cell.borrow().scan.is_waiting())
    }

    pub fn is_connect_pending(&self) -> bool {
        self.state.lock(|cell| cell.borrow().connect.is_waiting())
    }
}

impl<M: RawMutex> Default for NetworkCommissioning<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use matter_bridge_icd::ListenerId;

    use super::*;
    use crate::listener::Listener;

    fn counting_token(hits: &Arc<AtomicUsize>) -> CompletionToken {
        let hits = hits.clone();
        CompletionToken::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn scan_without_listener_returns_token() {
        let registry = ListenerRegistry::<NoopRawMutex>::new();
        let bridge = NetworkCommissioning::<NoopRawMutex>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let Err((err, token)) =
            bridge.request_scan(&registry, counting_token(&hits))
        else {
            panic!("scan accepted without a listener");
        };
        assert_eq!(err, BridgeError::NoListener);
        assert!(!bridge.is_scan_pending());

        token.complete(NetworkStatus::UnknownError);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_without_pending_is_noop() {
        let bridge = NetworkCommissioning::<NoopRawMutex>::new();
        assert!(!bridge.resolve_scan(NetworkStatus::Success));
        assert!(!bridge.resolve_connect(NetworkStatus::Success));
    }

    #[test]
    fn scan_and_connect_slots_are_independent() {
        let registry = ListenerRegistry::<NoopRawMutex>::new();
        let (listener, _rx) = Listener::channel(ListenerId(1));
        registry.register(listener);

        let bridge = NetworkCommissioning::<NoopRawMutex>::new();
        let scans = Arc::new(AtomicUsize::new(0));
        let connects = Arc::new(AtomicUsize::new(0));

        bridge.request_scan(&registry, counting_token(&scans)).unwrap();
        bridge
            .request_connect(&registry, counting_token(&connects), b"home")
            .unwrap();

        assert!(bridge.resolve_connect(NetworkStatus::Success));
        assert!(bridge.is_scan_pending());
        assert_eq!(scans.load(Ordering::SeqCst), 0);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn store_network_without_listener_still_stores() {
        let registry = ListenerRegistry::<NoopRawMutex>::new();
        let bridge = NetworkCommissioning::<NoopRawMutex>::new();

        bridge.store_network(&registry, &[b'a'; 40], &[b'k'; 70]);

        let stored = bridge.stored_network().unwrap();
        assert_eq!(stored.ssid.len(), matter_bridge_icd::MAX_SSID_LEN);
        assert_eq!(
            stored.credentials.len(),
            matter_bridge_icd::MAX_CREDENTIALS_LEN
        );
        assert_eq!(bridge.network_count(), 1);
    }
}
