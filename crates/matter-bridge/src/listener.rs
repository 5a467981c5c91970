use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use matter_bridge_icd::{BridgeEvent, ListenerId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Destination for bridge events: an identity plus the sending half of an
/// unbounded channel. Sends never block.
#[derive(Debug, Clone)]
pub struct Listener {
    id: ListenerId,
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl Listener {
    pub fn new(id: ListenerId, tx: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { id, tx }
    }

    /// Creates a listener together with the receiver its events land in.
    pub fn channel(
        id: ListenerId,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Fire-and-forget send. If the receiver has gone away the event is
    /// lost; nothing tracks listener liveness.
    pub fn emit(&self, event: BridgeEvent) {
        let tag = event.tag();
        match self.tx.send(event) {
            Ok(()) => debug!(listener = %self.id, event = tag, "event emitted"),
            Err(_) => warn!(
                listener = %self.id,
                event = tag,
                "listener gone, event lost"
            ),
        }
    }
}

/// The single listener slot.
#[derive(Debug, Default)]
pub enum ListenerSlot {
    #[default]
    Vacant,
    Registered(Listener),
}

/// Holds at most one listener. The latest registration wins.
pub struct ListenerRegistry<M: RawMutex> {
    slot: Mutex<M, RefCell<ListenerSlot>>,
}

impl<M: RawMutex> ListenerRegistry<M> {
    pub const fn new() -> Self {
        Self { slot: Mutex::new(RefCell::new(ListenerSlot::Vacant)) }
    }

    /// Installs `listener`, returning the identity it displaced. The
    /// displaced listener is not told.
    pub fn register(&self, listener: Listener) -> Option<ListenerId> {
        let id = listener.id();
        let previous = self.slot.lock(|slot| {
            slot.replace(ListenerSlot::Registered(listener))
        });
        info!(listener = %id, "listener registered");

        match previous {
            ListenerSlot::Registered(old) => Some(old.id()),
            ListenerSlot::Vacant => None,
        }
    }

    pub fn lookup(&self) -> Option<ListenerId> {
        self.with_listener(Listener::id)
    }

    /// Runs `f` against the current listener under the registry lock.
    pub fn with_listener<R>(
        &self,
        f: impl FnOnce(&Listener) -> R,
    ) -> Option<R> {
        self.slot.lock(|slot| match &*slot.borrow() {
            ListenerSlot::Registered(listener) => Some(f(listener)),
            ListenerSlot::Vacant => None,
        })
    }
}

impl<M: RawMutex> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
