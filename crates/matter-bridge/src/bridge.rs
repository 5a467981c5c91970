use core::ops::Deref;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use matter_bridge_icd::{AttributePath, AttributeType, ListenerId};
use stack_lifecycle::{ManagedStack, StackManager};
use tracing::{debug, info, warn};

use crate::commissioning::{NetworkCommissioning, StoredNetwork};
use crate::config::BridgeConfig;
use crate::error::{Result, StackError};
use crate::handle::DeviceHandle;
use crate::listener::ListenerRegistry;
use crate::notifier::AttributeNotifier;
use crate::stack::{CompletionToken, Platform, RequestResult, StackCallbacks};

/// Lock flavor shared by every piece of bridge state.
///
/// All critical sections in a process nest inside one global lock, so the
/// lifecycle, listener registry and pending requests form a single domain.
pub type DomainMutex = CriticalSectionRawMutex;

/// Platform wrapper that logs lifecycle transitions.
pub(crate) struct Traced<P>(P);

impl<P> Deref for Traced<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.0
    }
}

impl<P: Platform> ManagedStack for Traced<P> {
    type Error = StackError;

    fn init(&self) -> core::result::Result<(), StackError> {
        match self.0.init() {
            Ok(()) => {
                info!("device stack initialized");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "device stack failed to initialize");
                Err(e)
            }
        }
    }

    fn shutdown(&self) {
        self.0.shutdown();
        info!("device stack shut down");
    }
}

/// Process-wide bridge between one device stack, the handles sharing it,
/// and the listener receiving its events.
///
/// Typically placed in a `static` (or a `StaticCell`) so both caller threads
/// and the stack's own thread can reach it.
pub struct Bridge<P: Platform> {
    lifecycle: StackManager<DomainMutex, Traced<P>>,
    listeners: ListenerRegistry<DomainMutex>,
    network: NetworkCommissioning<DomainMutex>,
    config: BridgeConfig,
}

impl<P: Platform> Bridge<P> {
    pub const fn new(platform: P, config: BridgeConfig) -> Self {
        Self {
            lifecycle: StackManager::new(Traced(platform)),
            listeners: ListenerRegistry::new(),
            network: NetworkCommissioning::new(),
            config,
        }
    }

    /// Creates a handle. The first live handle initializes the stack and
    /// becomes its owner; later ones attach to the running stack.
    pub fn acquire(&self) -> Result<DeviceHandle<'_, P>> {
        let lease = self.lifecycle.acquire()?;
        debug!(
            lease = lease.id().get(),
            owner = lease.is_owner(),
            users = self.lifecycle.user_count(),
            "handle acquired"
        );
        Ok(DeviceHandle::new(self, lease))
    }

    pub fn platform(&self) -> &P {
        &self.lifecycle.stack().0
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Number of live handles.
    pub fn ref_count(&self) -> usize {
        self.lifecycle.user_count()
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listeners.lookup()
    }

    pub fn stored_network(&self) -> Option<StoredNetwork> {
        self.network.stored_network()
    }

    pub fn network_count(&self) -> usize {
        self.network.network_count()
    }

    pub fn is_scan_pending(&self) -> bool {
        self.network.is_scan_pending()
    }

    pub fn is_connect_pending(&self) -> bool {
        self.network.is_connect_pending()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn scan_timeout_secs(&self) -> u8 {
        self.config.scan_timeout_secs
    }

    pub fn connect_timeout_secs(&self) -> u8 {
        self.config.connect_timeout_secs
    }

    pub fn max_networks(&self) -> u8 {
        self.config.max_networks
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry<DomainMutex> {
        &self.listeners
    }

    pub(crate) fn network(&self) -> &NetworkCommissioning<DomainMutex> {
        &self.network
    }
}

impl<P: Platform> StackCallbacks for Bridge<P> {
    fn on_scan_requested(&self, token: CompletionToken) -> RequestResult {
        self.network.request_scan(&self.listeners, token)
    }

    fn on_connect_requested(
        &self,
        token: CompletionToken,
        ssid: &[u8],
    ) -> RequestResult {
        self.network.request_connect(&self.listeners, token, ssid)
    }

    fn on_network_added(&self, ssid: &[u8], credentials: &[u8]) {
        self.network.store_network(&self.listeners, ssid, credentials)
    }

    fn on_attribute_changed(
        &self,
        path: AttributePath,
        ty: AttributeType,
        raw: &[u8],
    ) {
        AttributeNotifier::notify(&self.listeners, path, ty, raw);
    }
}
