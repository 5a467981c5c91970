use matter_bridge_icd::{AttributePath, AttributeValue, ListenerId};
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use serde::Serialize;
use stack_lifecycle::{LeaseId, StackLease};
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, DomainMutex, Traced};
use crate::config::{DeviceInfo, Discriminator, SetupPin};
use crate::error::{BridgeError, Result};
use crate::listener::Listener;
use crate::stack::{NetworkStatus, Platform};
use crate::BRIDGE_VERSION;

/// Snapshot returned by [`DeviceHandle::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackInfo {
    pub initialized: bool,
    pub version: &'static str,
    pub is_owner: bool,
    pub has_listener: bool,
    /// Listener liveness is never tracked; always `false`.
    pub monitor_active: bool,
    pub ref_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupPayload {
    pub qr_code: String,
    pub manual_code: String,
}

/// A caller's lease on the shared device stack.
///
/// Dropping the handle releases it. If it is the handle that initialized the
/// stack and no other handle is alive, the stack is shut down.
pub struct DeviceHandle<'a, P: Platform> {
    bridge: &'a Bridge<P>,
    lease: StackLease<'a, DomainMutex, Traced<P>>,
    /// The last listener this handle registered. Its sender stays alive
    /// with the handle, so displacement never closes the channel.
    registered: Mutex<DomainMutex, RefCell<Option<Listener>>>,
}

fn endpoint_id(endpoint: u32) -> Result<u16> {
    u16::try_from(endpoint).map_err(|_| BridgeError::InvalidEndpoint)
}

impl<'a, P: Platform> DeviceHandle<'a, P> {
    pub(crate) fn new(
        bridge: &'a Bridge<P>,
        lease: StackLease<'a, DomainMutex, Traced<P>>,
    ) -> Self {
        Self { bridge, lease, registered: Mutex::new(RefCell::new(None)) }
    }

    pub fn bridge(&self) -> &'a Bridge<P> {
        self.bridge
    }

    pub fn lease_id(&self) -> LeaseId {
        self.lease.id()
    }

    /// Whether this handle brought the stack up and will shut it down.
    pub fn is_owner(&self) -> bool {
        self.lease.is_owner()
    }

    /// Whether this handle has ever registered a listener. Stays set after
    /// another handle displaces it.
    pub fn has_listener(&self) -> bool {
        self.registered.lock(|r| r.borrow().is_some())
    }

    /// Whether the handle has a live view of the stack.
    pub fn is_initialized(&self) -> bool {
        self.lease.is_live()
    }

    fn platform(&self) -> &P {
        self.bridge.platform()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BridgeError::NotInitialized)
        }
    }

    pub fn start(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.platform().start_server();
        info!(lease = self.lease.id().get(), "server started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.platform().stop_server();
        info!(lease = self.lease.id().get(), "server stopped");
        Ok(())
    }

    pub fn info(&self) -> StackInfo {
        StackInfo {
            initialized: self.is_initialized(),
            version: BRIDGE_VERSION,
            is_owner: self.is_owner(),
            has_listener: self.has_listener(),
            monitor_active: false,
            ref_count: self.bridge.ref_count(),
        }
    }

    /// Writes `value` to the attribute store. Only boolean, 8-bit and
    /// 16-bit unsigned values can be written.
    pub fn set_attribute(
        &self,
        endpoint: u32,
        cluster: u32,
        attribute: u32,
        value: AttributeValue,
    ) -> Result<()> {
        let path =
            AttributePath::new(endpoint_id(endpoint)?, cluster, attribute);
        let (ty, bytes) = value.encode().ok_or(BridgeError::InvalidArguments)?;

        self.platform()
            .write_attribute(path, ty, &bytes)
            .map_err(BridgeError::StoreFailed)
    }

    /// Reads an attribute. Types the bridge cannot decode come back as
    /// [`AttributeValue::Unknown`] rather than an error.
    pub fn get_attribute(
        &self,
        endpoint: u32,
        cluster: u32,
        attribute: u32,
    ) -> Result<AttributeValue> {
        let path =
            AttributePath::new(endpoint_id(endpoint)?, cluster, attribute);
        let (ty, raw) = self
            .platform()
            .read_attribute(path)
            .map_err(BridgeError::ReadFailed)?;

        Ok(AttributeValue::decode(ty, &raw))
    }

    pub fn open_commissioning_window(&self, timeout_secs: u32) -> Result<()> {
        let timeout = u16::try_from(timeout_secs)
            .map_err(|_| BridgeError::InvalidArguments)?;
        self.platform()
            .open_commissioning_window(timeout)
            .map_err(BridgeError::OpenWindowFailed)?;
        info!(timeout_secs = timeout, "commissioning window opened");
        Ok(())
    }

    pub fn setup_payload(&self) -> SetupPayload {
        let platform = self.platform();
        SetupPayload {
            qr_code: platform.qr_code(),
            manual_code: platform.manual_code(),
        }
    }

    /// Makes `listener` the destination of all bridge events, displacing any
    /// previous listener regardless of which handle registered it.
    pub fn register_listener(&self, listener: Listener) -> Option<ListenerId> {
        let kept = listener.clone();
        let displaced = self.bridge.listeners().register(listener);
        self.registered.lock(|r| *r.borrow_mut() = Some(kept));
        if let Some(old) = displaced {
            debug!(listener = %old, "previous listener displaced");
        }
        displaced
    }

    pub fn factory_reset(&self) {
        self.platform().schedule_factory_reset();
        info!("factory reset scheduled");
    }

    pub fn set_device_info(
        &self,
        vendor_id: u32,
        product_id: u32,
        software_version: u32,
        serial: &str,
    ) -> Result<()> {
        let info =
            DeviceInfo::new(vendor_id, product_id, software_version, serial)?;
        if info.serial_number.is_none() {
            warn!(len = serial.len(), "serial number not stored");
        }

        self.platform()
            .store_device_info(&info)
            .map_err(BridgeError::StoreFailed)
    }

    /// Stores the setup PIN and discriminator. Both are validated first and
    /// written in one store, so a failure leaves the previous pair intact.
    pub fn set_commissioning_info(
        &self,
        pin: u32,
        discriminator: u32,
    ) -> Result<()> {
        let pin = SetupPin::new(pin)?;
        let discriminator = Discriminator::new(discriminator)?;

        self.platform()
            .store_commissioning_info(pin, discriminator)
            .map_err(BridgeError::StoreFailed)
    }

    /// Completes a pending connect request. A report with nothing pending
    /// is ignored; returns whether a request was completed.
    pub fn report_wifi_connect_result(&self, status: i32) -> bool {
        self.bridge
            .network()
            .resolve_connect(NetworkStatus::from_connect_result(status))
    }

    /// Completes a pending scan request. A report with nothing pending is
    /// ignored; returns whether a request was completed.
    pub fn report_wifi_scan_result(&self, status: i32) -> bool {
        self.bridge
            .network()
            .resolve_scan(NetworkStatus::from_scan_result(status))
    }

    /// Releases the handle. Equivalent to dropping it.
    pub fn release(self) {
        debug!(
            lease = self.lease.id().get(),
            owner = self.lease.is_owner(),
            "releasing handle"
        );
        drop(self);
    }
}

impl<P: Platform> core::fmt::Debug for DeviceHandle<'_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("lease", &self.lease.id())
            .field("is_owner", &self.is_owner())
            .field("has_listener", &self.has_listener())
            .finish()
    }
}
