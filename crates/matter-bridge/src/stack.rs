//! Collaborator interfaces of the device stack.
//!
//! The bridge never implements commissioning, attribute encoding or setup
//! payload generation itself; it drives a [`Platform`] through these traits
//! and receives the stack's own requests through [`StackCallbacks`].

use core::fmt;

use matter_bridge_icd::{AttributePath, AttributeType};
use stack_lifecycle::ManagedStack;

use crate::config::{DeviceInfo, Discriminator, SetupPin};
use crate::error::{BridgeError, StackError};

/// Raw attribute storage bytes as returned by a read.
pub type RawAttribute = heapless::Vec<u8, 8>;

/// Server side of the device stack.
pub trait DeviceStack: ManagedStack<Error = StackError> {
    fn start_server(&self);
    fn stop_server(&self);
    /// Schedules a factory reset; the stack performs it asynchronously.
    fn schedule_factory_reset(&self);
    fn store_device_info(&self, info: &DeviceInfo) -> Result<(), StackError>;
    /// Stores the PIN and discriminator together: either both are written
    /// or neither is.
    fn store_commissioning_info(
        &self,
        pin: SetupPin,
        discriminator: Discriminator,
    ) -> Result<(), StackError>;
}

/// Narrow read/write view of the stack's attribute storage.
pub trait AttributeStore {
    fn write_attribute(
        &self,
        path: AttributePath,
        ty: AttributeType,
        bytes: &[u8],
    ) -> Result<(), StackError>;

    fn read_attribute(
        &self,
        path: AttributePath,
    ) -> Result<(AttributeType, RawAttribute), StackError>;
}

pub trait Pairing {
    fn qr_code(&self) -> String;
    fn manual_code(&self) -> String;
}

pub trait CommissioningWindow {
    fn open_commissioning_window(
        &self,
        timeout_secs: u16,
    ) -> Result<(), StackError>;
}

/// Everything the bridge needs from the stack, shareable across threads.
pub trait Platform:
    DeviceStack + AttributeStore + Pairing + CommissioningWindow + Send + Sync
{
}

impl<T> Platform for T where
    T: DeviceStack
        + AttributeStore
        + Pairing
        + CommissioningWindow
        + Send
        + Sync
{
}

/// Outcome handed back to the stack when a scan or connect resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Success,
    NetworkNotFound,
    UnknownError,
}

impl NetworkStatus {
    /// Maps a host-reported connect result: zero is success.
    pub fn from_connect_result(status: i32) -> Self {
        match status {
            0 => Self::Success,
            _ => Self::NetworkNotFound,
        }
    }

    /// Maps a host-reported scan result: zero is success.
    pub fn from_scan_result(status: i32) -> Self {
        match status {
            0 => Self::Success,
            _ => Self::UnknownError,
        }
    }
}

/// Opaque completion handle supplied by the stack with a scan or connect
/// request. Consumed by [`CompletionToken::complete`]; dropping it without
/// completing abandons the request.
pub struct CompletionToken(Box<dyn FnOnce(NetworkStatus) + Send>);

impl CompletionToken {
    pub fn new(f: impl FnOnce(NetworkStatus) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn complete(self, status: NetworkStatus) {
        (self.0)(status)
    }
}

impl fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionToken")
    }
}

/// Result of a stack-initiated request. A rejected request hands the token
/// back so the stack can fail it on its own terms.
pub type RequestResult = Result<(), (BridgeError, CompletionToken)>;

/// Entry points the stack calls from its own execution context.
pub trait StackCallbacks {
    fn on_scan_requested(&self, token: CompletionToken) -> RequestResult;

    fn on_connect_requested(
        &self,
        token: CompletionToken,
        ssid: &[u8],
    ) -> RequestResult;

    fn on_network_added(&self, ssid: &[u8], credentials: &[u8]);

    fn on_attribute_changed(
        &self,
        path: AttributePath,
        ty: AttributeType,
        raw: &[u8],
    );
}
