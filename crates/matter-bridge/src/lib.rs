//! Lifecycle and event bridge for a shared device commissioning stack.
//!
//! Many [`DeviceHandle`]s share one stack through a [`Bridge`]. Requests the
//! stack raises on its own thread (network scan, network connect, attribute
//! changes) are forwarded as [`icd::BridgeEvent`]s to the one registered
//! [`Listener`], and scan/connect results come back through the handles.

pub mod bridge;
pub mod commissioning;
pub mod config;
pub mod error;
pub mod handle;
pub mod listener;
pub mod notifier;
pub mod sim;
pub mod stack;
pub mod table;

pub use matter_bridge_icd as icd;

pub use bridge::{Bridge, DomainMutex};
pub use config::{BridgeConfig, DeviceInfo, Discriminator, SetupPin};
pub use error::{BridgeError, Result, StackError};
pub use handle::{DeviceHandle, SetupPayload, StackInfo};
pub use listener::{Listener, ListenerRegistry, ListenerSlot};
pub use sim::SimulatedStack;
pub use stack::{
    AttributeStore, CommissioningWindow, CompletionToken, DeviceStack,
    NetworkStatus, Pairing, Platform, RequestResult, StackCallbacks,
};
pub use table::{HandleId, HandleTable};

/// Version string reported by [`DeviceHandle::info`].
pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
