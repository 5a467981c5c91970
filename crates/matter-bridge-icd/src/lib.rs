#![cfg_attr(not(feature = "use-std"), no_std)]
//! Messages forwarded from the device stack to the registered listener.
extern crate alloc;

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

mod attribute;
pub use attribute::*;

// Constants
pub const MAX_SSID_LEN: usize = 32;
pub const MAX_CREDENTIALS_LEN: usize = 64;

/// SSID as held by the bridge, capped at [`MAX_SSID_LEN`] bytes.
pub type Ssid = heapless::Vec<u8, MAX_SSID_LEN>;
/// Network secret as held by the bridge, capped at [`MAX_CREDENTIALS_LEN`].
pub type Credentials = heapless::Vec<u8, MAX_CREDENTIALS_LEN>;

/// Identity of whoever consumes bridge events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl core::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Event emitted towards the listener, fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// The stack asked for a network scan. SSID filtering is not supported,
    /// so `filter` is always `None`.
    ScanNetworks { filter: Option<Ssid> },
    /// The stack asked to join a network. `ssid` is passed through as the
    /// stack gave it; `credentials` are the last stored ones.
    ConnectNetwork { ssid: Vec<u8>, credentials: Credentials },
    /// The stack added or updated a network. Carries the values exactly as
    /// reported, before they are truncated for storage.
    AddNetwork { ssid: Vec<u8>, credentials: Vec<u8> },
    /// A stack attribute changed.
    AttributeChanged(AttributeReport),
}

impl BridgeEvent {
    /// Short snake-case tag naming the event kind.
    pub fn tag(&self) -> &'static str {
        match self {
            BridgeEvent::ScanNetworks { .. } => "scan_networks",
            BridgeEvent::ConnectNetwork { .. } => "connect_network",
            BridgeEvent::AddNetwork { .. } => "add_network",
            BridgeEvent::AttributeChanged(_) => "attribute_changed",
        }
    }

    /// Encode for a listener living in another process.
    pub fn to_wire(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Copy `src` into a fixed-capacity buffer, dropping whatever does not fit.
///
/// Returns the buffer and whether anything was dropped.
pub fn truncate_into<const N: usize>(
    src: &[u8],
) -> (heapless::Vec<u8, N>, bool) {
    let len = src.len().min(N);
    let mut buf = heapless::Vec::new();
    // Cannot fail: `len <= N`.
    let _ = buf.extend_from_slice(&src[..len]);
    (buf, len < src.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_event_kinds() {
        let scan = BridgeEvent::ScanNetworks { filter: None };
        assert_eq!(scan.tag(), "scan_networks");

        let add = BridgeEvent::AddNetwork {
            ssid: b"home".to_vec(),
            credentials: b"secret".to_vec(),
        };
        assert_eq!(add.tag(), "add_network");
    }

    #[test]
    fn truncate_keeps_prefix() {
        let long = [7u8; 40];
        let (ssid, truncated): (Ssid, bool) = truncate_into(&long);
        assert!(truncated);
        assert_eq!(ssid.len(), MAX_SSID_LEN);

        let (ssid, truncated): (Ssid, bool) = truncate_into(b"home");
        assert!(!truncated);
        assert_eq!(ssid.as_slice(), b"home");
    }

    #[test]
    fn connect_event_survives_wire() {
        let (credentials, _) = truncate_into(b"hunter22");
        let event = BridgeEvent::ConnectNetwork {
            ssid: b"home".to_vec(),
            credentials,
        };

        let bytes = event.to_wire().unwrap();
        assert_eq!(BridgeEvent::from_wire(&bytes).unwrap(), event);
    }
}
