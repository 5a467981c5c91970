use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Maximum serial number length the stack accepts.
pub const MAX_SERIAL_LEN: usize = 31;

/// Advisory network commissioning parameters surfaced to the stack.
///
/// None of these are enforced by the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub scan_timeout_secs: u8,
    pub connect_timeout_secs: u8,
    pub max_networks: u8,
}

impl BridgeConfig {
    pub const DEFAULT: Self = Self {
        scan_timeout_secs: 10,
        connect_timeout_secs: 20,
        max_networks: 1,
    };

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Setup PIN code used during commissioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPin(u32);

impl SetupPin {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 99_999_998;

    pub fn new(pin: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&pin) {
            Ok(Self(pin))
        } else {
            Err(BridgeError::InvalidPin)
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// 12-bit commissioning discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discriminator(u16);

impl Discriminator {
    pub const MAX: u16 = 0x0FFF;

    pub fn new(value: u32) -> Result<Self> {
        match u16::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(BridgeError::InvalidDiscriminator),
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Device metadata written to the stack's configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub software_version: u32,
    /// `None` when the supplied serial was empty or longer than
    /// [`MAX_SERIAL_LEN`]; the stack keeps its previous serial in that case.
    pub serial_number: Option<heapless::String<MAX_SERIAL_LEN>>,
}

impl DeviceInfo {
    pub fn new(
        vendor_id: u32,
        product_id: u32,
        software_version: u32,
        serial: &str,
    ) -> Result<Self> {
        let vendor_id = u16::try_from(vendor_id)
            .map_err(|_| BridgeError::InvalidArguments)?;
        let product_id = u16::try_from(product_id)
            .map_err(|_| BridgeError::InvalidArguments)?;

        let serial_number = if serial.is_empty() {
            None
        } else {
            heapless::String::try_from(serial).ok()
        };

        Ok(Self { vendor_id, product_id, software_version, serial_number })
    }
}
