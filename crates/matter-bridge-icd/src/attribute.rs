use serde::{Deserialize, Serialize};

/// ZCL attribute type tag as reported by the attribute store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeType(pub u8);

impl AttributeType {
    pub const BOOLEAN: Self = Self(0x10);
    pub const INT8U: Self = Self(0x20);
    pub const INT16U: Self = Self(0x21);
}

/// Concrete location of an attribute on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePath {
    pub endpoint: u16,
    pub cluster: u32,
    pub attribute: u32,
}

impl AttributePath {
    pub const fn new(endpoint: u16, cluster: u32, attribute: u32) -> Self {
        Self { endpoint, cluster, attribute }
    }
}

/// Decoded attribute value.
///
/// Only the types the bridge understands are decoded; everything else is
/// reported as [`AttributeValue::Unknown`] and the listener is expected to
/// query the attribute itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    Unknown,
}

impl AttributeValue {
    /// Decode raw attribute storage bytes according to `ty`.
    ///
    /// Multi-byte values are copied out of `raw` rather than reinterpreted in
    /// place, so unaligned input is fine. Input shorter than the type needs
    /// decodes to `Unknown`.
    pub fn decode(ty: AttributeType, raw: &[u8]) -> Self {
        match ty {
            AttributeType::BOOLEAN => match raw {
                [b, ..] => Self::Bool(*b != 0),
                [] => Self::Unknown,
            },
            AttributeType::INT8U => match raw {
                [b, ..] => Self::U8(*b),
                [] => Self::Unknown,
            },
            AttributeType::INT16U => match raw {
                [lo, hi, ..] => Self::U16(u16::from_le_bytes([*lo, *hi])),
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }

    /// Type tag and storage bytes for a write, or `None` for `Unknown`.
    pub fn encode(&self) -> Option<(AttributeType, heapless::Vec<u8, 2>)> {
        let mut buf = heapless::Vec::new();
        let ty = match *self {
            Self::Bool(v) => {
                let _ = buf.push(v as u8);
                AttributeType::BOOLEAN
            }
            Self::U8(v) => {
                let _ = buf.push(v);
                AttributeType::INT8U
            }
            Self::U16(v) => {
                let _ = buf.extend_from_slice(&v.to_le_bytes());
                AttributeType::INT16U
            }
            Self::Unknown => return None,
        };
        Some((ty, buf))
    }
}

/// Payload of an `attribute_changed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeReport {
    pub path: AttributePath,
    /// Raw type tag as reported by the stack, even when not decoded.
    pub type_tag: AttributeType,
    pub value: AttributeValue,
}
