use derive_more::{Display, Error};
use stack_lifecycle::LifecycleError;

pub type Result<T> = core::result::Result<T, BridgeError>;

/// Status code reported by the device stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Error)]
#[display("stack error {_0:#x}")]
pub struct StackError(#[error(not(source))] pub u32);

impl StackError {
    pub const INCORRECT_STATE: Self = Self(0x03);
    pub const NO_MEMORY: Self = Self(0x0B);
    pub const INVALID_ARGUMENT: Self = Self(0x2F);
    pub const UNSUPPORTED_ATTRIBUTE: Self = Self(0x86);
}

/// Failure returned by any caller-facing bridge operation.
///
/// A failed call leaves prior state unchanged; none of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum BridgeError {
    #[display("resource allocation failed")]
    AllocationFailure,
    #[display("reference does not resolve to a live handle")]
    InvalidHandle,
    #[display("stack is not initialized")]
    NotInitialized,
    #[display("invalid arguments")]
    InvalidArguments,
    #[display("endpoint id out of range")]
    InvalidEndpoint,
    #[display("setup pin out of range")]
    InvalidPin,
    #[display("discriminator out of range")]
    InvalidDiscriminator,
    #[display("stack initialization failed: {_0}")]
    StackInit(StackError),
    #[display("storing configuration failed: {_0}")]
    StoreFailed(StackError),
    #[display("opening commissioning window failed: {_0}")]
    OpenWindowFailed(StackError),
    #[display("attribute read failed: {_0}")]
    ReadFailed(StackError),
    #[display("no listener registered")]
    NoListener,
}

impl BridgeError {
    /// Stable snake-case reason for host boundaries that only carry a tag.
    pub fn reason(&self) -> &'static str {
        match self {
            BridgeError::AllocationFailure => "alloc_failed",
            BridgeError::InvalidHandle => "invalid_context",
            BridgeError::NotInitialized => "not_initialized",
            BridgeError::InvalidArguments => "invalid_args",
            BridgeError::InvalidEndpoint => "invalid_endpoint_id",
            BridgeError::InvalidPin => "invalid_pin",
            BridgeError::InvalidDiscriminator => "invalid_discriminator",
            BridgeError::StackInit(_) => "chip_init_failed",
            BridgeError::StoreFailed(_) => "store_failed",
            BridgeError::OpenWindowFailed(_) => "open_window_failed",
            BridgeError::ReadFailed(_) => "read_failed",
            BridgeError::NoListener => "no_listener",
        }
    }
}

impl From<LifecycleError<StackError>> for BridgeError {
    fn from(value: LifecycleError<StackError>) -> Self {
        match value {
            LifecycleError::InitFailed(e) => Self::StackInit(e),
            LifecycleError::Exhausted => Self::AllocationFailure,
        }
    }
}
