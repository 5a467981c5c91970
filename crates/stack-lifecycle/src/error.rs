/// Errors that can occur while acquiring a lease on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleError<E: core::fmt::Debug> {
    /// The stack rejected initialization. No state was changed.
    InitFailed(E),
    /// The user count cannot be incremented any further.
    Exhausted,
}
