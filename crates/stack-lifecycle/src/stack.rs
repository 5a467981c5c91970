/// Abstracts bringing a device stack up and down.
///
/// The stack object lives as long as its [`StackManager`](crate::StackManager);
/// only its initialized state changes over time.
pub trait ManagedStack {
    /// Error reported when the stack rejects startup.
    type Error: core::fmt::Debug;

    /// Bring the stack up. Called with the manager's lock held.
    fn init(&self) -> Result<(), Self::Error>;

    /// Tear the stack down. Called with the manager's lock held, at most once
    /// per successful [`init`](Self::init).
    ///
    /// The lock is the process-wide critical section when the manager uses
    /// `CriticalSectionRawMutex`. An implementation must not block on a
    /// thread that may itself be waiting for that lock (for example by
    /// joining an event thread that is delivering a callback), or the
    /// process deadlocks.
    fn shutdown(&self);
}
