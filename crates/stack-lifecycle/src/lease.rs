use core::ops::Deref;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::manager::StackManager;
use crate::stack::ManagedStack;

/// Identifies one lease for the lifetime of its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeaseId(pub(crate) u32);

impl LeaseId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// RAII lease on the shared stack.
///
/// Dropping a lease runs the release protocol: the user count is decremented
/// and, if this lease initialized the stack and no other lease remains, the
/// stack is shut down. Because release happens exactly once per lease in
/// `Drop`, a lease can never be released twice.
pub struct StackLease<'a, M: RawMutex, S: ManagedStack> {
    manager: &'a StackManager<M, S>,
    id: LeaseId,
    is_owner: bool,
}

impl<M: RawMutex, S: ManagedStack> Deref for StackLease<'_, M, S> {
    type Target = S;

    #[inline]
    fn deref(&self) -> &S {
        self.manager.stack()
    }
}

impl<M: RawMutex, S: ManagedStack> Drop for StackLease<'_, M, S> {
    fn drop(&mut self) {
        self.manager.release(self.id, self.is_owner);
    }
}

impl<'a, M: RawMutex, S: ManagedStack> StackLease<'a, M, S> {
    /// Create a new lease. Only called by `StackManager`.
    pub(crate) fn new(
        manager: &'a StackManager<M, S>,
        id: LeaseId,
        is_owner: bool,
    ) -> Self {
        Self { manager, id, is_owner }
    }

    pub fn id(&self) -> LeaseId {
        self.id
    }

    /// Whether this lease initialized the stack and is responsible for
    /// shutting it down.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Whether the stack this lease refers to is currently initialized.
    pub fn is_live(&self) -> bool {
        self.manager.is_active()
    }

    /// The manager this lease was acquired from.
    pub fn manager(&self) -> &'a StackManager<M, S> {
        self.manager
    }

    /// Explicitly release the lease. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}
