use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::LifecycleError;
use crate::lease::{LeaseId, StackLease};
use crate::stack::ManagedStack;

/// Phase state machine for the stack lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Stack is not initialized.
    Idle,
    /// Stack is initialized. `owner` is the lease that will shut it down, or
    /// `None` once that lease was released while other leases remained.
    Active { owner: Option<LeaseId> },
}

/// Lifecycle manager for a single shared stack.
///
/// The first `acquire()` initializes the stack and hands out the owning
/// lease; later calls attach to the running stack and bump the user count.
/// Only the owning lease shuts the stack down, and only when it is the last
/// one released. Ownership is never transferred: if the owner is released
/// while other leases remain, the stack stays up after they are gone.
pub struct StackManager<M: RawMutex, S: ManagedStack> {
    stack: S,
    state: Mutex<M, RefCell<Phase>>,
    users: AtomicUsize,
    next_id: AtomicU32,
}

impl<M: RawMutex, S: ManagedStack> StackManager<M, S> {
    /// Create a new manager around a not-yet-initialized stack.
    pub const fn new(stack: S) -> Self {
        Self {
            stack,
            state: Mutex::new(RefCell::new(Phase::Idle)),
            users: AtomicUsize::new(0),
            next_id: AtomicU32::new(1),
        }
    }

    /// Acquire a lease on the stack.
    ///
    /// If the stack is not initialized it is brought up here and the returned
    /// lease is the owner. A failed initialization leaves the manager idle so
    /// the caller may retry.
    pub fn acquire(
        &self,
    ) -> Result<StackLease<'_, M, S>, LifecycleError<S::Error>> {
        self.state.lock(|state| {
            // Copy the phase out so a re-entrant stack callback during init
            // does not trip over an outstanding RefCell borrow.
            let phase = *state.borrow();

            match phase {
                Phase::Idle => {
                    self.stack.init().map_err(LifecycleError::InitFailed)?;

                    let id = self.next_lease_id();
                    self.users.store(1, Ordering::Release);
                    *state.borrow_mut() = Phase::Active { owner: Some(id) };
                    Ok(StackLease::new(self, id, true))
                }
                Phase::Active { .. } => {
                    let n = self.users.load(Ordering::Acquire);
                    let next =
                        n.checked_add(1).ok_or(LifecycleError::Exhausted)?;
                    self.users.store(next, Ordering::Release);
                    Ok(StackLease::new(self, self.next_lease_id(), false))
                }
            }
        })
    }

    /// Release protocol, run from `StackLease::drop`.
    pub(crate) fn release(&self, id: LeaseId, is_owner: bool) {
        self.state.lock(|state| {
            let remaining =
                self.users.load(Ordering::Acquire).saturating_sub(1);
            self.users.store(remaining, Ordering::Release);

            let Phase::Active { owner } = *state.borrow() else {
                return;
            };
            if !is_owner || owner != Some(id) {
                return;
            }

            if remaining == 0 {
                self.stack.shutdown();
                *state.borrow_mut() = Phase::Idle;
            } else {
                *state.borrow_mut() = Phase::Active { owner: None };
            }
        })
    }

    fn next_lease_id(&self) -> LeaseId {
        LeaseId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the managed stack regardless of its initialized state.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Returns the current number of live leases.
    pub fn user_count(&self) -> usize {
        self.users.load(Ordering::Relaxed)
    }

    /// Returns `true` while the stack is initialized.
    pub fn is_active(&self) -> bool {
        self.state
            .lock(|state| matches!(*state.borrow(), Phase::Active { .. }))
    }

    /// Returns the lease currently responsible for shutdown, if any.
    pub fn owner(&self) -> Option<LeaseId> {
        self.state.lock(|state| match *state.borrow() {
            Phase::Active { owner } => owner,
            Phase::Idle => None,
        })
    }
}
