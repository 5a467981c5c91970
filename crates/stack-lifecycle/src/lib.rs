#![no_std]
//! Reference-counted lifecycle manager for one shared device stack.
//!
//! The stack is initialized by the first [`StackManager::acquire`] and shut
//! down when the lease that initialized it is released last. Every state
//! transition runs under the manager's blocking mutex; with a
//! `CriticalSectionRawMutex` all managers in a process share a single lock
//! domain.

mod error;
mod lease;
mod manager;
mod stack;

pub use error::LifecycleError;
pub use lease::{LeaseId, StackLease};
pub use manager::StackManager;
pub use stack::ManagedStack;
