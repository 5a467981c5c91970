use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicU32, Ordering};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::{Bridge, DomainMutex};
use crate::error::{BridgeError, Result};
use crate::handle::DeviceHandle;
use crate::stack::Platform;

/// Opaque reference to a handle held in a [`HandleTable`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub struct HandleId(u32);

impl HandleId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for HandleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

type Slots<'a, P, const N: usize> =
    heapless::Vec<(HandleId, Arc<DeviceHandle<'a, P>>), N>;

/// Id-addressed store of live handles for hosts that cannot hold a
/// `DeviceHandle` directly.
///
/// Ids are never reused. An id that was released, or never issued, fails
/// with [`BridgeError::InvalidHandle`].
pub struct HandleTable<'a, P: Platform, const N: usize> {
    bridge: &'a Bridge<P>,
    slots: Mutex<DomainMutex, RefCell<Slots<'a, P, N>>>,
    next_id: AtomicU32,
}

impl<'a, P: Platform, const N: usize> HandleTable<'a, P, N> {
    pub fn new(bridge: &'a Bridge<P>) -> Self {
        Self {
            bridge,
            slots: Mutex::new(RefCell::new(heapless::Vec::new())),
            next_id: AtomicU32::new(1),
        }
    }

    /// Acquires a new handle and stores it. Fails with
    /// [`BridgeError::AllocationFailure`] when the table is full, without
    /// touching the stack.
    pub fn create_handle(&self) -> Result<HandleId> {
        self.slots.lock(|slots| {
            if slots.borrow().is_full() {
                return Err(BridgeError::AllocationFailure);
            }

            let handle = self.bridge.acquire()?;
            let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
            slots
                .borrow_mut()
                .push((id, Arc::new(handle)))
                .map_err(|_| BridgeError::AllocationFailure)?;
            debug!(%id, "handle stored");
            Ok(id)
        })
    }

    /// Removes `id` from the table. The underlying handle is released once
    /// every outstanding clone from [`HandleTable::get`] is dropped.
    pub fn release(&self, id: HandleId) -> Result<()> {
        let removed = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let index = slots
                .iter()
                .position(|(slot_id, _)| *slot_id == id)
                .ok_or(BridgeError::InvalidHandle)?;
            Ok::<_, BridgeError>(slots.swap_remove(index))
        })?;

        debug!(%id, "handle removed");
        drop(removed);
        Ok(())
    }

    pub fn get(&self, id: HandleId) -> Result<Arc<DeviceHandle<'a, P>>> {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .find(|(slot_id, _)| *slot_id == id)
                .map(|(_, handle)| handle.clone())
                .ok_or(BridgeError::InvalidHandle)
        })
    }

    /// Runs `f` against the handle behind `id`, outside the table lock.
    pub fn with<R>(
        &self,
        id: HandleId,
        f: impl FnOnce(&DeviceHandle<'a, P>) -> Result<R>,
    ) -> Result<R> {
        let handle = self.get(id)?;
        f(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.lock(|slots| slots.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
