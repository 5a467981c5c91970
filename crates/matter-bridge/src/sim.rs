//! In-memory device stack.
//!
//! Stands in for a real SDK: attributes live in a map, configuration writes
//! are recorded, and the setup payload is a fixed development code. Every
//! collaborator call is counted and most can be made to fail.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use matter_bridge_icd::{AttributePath, AttributeType};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use stack_lifecycle::ManagedStack;

use crate::config::{DeviceInfo, Discriminator, SetupPin};
use crate::error::StackError;
use crate::stack::{
    AttributeStore, CommissioningWindow, DeviceStack, Pairing, RawAttribute,
};

pub const DEV_QR_CODE: &str = "MT:Y.K9042C00KA0648G00";
pub const DEV_MANUAL_CODE: &str = "34970112332";

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Counters {
    inits: AtomicUsize,
    shutdowns: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    factory_resets: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    init: AtomicBool,
    store: AtomicBool,
    read: AtomicBool,
    window: AtomicBool,
}

#[derive(Debug, Default, Clone)]
struct Config {
    device_info: Option<DeviceInfo>,
    setup_pin: Option<SetupPin>,
    discriminator: Option<Discriminator>,
    window_timeout: Option<u16>,
}

#[derive(Default)]
pub struct SimulatedStack {
    counters: Counters,
    faults: Faults,
    running: AtomicBool,
    attributes: Mutex<HashMap<AttributePath, (AttributeType, RawAttribute)>>,
    config: Mutex<Config>,
}

impl SimulatedStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_init(&self, fail: bool) {
        self.faults.init.store(fail, Ordering::Relaxed);
    }

    pub fn fail_stores(&self, fail: bool) {
        self.faults.store.store(fail, Ordering::Relaxed);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.read.store(fail, Ordering::Relaxed);
    }

    pub fn fail_window(&self, fail: bool) {
        self.faults.window.store(fail, Ordering::Relaxed);
    }

    /// Seeds raw attribute storage, bypassing type checks.
    pub fn insert_raw(
        &self,
        path: AttributePath,
        ty: AttributeType,
        raw: &[u8],
    ) {
        let mut bytes = RawAttribute::new();
        let len = raw.len().min(bytes.capacity());
        let _ = bytes.extend_from_slice(&raw[..len]);
        locked(&self.attributes).insert(path, (ty, bytes));
    }

    pub fn init_count(&self) -> usize {
        self.counters.inits.load(Ordering::Relaxed)
    }

    pub fn shutdown_count(&self) -> usize {
        self.counters.shutdowns.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> usize {
        self.counters.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::Relaxed)
    }

    pub fn factory_reset_count(&self) -> usize {
        self.counters.factory_resets.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        locked(&self.config).device_info.clone()
    }

    pub fn setup_pin(&self) -> Option<SetupPin> {
        locked(&self.config).setup_pin
    }

    pub fn discriminator(&self) -> Option<Discriminator> {
        locked(&self.config).discriminator
    }

    pub fn window_timeout(&self) -> Option<u16> {
        locked(&self.config).window_timeout
    }

    fn check_store(&self) -> Result<(), StackError> {
        if self.faults.store.load(Ordering::Relaxed) {
            Err(StackError::NO_MEMORY)
        } else {
            Ok(())
        }
    }
}

impl ManagedStack for SimulatedStack {
    type Error = StackError;

    fn init(&self) -> Result<(), StackError> {
        if self.faults.init.load(Ordering::Relaxed) {
            return Err(StackError::INCORRECT_STATE);
        }
        self.counters.inits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.counters.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}

impl DeviceStack for SimulatedStack {
    fn start_server(&self) {
        self.running.store(true, Ordering::Relaxed);
        self.counters.starts.fetch_add(1, Ordering::Relaxed);
    }

    fn stop_server(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.counters.stops.fetch_add(1, Ordering::Relaxed);
    }

    fn schedule_factory_reset(&self) {
        self.counters.factory_resets.fetch_add(1, Ordering::Relaxed);
    }

    fn store_device_info(&self, info: &DeviceInfo) -> Result<(), StackError> {
        self.check_store()?;
        let mut config = locked(&self.config);
        // A missing serial keeps whatever was stored before.
        let serial_number = info
            .serial_number
            .clone()
            .or_else(|| {
                config.device_info.take().and_then(|d| d.serial_number)
            });
        config.device_info = Some(DeviceInfo { serial_number, ..info.clone() });
        Ok(())
    }

    fn store_commissioning_info(
        &self,
        pin: SetupPin,
        discriminator: Discriminator,
    ) -> Result<(), StackError> {
        self.check_store()?;
        let mut config = locked(&self.config);
        config.setup_pin = Some(pin);
        config.discriminator = Some(discriminator);
        Ok(())
    }
}

impl AttributeStore for SimulatedStack {
    fn write_attribute(
        &self,
        path: AttributePath,
        ty: AttributeType,
        bytes: &[u8],
    ) -> Result<(), StackError> {
        self.check_store()?;
        let raw = RawAttribute::from_slice(bytes)
            .map_err(|_| StackError::INVALID_ARGUMENT)?;
        locked(&self.attributes).insert(path, (ty, raw));
        Ok(())
    }

    fn read_attribute(
        &self,
        path: AttributePath,
    ) -> Result<(AttributeType, RawAttribute), StackError> {
        if self.faults.read.load(Ordering::Relaxed) {
            return Err(StackError::INCORRECT_STATE);
        }
        locked(&self.attributes)
            .get(&path)
            .cloned()
            .ok_or(StackError::UNSUPPORTED_ATTRIBUTE)
    }
}

impl Pairing for SimulatedStack {
    fn qr_code(&self) -> String {
        DEV_QR_CODE.to_owned()
    }

    fn manual_code(&self) -> String {
        DEV_MANUAL_CODE.to_owned()
    }
}

impl CommissioningWindow for SimulatedStack {
    fn open_commissioning_window(
        &self,
        timeout_secs: u16,
    ) -> Result<(), StackError> {
        if self.faults.window.load(Ordering::Relaxed) {
            return Err(StackError::INCORRECT_STATE);
        }
        locked(&self.config).window_timeout = Some(timeout_secs);
        Ok(())
    }
}
