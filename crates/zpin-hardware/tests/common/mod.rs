//! Shared fixtures for the hardware integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use zpin_core::{
    BoardSlot, BoardType, BusConfig, MatrixConfig, SolenoidChannel, SwitchConfig,
    constants::SOLENOID16_API_REVISION,
};
use zpin_hardware::BusLock;
use zpin_hardware::matrix::{ManualClock, SwitchMatrixScanner};
use zpin_hardware::mock::{MockMatrix, MockMatrixHandle, SimulatedBus, SimulatedBusHandle};

/// Slot the fixtures put their Solenoid16 in.
pub const SOLENOID_SLOT: u8 = 3;

pub fn slot(index: u8) -> BoardSlot {
    BoardSlot::new(index).unwrap()
}

pub fn channel(index: u8) -> SolenoidChannel {
    SolenoidChannel::new(index).unwrap()
}

/// Bus settings with short timeouts so failure paths finish quickly.
pub fn fast_bus_config() -> BusConfig {
    BusConfig {
        handshake_timeout_ms: 20,
        lock_wait_ms: 20,
        ..BusConfig::default()
    }
}

/// A lock over a simulated bus with one Solenoid16 already attached.
pub fn attached_bus() -> (Arc<BusLock>, SimulatedBusHandle) {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(SOLENOID_SLOT));

    let lock = Arc::new(BusLock::new(bus, &fast_bus_config()));
    lock.acquire()
        .unwrap()
        .attach(slot(SOLENOID_SLOT), BoardType::Solenoid16, SOLENOID16_API_REVISION)
        .unwrap();
    handle.clear_commands();
    (lock, handle)
}

/// Small matrix without settle delays, power-detect in column 4.
pub fn quick_matrix() -> MatrixConfig {
    MatrixConfig {
        rows: 4,
        columns: 4,
        power_detect: true,
        power_row: 0,
        settle_us: 0,
        slow_settle_us: 0,
        slow_columns: 0,
        trigger_wait_ms: 5,
    }
}

pub struct ScannerFixture {
    pub scanner: SwitchMatrixScanner<MockMatrix>,
    pub pins: MockMatrixHandle,
    pub clock: ManualClock,
}

pub fn scanner_with(switches: &[SwitchConfig]) -> ScannerFixture {
    let (pins, pin_handle) = MockMatrix::new();
    let clock = ManualClock::new();
    let scanner =
        SwitchMatrixScanner::new(pins, quick_matrix(), switches, Arc::new(clock.clone())).unwrap();
    ScannerFixture {
        scanner,
        pins: pin_handle,
        clock,
    }
}
