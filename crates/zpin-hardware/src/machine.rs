//! Entry point tying the board bus and the switch matrix together.

use crate::matrix::{Clock, MatrixPins, ScannerHandle, SwitchMatrixScanner};
use crate::{BusLock, BusTransport, Result, SerialCommandChannel, Solenoid16};
use std::sync::Arc;
use tracing::info;
use zpin_core::{
    BoardIdentity, BoardSlot, BoardType, MachineConfig, constants::SOLENOID16_API_REVISION,
};

/// One pinball machine's hardware.
///
/// Built once at startup from a [`MachineConfig`] and a bus transport, then
/// shared (usually behind an `Arc`) by the command connections.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use zpin_core::{MachineConfig, SolenoidChannel};
/// use zpin_hardware::Machine;
/// use zpin_hardware::matrix::ManualClock;
/// use zpin_hardware::mock::{MockMatrix, SimulatedBus};
///
/// let config = MachineConfig::from_json_str(r#"{
///     "boards": [{ "slot": 0, "board_type": "s16" }]
/// }"#).unwrap();
///
/// let (bus, bus_handle) = SimulatedBus::new();
/// bus_handle.add_solenoid16(zpin_core::BoardSlot::new(0).unwrap());
///
/// let machine = Machine::new(config, bus);
/// machine.attach_boards().unwrap();
///
/// let (pins, _switches) = MockMatrix::new();
/// let scanner = machine.start_scanner(pins, Arc::new(ManualClock::new())).unwrap();
/// assert!(scanner.matrix().drain_events().is_empty());
/// scanner.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct Machine {
    config: MachineConfig,
    bus: Arc<BusLock>,
}

impl Machine {
    pub fn new(config: MachineConfig, transport: impl BusTransport + 'static) -> Self {
        let bus = Arc::new(BusLock::new(transport, &config.bus));
        Self { config, bus }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<BusLock> {
        &self.bus
    }

    /// Attach a driver to every configured board.
    ///
    /// Stops at the first board that fails; identity mismatches are fatal.
    pub fn attach_boards(&self) -> Result<Vec<(BoardSlot, BoardIdentity)>> {
        let mut guard = self.bus.acquire()?;
        let mut attached = Vec::with_capacity(self.config.boards.len());
        for board in &self.config.boards {
            let identity = guard.attach(board.slot, board.board_type, board.api_revision)?;
            attached.push((board.slot, identity));
        }
        guard.release()?;
        info!(boards = attached.len(), "boards attached");
        Ok(attached)
    }

    /// Attach a driver of `board_type` at `slot`, replacing the previous one.
    ///
    /// The expected API revision comes from the board's configuration entry
    /// when there is one.
    pub fn init_board(&self, slot: BoardSlot, board_type: BoardType) -> Result<BoardIdentity> {
        let api_revision = self
            .config
            .boards
            .iter()
            .find(|b| b.slot == slot && b.board_type == board_type)
            .map_or(SOLENOID16_API_REVISION, |b| b.api_revision);

        let mut guard = self.bus.acquire()?;
        let identity = guard.attach(slot, board_type, api_revision)?;
        guard.release()?;
        Ok(identity)
    }

    pub fn identify(&self, slot: BoardSlot) -> Result<BoardIdentity> {
        let mut guard = self.bus.acquire()?;
        let identity = guard.identify(slot)?;
        guard.release()?;
        Ok(identity)
    }

    /// Run `f` against the Solenoid16 at `slot` under the bus lock.
    ///
    /// Waits at most the configured lock wait; `LockBusy` means "board busy".
    pub fn with_solenoid16<T>(
        &self,
        slot: BoardSlot,
        f: impl FnOnce(&mut Solenoid16, &mut SerialCommandChannel) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.bus.acquire()?;
        let value = guard.with_solenoid16(slot, f)?;
        guard.release()?;
        Ok(value)
    }

    /// Build a scanner over `pins` with the configured switches and the
    /// trigger path wired to this machine's bus.
    pub fn scanner<P: MatrixPins>(
        &self,
        pins: P,
        clock: Arc<dyn Clock>,
    ) -> Result<SwitchMatrixScanner<P>> {
        Ok(SwitchMatrixScanner::new(
            pins,
            self.config.matrix.clone(),
            &self.config.switches,
            clock,
        )?
        .with_bus(Arc::clone(&self.bus)))
    }

    /// Build the scanner and run it on its own thread.
    pub fn start_scanner<P: MatrixPins + 'static>(
        &self,
        pins: P,
        clock: Arc<dyn Clock>,
    ) -> Result<ScannerHandle> {
        self.scanner(pins, clock)?.spawn()
    }
}
