use crate::matrix::{Clock, EventQueue, MatrixPins, Switch, SwitchEvent, SwitchStates};
use crate::{BusLock, HardwareError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zpin_core::{
    Error as CoreError, MatrixConfig, SwitchAddress, SwitchConfig, TriggerTarget,
};

/// State the scanner publishes to the command layer.
#[derive(Debug)]
struct MatrixShared {
    events: EventQueue,
    states: RwLock<SwitchStates>,
    pending: Mutex<Vec<SwitchConfig>>,
}

/// The switch matrix scan loop.
///
/// Owns every [`Switch`]; the command layer only sees the published event
/// queue and state snapshot through a [`MatrixHandle`], and submits switch
/// reconfiguration that the scanner applies between passes.
///
/// The matrix pins are not guarded by the bus lock. The lock is only taken,
/// with a bounded wait, when a closing switch fires its trigger solenoid.
pub struct SwitchMatrixScanner<P> {
    pins: P,
    matrix: MatrixConfig,
    switches: Vec<Switch>,
    bus: Option<Arc<BusLock>>,
    shared: Arc<MatrixShared>,
    clock: Arc<dyn Clock>,
}

impl<P: MatrixPins> SwitchMatrixScanner<P> {
    /// Create one switch per matrix cell and apply `switches` on top.
    ///
    /// # Errors
    /// `Config` for a matrix that cannot be scanned, `InvalidSwitch` for a
    /// configured switch outside the matrix, or a config error for an
    /// invalid threshold or trigger.
    pub fn new(
        pins: P,
        matrix: MatrixConfig,
        switches: &[SwitchConfig],
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        matrix.validate()?;
        let columns = matrix.column_count();
        let mut cells: Vec<Switch> = (0..matrix.rows)
            .flat_map(|row| (0..columns).map(move |col| Switch::new(SwitchAddress::new(row, col))))
            .collect();

        for config in switches {
            let address = config.address();
            if !matrix.contains(address) {
                return Err(CoreError::InvalidSwitch {
                    row: address.row,
                    col: address.col,
                }
                .into());
            }
            cells[address.row * columns + address.col] = Switch::from_config(config)?;
        }

        let shared = Arc::new(MatrixShared {
            events: EventQueue::new(),
            states: RwLock::new(SwitchStates::new(matrix.rows, columns)),
            pending: Mutex::new(Vec::new()),
        });

        Ok(Self {
            pins,
            matrix,
            switches: cells,
            bus: None,
            shared,
            clock,
        })
    }

    /// Fire trigger solenoids through `bus`.
    ///
    /// Without a bus, trigger targets are ignored.
    pub fn with_bus(mut self, bus: Arc<BusLock>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn handle(&self) -> MatrixHandle {
        MatrixHandle {
            shared: Arc::clone(&self.shared),
            matrix: self.matrix.clone(),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn switch(&self, address: SwitchAddress) -> Option<&Switch> {
        self.index(address).map(|i| &self.switches[i])
    }

    fn index(&self, address: SwitchAddress) -> Option<usize> {
        let columns = self.matrix.column_count();
        (address.row < self.matrix.rows && address.col < columns)
            .then_some(address.row * columns + address.col)
    }

    /// Apply pending reconfiguration, then scan every column once.
    ///
    /// A failing column is logged and the pass goes on with the next one.
    pub fn scan_pass(&mut self) {
        self.apply_pending();
        for column in 0..self.matrix.column_count() {
            if let Err(e) = self.scan_column(column) {
                warn!(column, error = %e, "switch matrix scan step failed");
            }
        }
    }

    /// Drive `column`, wait for it to settle and sample its rows.
    pub fn scan_column(&mut self, column: usize) -> Result<()> {
        self.pins.select_column(column)?;

        let settle = self.matrix.settle_for(column);
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        let rows = if self.matrix.power_column() == Some(column) {
            self.matrix.power_row..self.matrix.power_row + 1
        } else {
            0..self.matrix.rows
        };

        for row in rows {
            let level = self.pins.read_row(row)?;
            let now = self.clock.now_ms();
            let address = SwitchAddress::new(row, column);
            let Some(switch) = self.index(address).and_then(|i| self.switches.get_mut(i)) else {
                return Err(CoreError::InvalidSwitch { row, col: column }.into());
            };
            if let Some(event) = switch.sample(level, now) {
                let trigger = switch.trigger();
                self.publish(event, trigger);
            }
        }

        Ok(())
    }

    fn publish(&mut self, event: SwitchEvent, trigger: Option<TriggerTarget>) {
        if event.state
            && let Some(target) = trigger
        {
            self.fire_trigger(event.address(), target);
        }

        debug!(%event, name = ?event.name, "switch event");
        self.shared.states.write().set(event.address(), event.state);
        self.shared.events.push(event);
    }

    fn fire_trigger(&self, address: SwitchAddress, target: TriggerTarget) {
        let Some(bus) = &self.bus else {
            return;
        };

        let fired = bus.try_acquire(self.matrix.trigger_wait()).and_then(|mut guard| {
            guard.with_solenoid16(target.slot, |board, channel| {
                board.fire(channel, target.channel)
            })
        });

        if let Err(e) = fired {
            warn!(
                switch = %address,
                slot = target.slot.as_u8(),
                channel = target.channel.as_u8(),
                error = %e,
                "trigger skipped"
            );
        }
    }

    fn apply_pending(&mut self) {
        let updates = std::mem::take(&mut *self.shared.pending.lock());
        for config in updates {
            let address = config.address();
            let Some(index) = self.index(address) else {
                warn!(switch = %address, "ignoring configuration outside the matrix");
                continue;
            };
            match self.switches[index].apply_config(&config) {
                Ok(()) => info!(switch = %address, "switch reconfigured"),
                Err(e) => warn!(switch = %address, error = %e, "switch reconfiguration failed"),
            }
        }
    }

    /// Scan until `token` is cancelled.
    pub fn run(mut self, token: &CancellationToken) {
        info!(
            rows = self.matrix.rows,
            columns = self.matrix.column_count(),
            "switch matrix scanner started"
        );
        while !token.is_cancelled() {
            self.scan_pass();
        }
        info!("switch matrix scanner stopped");
    }
}

impl<P: MatrixPins + 'static> SwitchMatrixScanner<P> {
    /// Run the scanner on a dedicated thread.
    pub fn spawn(self) -> Result<ScannerHandle> {
        self.spawn_with_token(CancellationToken::new())
    }

    /// Run the scanner on a dedicated thread that stops when `token`, or any
    /// parent of it, is cancelled.
    pub fn spawn_with_token(self, token: CancellationToken) -> Result<ScannerHandle> {
        let matrix = self.handle();
        let child = token.clone();
        let thread = thread::Builder::new()
            .name("zpin-scanner".to_string())
            .spawn(move || self.run(&child))?;

        Ok(ScannerHandle {
            token,
            thread: Some(thread),
            matrix,
        })
    }
}

/// Owner of a running scanner thread.
///
/// Dropping the handle stops the scanner and waits for it.
#[derive(Debug)]
pub struct ScannerHandle {
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
    matrix: MatrixHandle,
}

impl ScannerHandle {
    pub fn matrix(&self) -> &MatrixHandle {
        &self.matrix
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop the scanner and wait for its thread to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.token.cancel();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| HardwareError::other("switch matrix scanner thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "scanner did not stop cleanly");
        }
    }
}

/// Command-layer view of the switch matrix.
///
/// Cheap to clone; every clone sees the same queue and snapshot.
#[derive(Clone)]
pub struct MatrixHandle {
    shared: Arc<MatrixShared>,
    matrix: MatrixConfig,
    clock: Arc<dyn Clock>,
}

impl MatrixHandle {
    /// Take every queued event, oldest first.
    pub fn drain_events(&self) -> Vec<SwitchEvent> {
        self.shared.events.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.shared.events.len()
    }

    /// Snapshot of every debounced switch state.
    pub fn read_all_switch_states(&self) -> SwitchStates {
        self.shared.states.read().clone()
    }

    pub fn switch_state(&self, address: SwitchAddress) -> Option<bool> {
        self.shared.states.read().get(address)
    }

    /// Queue new settings for one switch; the scanner applies them before
    /// its next pass.
    ///
    /// # Errors
    /// `InvalidSwitch` outside the matrix, `Config` for negative or NaN
    /// times or an incomplete trigger.
    pub fn configure_switch(&self, config: SwitchConfig) -> Result<()> {
        let address = config.address();
        if !self.matrix.contains(address) {
            return Err(CoreError::InvalidSwitch {
                row: address.row,
                col: address.col,
            }
            .into());
        }
        config.check_times()?;
        config.trigger()?;

        self.shared.pending.lock().push(config);
        Ok(())
    }

    /// Scanner clock, in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.matrix
    }
}

impl std::fmt::Debug for MatrixHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixHandle")
            .field("pending_events", &self.pending_events())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ManualClock;
    use crate::mock::MockMatrix;

    fn quiet_matrix() -> MatrixConfig {
        MatrixConfig {
            settle_us: 0,
            slow_settle_us: 0,
            ..MatrixConfig::default()
        }
    }

    #[test]
    fn test_configured_switch_outside_matrix() {
        let (pins, _handle) = MockMatrix::new();
        let result = SwitchMatrixScanner::new(
            pins,
            quiet_matrix(),
            &[SwitchConfig::new(8, 0)],
            Arc::new(ManualClock::new()),
        );
        assert!(matches!(
            result,
            Err(HardwareError::Core(CoreError::InvalidSwitch { row: 8, col: 0 }))
        ));
    }

    #[test]
    fn test_power_row_outside_matrix_rejected() {
        let (pins, _handle) = MockMatrix::new();
        let matrix = MatrixConfig {
            power_row: 9,
            ..quiet_matrix()
        };
        let result = SwitchMatrixScanner::new(pins, matrix, &[], Arc::new(ManualClock::new()));
        assert!(matches!(
            result,
            Err(HardwareError::Core(CoreError::Config(_)))
        ));
    }

    #[test]
    fn test_nan_debounce_time_rejected() {
        let (pins, _handle) = MockMatrix::new();
        let switch = SwitchConfig::new(1, 1).with_times(f64::NAN, 1.0);
        let result =
            SwitchMatrixScanner::new(pins, quiet_matrix(), &[switch], Arc::new(ManualClock::new()));
        assert!(matches!(
            result,
            Err(HardwareError::Core(CoreError::Config(_)))
        ));

        let (pins, _handle) = MockMatrix::new();
        let scanner =
            SwitchMatrixScanner::new(pins, quiet_matrix(), &[], Arc::new(ManualClock::new()))
                .unwrap();
        let update = SwitchConfig::new(1, 1).with_times(1.0, f64::NAN);
        assert!(scanner.handle().configure_switch(update).is_err());
    }

    #[test]
    fn test_power_column_reads_only_power_row() {
        let (pins, handle) = MockMatrix::new();
        let clock = ManualClock::new();
        let power = SwitchConfig::new(0, 8).with_times(0.0, 0.0);
        let mut scanner =
            SwitchMatrixScanner::new(pins, quiet_matrix(), &[power], Arc::new(clock.clone()))
                .unwrap();

        handle.set(SwitchAddress::new(0, 8), true);
        handle.set(SwitchAddress::new(3, 8), true);
        scanner.scan_pass();

        let events = scanner.handle().drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].address(), SwitchAddress::new(0, 8));
    }

    #[test]
    fn test_pending_config_applied_before_pass() {
        let (pins, handle) = MockMatrix::new();
        let clock = ManualClock::new();
        let mut scanner =
            SwitchMatrixScanner::new(pins, quiet_matrix(), &[], Arc::new(clock.clone())).unwrap();
        let matrix = scanner.handle();

        matrix
            .configure_switch(SwitchConfig::new(1, 1).with_name("drain").with_times(0.0, 0.0))
            .unwrap();
        handle.set(SwitchAddress::new(1, 1), true);
        scanner.scan_pass();

        let events = matrix.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.as_deref(), Some("drain"));
        assert_eq!(scanner.switch(SwitchAddress::new(1, 1)).unwrap().name(), Some("drain"));
    }

    #[test]
    fn test_configure_switch_validation() {
        let (pins, _handle) = MockMatrix::new();
        let scanner =
            SwitchMatrixScanner::new(pins, quiet_matrix(), &[], Arc::new(ManualClock::new()))
                .unwrap();
        let matrix = scanner.handle();

        assert!(matrix.configure_switch(SwitchConfig::new(0, 9)).is_err());
        assert!(matrix.configure_switch(SwitchConfig::new(1, 8)).is_err());
        assert!(
            matrix
                .configure_switch(SwitchConfig::new(0, 0).with_times(-1.0, 0.0))
                .is_err()
        );
        assert!(matrix.configure_switch(SwitchConfig::new(0, 0)).is_ok());
    }
}
