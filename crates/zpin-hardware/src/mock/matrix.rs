//! Switch matrix pins controlled from a test.

use crate::matrix::MatrixPins;
use crate::{HardwareError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use zpin_core::SwitchAddress;

#[derive(Debug, Default)]
struct PinState {
    closed: HashSet<SwitchAddress>,
    failing_columns: HashSet<usize>,
    column_selects: usize,
}

/// Matrix pins whose switch levels are set through a [`MockMatrixHandle`].
///
/// # Examples
///
/// ```
/// use zpin_core::SwitchAddress;
/// use zpin_hardware::matrix::MatrixPins;
/// use zpin_hardware::mock::MockMatrix;
///
/// let (mut pins, handle) = MockMatrix::new();
/// handle.press(SwitchAddress::new(2, 3));
///
/// pins.select_column(3).unwrap();
/// assert!(pins.read_row(2).unwrap());
/// assert!(!pins.read_row(1).unwrap());
/// ```
#[derive(Debug)]
pub struct MockMatrix {
    state: Arc<Mutex<PinState>>,
    column: Option<usize>,
}

impl MockMatrix {
    pub fn new() -> (Self, MockMatrixHandle) {
        let state = Arc::new(Mutex::new(PinState::default()));
        let handle = MockMatrixHandle {
            state: Arc::clone(&state),
        };
        (
            Self {
                state,
                column: None,
            },
            handle,
        )
    }
}

impl MatrixPins for MockMatrix {
    fn select_column(&mut self, column: usize) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_columns.contains(&column) {
            self.column = None;
            return Err(HardwareError::gpio(format!("column {column} driver fault")));
        }
        state.column_selects += 1;
        self.column = Some(column);
        Ok(())
    }

    fn read_row(&mut self, row: usize) -> Result<bool> {
        let column = self
            .column
            .ok_or_else(|| HardwareError::gpio("no column driven"))?;
        Ok(self
            .state
            .lock()
            .closed
            .contains(&SwitchAddress::new(row, column)))
    }
}

/// Handle that sets switch levels of a [`MockMatrix`].
#[derive(Debug, Clone)]
pub struct MockMatrixHandle {
    state: Arc<Mutex<PinState>>,
}

impl MockMatrixHandle {
    pub fn set(&self, address: SwitchAddress, closed: bool) {
        let mut state = self.state.lock();
        if closed {
            state.closed.insert(address);
        } else {
            state.closed.remove(&address);
        }
    }

    pub fn press(&self, address: SwitchAddress) {
        self.set(address, true);
    }

    pub fn release(&self, address: SwitchAddress) {
        self.set(address, false);
    }

    /// Make driving `column` fail until [`restore_column`](Self::restore_column).
    pub fn fail_column(&self, column: usize) {
        self.state.lock().failing_columns.insert(column);
    }

    pub fn restore_column(&self, column: usize) {
        self.state.lock().failing_columns.remove(&column);
    }

    /// Successful column drives so far.
    pub fn column_selects(&self) -> usize {
        self.state.lock().column_selects
    }
}
