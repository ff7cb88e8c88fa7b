//! Switch matrix scanning.
//!
//! The matrix has its own wiring, separate from the board bus: a shift
//! register drives one column at a time and every row return is sampled
//! while that column is active. An extra pseudo column after the real ones
//! carries the power-detect line.
//!
//! ```text
//!             col 0   col 1  ...  col 7   power
//!   row 0 ──── sw ──── sw ── ... ── sw ──── pwr
//!   row 1 ──── sw ──── sw ── ... ── sw
//!   ...
//! ```
//!
//! The scanner runs on its own thread, debounces every cell and queues the
//! stable transitions. Switches with a trigger target fire their solenoid
//! directly from the scanner thread.

mod clock;
mod events;
mod scanner;
mod states;
mod switch;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use events::EventQueue;
pub use scanner::{MatrixHandle, ScannerHandle, SwitchMatrixScanner};
pub use states::SwitchStates;
pub use switch::{Switch, SwitchEvent};

use crate::Result;

/// Column drive and row sampling for the switch matrix.
///
/// Implementations:
/// - [`PiMatrix`](crate::gpio::PiMatrix): shift register and GPIO returns
///   (feature `hardware-gpio`)
/// - [`MockMatrix`](crate::mock::MockMatrix): levels set by a test
pub trait MatrixPins: Send {
    /// Drive `column` active and every other column inactive.
    fn select_column(&mut self, column: usize) -> Result<()>;

    /// Whether `row` currently reads closed for the active column.
    fn read_row(&mut self, row: usize) -> Result<bool>;
}

impl<T: MatrixPins + ?Sized> MatrixPins for Box<T> {
    fn select_column(&mut self, column: usize) -> Result<()> {
        (**self).select_column(column)
    }

    fn read_row(&mut self, row: usize) -> Result<bool> {
        (**self).read_row(row)
    }
}
