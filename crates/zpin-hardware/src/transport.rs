//! Raw access to the board bus.

use crate::Result;
use zpin_core::BoardSlot;

/// Physical side of the board bus: eight select lines and a byte pipe.
///
/// Implementations only move bytes. Framing, handshaking and the ownership
/// rules live in [`SerialCommandChannel`](crate::SerialCommandChannel), which
/// is the only caller.
///
/// Available implementations:
/// - [`PiBus`](crate::gpio::PiBus): GPIO selects and SPI on a Raspberry Pi
///   (feature `hardware-gpio`)
/// - [`SimulatedBus`](crate::mock::SimulatedBus): in-process Solenoid16 boards
/// - [`ConsoleTransport`](crate::mock::ConsoleTransport): an operator types
///   the board replies
pub trait BusTransport: Send {
    /// Assert the select line of `slot` and deassert the others, or deassert
    /// all of them for `None`.
    fn select(&mut self, slot: Option<BoardSlot>) -> Result<()>;

    /// Clock `bytes` out to the selected board.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Clock `len` bytes in from the selected board.
    fn read(&mut self, len: usize) -> Result<Vec<u8>>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn select(&mut self, slot: Option<BoardSlot>) -> Result<()> {
        (**self).select(slot)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).read(len)
    }
}
