//! Hardware control kernel for the zpin pinball controller.
//!
//! Two pieces of hardware hang off the controller:
//!
//! - the **board bus**, shared by up to eight satellite boards behind one
//!   select line each, and spoken to in framed commands;
//! - the **switch matrix**, scanned column by column on its own wiring.
//!
//! # Board Bus
//!
//! At most one party drives the bus at any instant. [`BusLock`] enforces
//! that; acquiring it yields a [`BusGuard`] through which the
//! [`SerialCommandChannel`] and the [`BoardSlotRegistry`] are reached:
//!
//! ```
//! use zpin_core::{BoardSlot, BoardType, BusConfig, SolenoidChannel};
//! use zpin_hardware::{BusLock, Result};
//! use zpin_hardware::mock::SimulatedBus;
//!
//! fn kick(lock: &BusLock, slot: BoardSlot) -> Result<()> {
//!     let mut guard = lock.acquire()?; // LockBusy -> "board busy"
//!     guard.with_solenoid16(slot, |board, channel| {
//!         board.fire_for(channel, SolenoidChannel::new(4)?, 50)
//!     })?;
//!     guard.release()
//! }
//!
//! let (bus, handle) = SimulatedBus::new();
//! let slot = BoardSlot::new(0).unwrap();
//! handle.add_solenoid16(slot);
//!
//! let lock = BusLock::new(bus, &BusConfig::default());
//! lock.acquire().unwrap().attach(slot, BoardType::Solenoid16, 2).unwrap();
//! kick(&lock, slot).unwrap();
//! ```
//!
//! # Switch Matrix
//!
//! [`SwitchMatrixScanner`](matrix::SwitchMatrixScanner) runs on a dedicated
//! thread, debounces every switch and queues stable transitions for the
//! command layer, which reads them through a
//! [`MatrixHandle`](matrix::MatrixHandle).
//!
//! # Backends
//!
//! - [`mock`]: simulated boards, an operator console and mock matrix pins
//! - `gpio`: Raspberry Pi GPIO and SPI (feature `hardware-gpio`)

pub mod board;
pub mod bus;
pub mod channel;
pub mod error;
#[cfg(feature = "hardware-gpio")]
pub mod gpio;
pub mod machine;
pub mod matrix;
pub mod mock;
pub mod solenoid;
pub mod transport;

pub use board::{BoardDriver, BoardSlotRegistry};
pub use bus::{BusGuard, BusLock};
pub use channel::SerialCommandChannel;
pub use error::{HardwareError, Result};
pub use machine::Machine;
pub use solenoid::Solenoid16;
pub use transport::BusTransport;
