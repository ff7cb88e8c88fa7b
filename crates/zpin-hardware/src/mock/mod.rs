//! Simulated hardware for testing and development.
//!
//! These stand in for the board bus and the switch matrix pins without
//! physical hardware. Each simulated device comes with a handle that tests
//! use to steer and inspect it.

pub mod bus;
pub mod console;
pub mod matrix;

pub use bus::{Fault, LoggedCommand, SimulatedBoard, SimulatedBus, SimulatedBusHandle};
pub use console::{ConsoleTransport, parse_reply_line};
pub use matrix::{MockMatrix, MockMatrixHandle};
