//! Shared vocabulary of the zpin hardware kernel.
//!
//! - [`constants`]: bytes and limits of the board bus, matrix defaults
//! - [`types`]: bounds-checked slot and channel handles, board identity,
//!   solenoid modes and switch addresses
//! - [`config`]: the machine description loaded at startup
//! - [`error`]: protocol, identity, validation and configuration failures

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{BoardConfig, BusConfig, BusMode, MachineConfig, MatrixConfig, SwitchConfig};
pub use error::{Error, Result};
pub use types::*;

/// Crate version, logged by the launcher at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
