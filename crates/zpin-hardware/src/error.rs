//! Error types for bus and matrix operations.
//!
//! Protocol, identity and validation failures come from `zpin-core` and are
//! wrapped unchanged. This module adds the failures that only exist once
//! threads and real pins are involved: bus contention, lock misuse and GPIO.

use zpin_core::Error as CoreError;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving the board bus or the switch matrix.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// A protocol, identity, validation or configuration failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The bus was not acquired within the bounded wait.
    #[error("Board busy: bus lock not acquired within {waited_ms}ms")]
    LockBusy { waited_ms: u64 },

    /// A bus operation was attempted by a thread that does not hold the lock.
    #[error("Bus operation attempted without holding the bus lock")]
    LockNotHeld,

    /// GPIO or SPI peripheral failure.
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    pub fn busy(waited_ms: u64) -> Self {
        Self::LockBusy { waited_ms }
    }

    pub fn gpio(message: impl Into<String>) -> Self {
        Self::Gpio {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns `true` when the caller should report "board busy" and move on.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::LockBusy { .. })
    }

    /// Returns `true` for failures of a single framed exchange with a board.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_protocol())
    }

    /// Returns `true` for identity failures that abort a driver attach.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_identity())
    }
}
