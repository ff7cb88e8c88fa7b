use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Sent wrong length command ({sent}), board wanted {wanted}")]
    LengthMismatch { sent: usize, wanted: u8 },

    #[error("Checksum fail reported by board")]
    BoardChecksumFailure,

    #[error("Checksum fail, input {received:#04x} != {computed:#04x} for bytes {payload:?}")]
    ReplyChecksumFailure {
        received: u8,
        computed: u8,
        payload: Vec<u8>,
    },

    #[error("Timeout waiting for board after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("Got wrong message length back: expected {expected}, got {actual}")]
    WrongReplyLength { expected: usize, actual: usize },

    #[error("Command payload of {len} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    // Identity errors
    #[error("Board type {type_id} returned by board {slot} is not valid")]
    UnknownBoardType { slot: u8, type_id: u8 },

    #[error("Wrong board type at slot {slot}: expected {expected}, found {actual}")]
    WrongBoardType {
        slot: u8,
        expected: String,
        actual: String,
    },

    #[error("Wrong api revision at slot {slot}: expected {expected}, found {actual}")]
    WrongApiRevision { slot: u8, expected: u8, actual: u8 },

    #[error("Board slot {0} has no identified board")]
    SlotNotIdentified(u8),

    // Validation errors
    #[error("Board slot must be 0-7, got {0}")]
    InvalidSlot(i32),

    #[error("Solenoid channel must be 0-15, got {0}")]
    InvalidChannel(i32),

    #[error("Switch {row},{col} is outside the matrix")]
    InvalidSwitch { row: usize, col: usize },

    #[error("Unknown solenoid mode: {0}")]
    InvalidSolenoidMode(u8),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for failures of a single framed exchange.
    ///
    /// These are never retried by the channel; the caller decides.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::LengthMismatch { .. }
                | Self::BoardChecksumFailure
                | Self::ReplyChecksumFailure { .. }
                | Self::Timeout { .. }
                | Self::WrongReplyLength { .. }
                | Self::PayloadTooLong { .. }
                | Self::MalformedFrame { .. }
        )
    }

    /// Returns `true` for identity failures that are fatal to driver attach.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            Self::UnknownBoardType { .. }
                | Self::WrongBoardType { .. }
                | Self::WrongApiRevision { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
