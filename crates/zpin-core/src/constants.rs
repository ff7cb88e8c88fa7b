//! Core constants for the satellite board bus and the switch matrix.
//!
//! Every byte that crosses the board bus is defined here, together with the
//! table sizes and default timings used by the hardware layer.
//!
//! # Command Frame
//!
//! ```text
//! 'S' LEN PAYLOAD... SUM 'E'
//! ```
//!
//! Where:
//! - `'S'` - Start marker ([`START_BYTE`])
//! - `LEN` - Payload length, one byte
//! - `SUM` - 8-bit wraparound sum of the payload bytes
//! - `'E'` - End marker ([`END_BYTE`])
//!
//! # Response Stream
//!
//! After a frame is sent the host clocks single status bytes out of the
//! board until one of them is meaningful:
//!
//! | Byte  | Name                     | Follow-up                                  |
//! |-------|--------------------------|--------------------------------------------|
//! | `'R'` | [`STATUS_READY`]         | `N`, then `N` payload bytes and a checksum |
//! | `'L'` | [`STATUS_LENGTH_MISMATCH`] | one byte: the length the board wanted    |
//! | `'C'` | [`STATUS_CHECKSUM_FAIL`] | none                                       |
//!
//! Any other byte means the board is still busy.

// ============================================================================
// Command Framing
// ============================================================================

/// Start of frame marker.
pub const START_BYTE: u8 = b'S';

/// End of frame marker.
pub const END_BYTE: u8 = b'E';

/// Framing overhead in bytes (START, LEN, SUM, END).
pub const FRAME_OVERHEAD: usize = 4;

/// Largest payload a single frame can carry (the length field is one byte).
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

// ============================================================================
// Handshake Status Bytes
// ============================================================================

/// Board accepted the frame and is about to send its reply.
pub const STATUS_READY: u8 = b'R';

/// Board expected a different payload length; the wanted length follows.
pub const STATUS_LENGTH_MISMATCH: u8 = b'L';

/// Board computed a different checksum than the one sent.
pub const STATUS_CHECKSUM_FAIL: u8 = b'C';

// ============================================================================
// Board Identity
// ============================================================================

/// Command byte asking a board to identify itself.
///
/// The reply is exactly [`IDENTIFY_REPLY_LEN`] bytes:
///
/// ```text
/// byte 0: RRRT TTTT   (R = hardware revision, T = board type)
/// byte 1: API revision
/// ```
pub const IDENTIFY_COMMAND: u8 = 0b1111_1110;

/// Length of the identify reply.
pub const IDENTIFY_REPLY_LEN: usize = 2;

/// Mask selecting the board type bits of identify byte 0.
pub const BOARD_TYPE_MASK: u8 = 0b0001_1111;

/// Mask selecting the hardware revision bits of identify byte 0.
pub const HW_REVISION_MASK: u8 = 0b1111_0000;

/// API revision the Solenoid16 driver speaks.
pub const SOLENOID16_API_REVISION: u8 = 2;

// ============================================================================
// Bus Topology
// ============================================================================

/// Number of select lines on the board bus.
pub const MAX_BOARD_SLOTS: usize = 8;

/// Number of channels on a Solenoid16 board.
pub const SOLENOID16_CHANNELS: usize = 16;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Default time to wait for a READY status byte, in milliseconds.
///
/// Older board firmware answered within 10ms; current boards may take up to
/// 200ms while servicing a pulse, so the larger value is the default.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 200;

/// Default bounded wait for the bus lock, in milliseconds.
pub const DEFAULT_LOCK_WAIT_MS: u64 = 10;

/// Default SPI clock for the board bus.
pub const DEFAULT_SPI_CLOCK_HZ: u32 = 5_000_000;

// ============================================================================
// Switch Matrix
// ============================================================================

/// Rows in the switch matrix.
pub const DEFAULT_MATRIX_ROWS: usize = 8;

/// Real columns in the switch matrix (the power-detect column is extra).
pub const DEFAULT_MATRIX_COLUMNS: usize = 8;

/// Settle delay between driving a column and sampling its rows.
pub const DEFAULT_SETTLE_US: u64 = 50;

/// Settle delay for the first [`DEFAULT_SLOW_COLUMNS`] columns.
pub const DEFAULT_SLOW_SETTLE_US: u64 = 150;

/// Number of leading columns that need the longer settle delay.
pub const DEFAULT_SLOW_COLUMNS: usize = 2;

/// Default debounce threshold for both edges, in milliseconds.
pub const DEFAULT_MIN_SWITCH_TIME_MS: f64 = 1.0;

/// Bounded bus-lock wait used by the scanner's trigger path.
pub const DEFAULT_TRIGGER_WAIT_MS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bytes_are_distinct() {
        let bytes = [STATUS_READY, STATUS_LENGTH_MISMATCH, STATUS_CHECKSUM_FAIL];
        for (i, a) in bytes.iter().enumerate() {
            for b in &bytes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_identify_masks_cover_byte() {
        assert_eq!(BOARD_TYPE_MASK | HW_REVISION_MASK, 0xFF);
    }
}
