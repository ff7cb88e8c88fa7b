//! Framed request/response exchange with the selected board.
//!
//! # Exchange
//!
//! ```text
//! controller                         board
//!     │  'S' LEN payload SUM 'E'       │
//!     │ ─────────────────────────────► │
//!     │  status byte (polled)          │
//!     │ ◄───────────────────────────── │   anything else: still busy
//!     │  'R' N payload.. SUM           │   'L' wanted-length
//!     │ ◄───────────────────────────── │   'C' checksum rejected
//! ```
//!
//! Nothing here retries. A failed exchange surfaces as an error and the
//! caller decides what to do next.

use crate::bus::LockOwner;
use crate::{BusTransport, HardwareError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use zpin_core::{BoardSlot, Error as CoreError};
use zpin_protocol::{CommandBuilder, CommandFrame, HandshakeStatus, verify_reply};

/// Sends framed commands to whichever board is selected.
///
/// A channel is only reachable through a [`BusGuard`](crate::BusGuard), and
/// every method re-checks that the calling thread is the one holding the
/// bus lock.
pub struct SerialCommandChannel {
    transport: Box<dyn BusTransport>,
    owner: Arc<LockOwner>,
    handshake_timeout: Duration,
    selected: Option<BoardSlot>,
}

impl SerialCommandChannel {
    pub(crate) fn new(
        transport: Box<dyn BusTransport>,
        owner: Arc<LockOwner>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            owner,
            handshake_timeout,
            selected: None,
        }
    }

    /// Board currently selected, if any.
    pub fn selected(&self) -> Option<BoardSlot> {
        self.selected
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Select one board, or none.
    ///
    /// Selecting a board deasserts the other seven select lines.
    pub fn select(&mut self, slot: Option<BoardSlot>) -> Result<()> {
        self.owner.assert_held()?;
        self.transport.select(slot)?;
        self.selected = slot;
        trace!(slot = ?slot.map(|s| s.as_u8()), "select");
        Ok(())
    }

    /// Run `f` with `slot` selected and deselect afterwards, also when `f`
    /// fails.
    pub fn with_selected<T>(
        &mut self,
        slot: BoardSlot,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.select(Some(slot))?;
        let result = f(self);
        let deselected = self.select(None);
        let value = result?;
        deselected?;
        Ok(value)
    }

    /// Frame `payload`, send it and return the board's reply payload.
    ///
    /// # Errors
    /// - `LengthMismatch` when the board reports it wanted another length
    /// - `BoardChecksumFailure` when the board rejects our checksum
    /// - `Timeout` when no READY arrives within the handshake timeout
    /// - `ReplyChecksumFailure` when the reply does not match its checksum
    pub fn send_command(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.owner.assert_held()?;

        let frame = CommandFrame::encode(payload)?;
        debug!(slot = ?self.selected.map(|s| s.as_u8()), ?payload, "send command");
        self.transport.write(frame.as_bytes())?;

        self.await_ready(payload.len())?;

        let count = self.read_byte()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let input = self.transport.read(usize::from(count) + 1)?;
        let reply = verify_reply(&input)?;
        debug!(?reply, "received reply");
        Ok(reply)
    }

    /// Like [`send_command`](Self::send_command), but the reply must be
    /// exactly `expected_len` bytes long.
    pub fn send_command_expect(&mut self, expected_len: usize, payload: &[u8]) -> Result<Vec<u8>> {
        let reply = self.send_command(payload)?;
        if reply.len() != expected_len {
            return Err(CoreError::WrongReplyLength {
                expected: expected_len,
                actual: reply.len(),
            }
            .into());
        }
        Ok(reply)
    }

    /// Send a command that must not produce any reply bytes.
    pub fn send_command0(&mut self, payload: &[u8]) -> Result<()> {
        self.send_command_expect(0, payload).map(|_| ())
    }

    /// Send the payload accumulated by `builder`.
    pub fn send(&mut self, builder: CommandBuilder) -> Result<Vec<u8>> {
        self.send_command(&builder.build())
    }

    /// Send the payload accumulated by `builder`, expecting no reply bytes.
    pub fn send0(&mut self, builder: CommandBuilder) -> Result<()> {
        self.send_command0(&builder.build())
    }

    fn await_ready(&mut self, sent: usize) -> Result<()> {
        let start = Instant::now();
        loop {
            match HandshakeStatus::from_byte(self.read_byte()?) {
                HandshakeStatus::Ready => {
                    trace!(elapsed = ?start.elapsed(), "board ready");
                    return Ok(());
                }
                HandshakeStatus::LengthMismatch => {
                    let wanted = self.read_byte()?;
                    return Err(CoreError::LengthMismatch { sent, wanted }.into());
                }
                HandshakeStatus::ChecksumFail => {
                    return Err(CoreError::BoardChecksumFailure.into());
                }
                HandshakeStatus::Busy(status) => {
                    trace!(status, "waiting for ready");
                    let elapsed = start.elapsed();
                    if elapsed > self.handshake_timeout {
                        return Err(CoreError::Timeout {
                            waited_ms: elapsed.as_millis() as u64,
                        }
                        .into());
                    }
                }
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.transport
            .read(1)?
            .first()
            .copied()
            .ok_or_else(|| HardwareError::other("transport returned no data"))
    }
}

impl std::fmt::Debug for SerialCommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialCommandChannel")
            .field("selected", &self.selected)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}
