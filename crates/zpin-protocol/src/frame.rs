use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use zpin_core::{Error, Result, constants::*};

/// 8-bit wraparound sum of `bytes`.
///
/// This is the checksum used in both directions on the board bus.
///
/// ```
/// use zpin_protocol::checksum;
///
/// assert_eq!(checksum(&[0x35, 0x02]), 0x37);
/// assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
/// assert_eq!(checksum(&[]), 0);
/// ```
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// A command frame as it travels to a board.
///
/// # Wire Format
///
/// ```text
/// 'S' LEN PAYLOAD... SUM 'E'
/// ```
///
/// `LEN` is the payload length and `SUM` is [`checksum`] of the payload.
///
/// # Example
///
/// ```
/// use zpin_protocol::CommandFrame;
///
/// let frame = CommandFrame::encode(&[0x14, 50, 0, 0, 0]).unwrap();
/// assert_eq!(frame.as_bytes(), &[b'S', 5, 0x14, 50, 0, 0, 0, 0x46, b'E']);
/// assert_eq!(frame.payload(), &[0x14, 50, 0, 0, 0]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Raw bytes including start/end markers
    data: Bytes,
}

impl CommandFrame {
    /// Frame a payload for transmission.
    ///
    /// # Errors
    /// Returns `Error::PayloadTooLong` if the payload does not fit the
    /// one-byte length field.
    pub fn encode(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
        buf.put_u8(START_BYTE);
        buf.put_u8(payload.len() as u8);
        buf.put_slice(payload);
        buf.put_u8(checksum(payload));
        buf.put_u8(END_BYTE);

        Ok(CommandFrame { data: buf.freeze() })
    }

    /// Parse a complete frame received from the bus.
    ///
    /// This is the board side of [`CommandFrame::encode`]. The checksum is
    /// not verified here; see [`CommandFrame::checksum_matches`].
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if markers or length are wrong.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(Error::MalformedFrame {
                message: format!("{} bytes is shorter than the frame overhead", bytes.len()),
            });
        }
        if bytes[0] != START_BYTE {
            return Err(Error::MalformedFrame {
                message: format!("expected start byte, got {:#04x}", bytes[0]),
            });
        }
        if bytes[bytes.len() - 1] != END_BYTE {
            return Err(Error::MalformedFrame {
                message: format!("expected end byte, got {:#04x}", bytes[bytes.len() - 1]),
            });
        }
        let declared = usize::from(bytes[1]);
        if declared + FRAME_OVERHEAD != bytes.len() {
            return Err(Error::MalformedFrame {
                message: format!(
                    "length byte says {declared} but frame carries {}",
                    bytes.len() - FRAME_OVERHEAD
                ),
            });
        }

        Ok(CommandFrame {
            data: Bytes::copy_from_slice(bytes),
        })
    }

    /// Get the raw bytes of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the frame size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Payload between the length byte and the checksum.
    pub fn payload(&self) -> &[u8] {
        &self.data[2..self.data.len() - 2]
    }

    /// Checksum byte carried by the frame.
    pub fn checksum(&self) -> u8 {
        self.data[self.data.len() - 2]
    }

    /// Whether the carried checksum matches the payload.
    pub fn checksum_matches(&self) -> bool {
        checksum(self.payload()) == self.checksum()
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("payload", &self.payload())
            .field("checksum", &self.checksum())
            .finish()
    }
}
