use zpin_core::constants::{STATUS_CHECKSUM_FAIL, STATUS_LENGTH_MISMATCH, STATUS_READY};

/// Meaning of one status byte polled from a board after a frame was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// The reply follows.
    Ready,
    /// The board wanted a different payload length; it sends that length next.
    LengthMismatch,
    /// The board rejected the frame checksum.
    ChecksumFail,
    /// Anything else: the board has not answered yet.
    Busy(u8),
}

impl HandshakeStatus {
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STATUS_READY => Self::Ready,
            STATUS_LENGTH_MISMATCH => Self::LengthMismatch,
            STATUS_CHECKSUM_FAIL => Self::ChecksumFail,
            other => Self::Busy(other),
        }
    }

    #[inline]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b'R', HandshakeStatus::Ready)]
    #[case(b'L', HandshakeStatus::LengthMismatch)]
    #[case(b'C', HandshakeStatus::ChecksumFail)]
    #[case(0x00, HandshakeStatus::Busy(0x00))]
    #[case(0xFF, HandshakeStatus::Busy(0xFF))]
    fn test_from_byte(#[case] byte: u8, #[case] expected: HandshakeStatus) {
        assert_eq!(HandshakeStatus::from_byte(byte), expected);
    }
}
