//! Reply section of the response stream.
//!
//! After READY a board sends `N`, then `N` payload bytes and their checksum.
//! A zero count carries no payload and no checksum.

use crate::frame::checksum;
use zpin_core::{Error, Result};

/// Build the bytes a board sends after READY for `payload`.
///
/// `payload` must fit the one-byte count, so at most 255 bytes.
///
/// ```
/// use zpin_protocol::encode_reply;
///
/// assert_eq!(encode_reply(&[]), vec![0]);
/// assert_eq!(encode_reply(&[0x35, 0x02]), vec![2, 0x35, 0x02, 0x37]);
/// ```
pub fn encode_reply(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    debug_assert!(payload.len() <= usize::from(u8::MAX));
    out.push(payload.len() as u8);
    if !payload.is_empty() {
        out.extend_from_slice(payload);
        out.push(checksum(payload));
    }
    out
}

/// Split the `N + 1` bytes received after the count into payload and checksum and
/// verify them.
///
/// # Errors
/// Returns `Error::ReplyChecksumFailure` carrying both sums and the payload
/// on mismatch, or `Error::MalformedFrame` if `input` is empty.
pub fn verify_reply(input: &[u8]) -> Result<Vec<u8>> {
    let Some((&received, payload)) = input.split_last() else {
        return Err(Error::MalformedFrame {
            message: "reply carries no checksum".to_string(),
        });
    };

    let computed = checksum(payload);
    if computed != received {
        return Err(Error::ReplyChecksumFailure {
            received,
            computed,
            payload: payload.to_vec(),
        });
    }

    Ok(payload.to_vec())
}
