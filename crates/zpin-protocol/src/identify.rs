use zpin_core::{
    BoardIdentity, BoardSlot, BoardType, Error, Result,
    constants::{BOARD_TYPE_MASK, HW_REVISION_MASK, IDENTIFY_REPLY_LEN},
};

/// Decode the two identify bytes a board at `slot` returned.
///
/// Bit 4 of byte 0 lies in both the type field (low 5 bits) and the
/// revision nibble (high 4 bits). The revision owns it.
///
/// # Errors
/// Returns `Error::WrongReplyLength` unless exactly two bytes were given and
/// `Error::UnknownBoardType` if the type id is not a known board.
///
/// # Example
/// ```
/// use zpin_core::{BoardSlot, BoardType};
/// use zpin_protocol::decode_identity;
///
/// let slot = BoardSlot::new(0).unwrap();
/// let identity = decode_identity(slot, &[0x35, 0x02]).unwrap();
/// assert_eq!(identity.board_type, BoardType::Solenoid16);
/// assert_eq!(identity.hw_revision, 3);
/// assert_eq!(identity.api_revision, 2);
/// ```
pub fn decode_identity(slot: BoardSlot, reply: &[u8]) -> Result<BoardIdentity> {
    let &[first, api_revision] = reply else {
        return Err(Error::WrongReplyLength {
            expected: IDENTIFY_REPLY_LEN,
            actual: reply.len(),
        });
    };

    // Only the low nibble names the type, so 0x15 reads as id 5, hw rev 1.
    let type_id = first & BOARD_TYPE_MASK & !HW_REVISION_MASK;
    let hw_revision = (first & HW_REVISION_MASK) >> 4;

    let board_type = BoardType::from_id(type_id).ok_or(Error::UnknownBoardType {
        slot: slot.as_u8(),
        type_id,
    })?;

    Ok(BoardIdentity {
        board_type,
        hw_revision,
        api_revision,
    })
}

/// Bytes a board with `identity` answers identify with.
pub fn encode_identity(identity: &BoardIdentity) -> [u8; IDENTIFY_REPLY_LEN] {
    [
        (identity.hw_revision << 4) | identity.board_type.id(),
        identity.api_revision,
    ]
}
