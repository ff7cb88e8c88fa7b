//! Board slots and identification.

use crate::{Result, SerialCommandChannel, Solenoid16};
use tracing::{error, info};
use zpin_core::{
    BoardIdentity, BoardSlot, BoardType, Error as CoreError,
    constants::{IDENTIFY_COMMAND, IDENTIFY_REPLY_LEN, MAX_BOARD_SLOTS},
};
use zpin_protocol::decode_identity;

/// Ask the board at `slot` to identify itself.
///
/// Selects the slot, sends the identify command, expects exactly two reply
/// bytes and deselects again.
pub fn identify(channel: &mut SerialCommandChannel, slot: BoardSlot) -> Result<BoardIdentity> {
    let reply = channel.with_selected(slot, |channel| {
        channel.send_command_expect(IDENTIFY_REPLY_LEN, &[IDENTIFY_COMMAND])
    })?;
    Ok(decode_identity(slot, &reply)?)
}

/// Driver attached to a slot.
#[derive(Debug)]
#[non_exhaustive]
pub enum BoardDriver {
    Solenoid16(Solenoid16),
}

impl BoardDriver {
    pub fn board_type(&self) -> BoardType {
        match self {
            Self::Solenoid16(_) => BoardType::Solenoid16,
        }
    }
}

#[derive(Debug, Default)]
struct SlotEntry {
    identity: Option<BoardIdentity>,
    driver: Option<BoardDriver>,
}

/// Fixed table of the eight bus slots.
///
/// A slot holds an identity once its board has answered identify, and a
/// driver once a driver attached successfully. A slot without a driver
/// cannot be driven.
#[derive(Debug, Default)]
pub struct BoardSlotRegistry {
    slots: [SlotEntry; MAX_BOARD_SLOTS],
}

impl BoardSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identify the board at `slot` and record its identity.
    ///
    /// A failed identify forgets whatever the slot held before.
    pub fn identify(
        &mut self,
        channel: &mut SerialCommandChannel,
        slot: BoardSlot,
    ) -> Result<BoardIdentity> {
        let entry = &mut self.slots[slot.index()];
        match identify(channel, slot) {
            Ok(identity) => {
                info!(slot = slot.as_u8(), %identity, "board identified");
                entry.identity = Some(identity);
                Ok(identity)
            }
            Err(e) => {
                *entry = SlotEntry::default();
                Err(e)
            }
        }
    }

    /// Attach a driver for `board_type` to `slot`.
    ///
    /// Any previous driver is dropped first. On failure the slot is left
    /// empty.
    pub fn attach(
        &mut self,
        channel: &mut SerialCommandChannel,
        slot: BoardSlot,
        board_type: BoardType,
        api_revision: u8,
    ) -> Result<BoardIdentity> {
        let entry = &mut self.slots[slot.index()];
        *entry = SlotEntry::default();

        let attached = match board_type {
            BoardType::Solenoid16 => {
                Solenoid16::attach(channel, slot, api_revision).map(BoardDriver::Solenoid16)
            }
        };

        match attached {
            Ok(driver) => {
                let identity = match &driver {
                    BoardDriver::Solenoid16(board) => board.identity(),
                };
                info!(slot = slot.as_u8(), %identity, "board attached");
                entry.identity = Some(identity);
                entry.driver = Some(driver);
                Ok(identity)
            }
            Err(e) => {
                error!(slot = slot.as_u8(), %board_type, error = %e, "board attach failed");
                Err(e)
            }
        }
    }

    /// Forget the board at `slot`.
    pub fn detach(&mut self, slot: BoardSlot) {
        self.slots[slot.index()] = SlotEntry::default();
    }

    pub fn identity(&self, slot: BoardSlot) -> Option<BoardIdentity> {
        self.slots[slot.index()].identity
    }

    pub fn driver(&self, slot: BoardSlot) -> Option<&BoardDriver> {
        self.slots[slot.index()].driver.as_ref()
    }

    /// Solenoid16 driver at `slot`.
    ///
    /// # Errors
    /// `SlotNotIdentified` if no Solenoid16 driver is attached there.
    pub fn solenoid16_mut(&mut self, slot: BoardSlot) -> Result<&mut Solenoid16> {
        match self.slots[slot.index()].driver.as_mut() {
            Some(BoardDriver::Solenoid16(board)) => Ok(board),
            None => Err(CoreError::SlotNotIdentified(slot.as_u8()).into()),
        }
    }

    pub fn solenoid16(&self, slot: BoardSlot) -> Option<&Solenoid16> {
        match self.driver(slot) {
            Some(BoardDriver::Solenoid16(board)) => Some(board),
            None => None,
        }
    }

    /// Slots holding an identified board, in bus order.
    pub fn identified(&self) -> impl Iterator<Item = (BoardSlot, BoardIdentity)> + '_ {
        BoardSlot::all().filter_map(|slot| self.identity(slot).map(|identity| (slot, identity)))
    }
}
