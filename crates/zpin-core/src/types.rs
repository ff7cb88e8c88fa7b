use crate::{
    Result,
    constants::{MAX_BOARD_SLOTS, SOLENOID16_CHANNELS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bus address of a satellite board (0-7).
///
/// A slot is one select line on the board bus. "No board selected" is
/// expressed as `Option<BoardSlot>::None` rather than a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BoardSlot(u8);

impl BoardSlot {
    /// Create a new slot with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlot` if the index is not 0-7.
    pub fn new(index: u8) -> Result<Self> {
        if usize::from(index) >= MAX_BOARD_SLOTS {
            return Err(Error::InvalidSlot(i32::from(index)));
        }
        Ok(BoardSlot(index))
    }

    /// Convert a select-line number where `-1` means "none selected".
    ///
    /// # Errors
    /// Returns `Error::InvalidSlot` for anything outside `-1..=7`.
    pub fn from_line(line: i32) -> Result<Option<Self>> {
        match line {
            -1 => Ok(None),
            0..=7 => Ok(Some(BoardSlot(line as u8))),
            _ => Err(Error::InvalidSlot(line)),
        }
    }

    /// Every slot, in bus order.
    pub fn all() -> impl Iterator<Item = BoardSlot> {
        (0..MAX_BOARD_SLOTS as u8).map(BoardSlot)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for BoardSlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        BoardSlot::new(value)
    }
}

impl From<BoardSlot> for u8 {
    fn from(slot: BoardSlot) -> u8 {
        slot.0
    }
}

impl fmt::Display for BoardSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BoardSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let index: i32 = s.trim().parse().map_err(|_| Error::InvalidSlot(-2))?;
        u8::try_from(index)
            .map_err(|_| Error::InvalidSlot(index))
            .and_then(BoardSlot::new)
    }
}

/// Channel on a Solenoid16 board (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SolenoidChannel(u8);

impl SolenoidChannel {
    /// Create a new channel with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if the index is not 0-15.
    pub fn new(index: u8) -> Result<Self> {
        if usize::from(index) >= SOLENOID16_CHANNELS {
            return Err(Error::InvalidChannel(i32::from(index)));
        }
        Ok(SolenoidChannel(index))
    }

    /// Every channel, in board order.
    pub fn all() -> impl Iterator<Item = SolenoidChannel> {
        (0..SOLENOID16_CHANNELS as u8).map(SolenoidChannel)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for SolenoidChannel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        SolenoidChannel::new(value)
    }
}

impl From<SolenoidChannel> for u8 {
    fn from(channel: SolenoidChannel) -> u8 {
        channel.0
    }
}

impl fmt::Display for SolenoidChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of satellite board types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoardType {
    /// 16 independently configurable solenoid/input channels.
    #[serde(rename = "s16", alias = "solenoid16")]
    Solenoid16 = 5,
}

impl BoardType {
    /// Look up a board type by the id a board reports when identifying.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            5 => Some(BoardType::Solenoid16),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoardType::Solenoid16 => write!(f, "Solenoid16"),
        }
    }
}

/// What a board reported about itself in response to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardIdentity {
    pub board_type: BoardType,
    pub hw_revision: u8,
    pub api_revision: u8,
}

impl fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (hw rev {}, api rev {})",
            self.board_type, self.hw_revision, self.api_revision
        )
    }
}

/// Behavior of one solenoid board channel.
///
/// Exactly one mode is active per channel; it only changes through an init
/// command. `Disabled` is the only mode guaranteed to drive nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SolenoidMode {
    #[default]
    Disabled = 0,
    Input = 1,
    Momentary = 2,
    OnOff = 3,
    Triggered = 4,
}

impl SolenoidMode {
    /// Create a mode from its wire value.
    ///
    /// # Errors
    /// Returns `Error::InvalidSolenoidMode` for values above 4.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SolenoidMode::Disabled),
            1 => Ok(SolenoidMode::Input),
            2 => Ok(SolenoidMode::Momentary),
            3 => Ok(SolenoidMode::OnOff),
            4 => Ok(SolenoidMode::Triggered),
            _ => Err(Error::InvalidSolenoidMode(value)),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SolenoidMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SolenoidMode::Disabled => "disabled",
            SolenoidMode::Input => "input",
            SolenoidMode::Momentary => "momentary",
            SolenoidMode::OnOff => "on-off",
            SolenoidMode::Triggered => "triggered",
        };
        f.write_str(name)
    }
}

/// Position of a switch in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchAddress {
    pub row: usize,
    pub col: usize,
}

impl SwitchAddress {
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for SwitchAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// Solenoid a switch fires from the scanner when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerTarget {
    pub slot: BoardSlot,
    pub channel: SolenoidChannel,
}
