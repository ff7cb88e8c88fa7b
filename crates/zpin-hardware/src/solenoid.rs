//! Driver for the 16-channel solenoid/input board.

use crate::{Result, SerialCommandChannel, board};
use tracing::{debug, info};
use zpin_core::{
    BoardIdentity, BoardSlot, BoardType, Error as CoreError, SolenoidChannel, SolenoidMode,
    constants::SOLENOID16_CHANNELS,
};
use zpin_protocol::{ChannelConfig, SolenoidCommand};

/// An attached Solenoid16 board.
///
/// Every operation selects the board, sends one command that expects an
/// empty reply and deselects again. Protocol errors are returned unchanged.
///
/// The driver keeps a best-effort mirror of which channels it last turned
/// on. The board never reports output state, so [`toggle`](Self::toggle)
/// works from that mirror.
#[derive(Debug, Clone)]
pub struct Solenoid16 {
    slot: BoardSlot,
    identity: BoardIdentity,
    modes: [SolenoidMode; SOLENOID16_CHANNELS],
    mirror: [bool; SOLENOID16_CHANNELS],
}

impl Solenoid16 {
    /// Identify the board at `slot`, check it, then disable every channel.
    ///
    /// The channels are disabled in order 0..15 before this returns, so a
    /// board whose outputs were left configured by an earlier run drives
    /// nothing once attached.
    ///
    /// # Errors
    /// `WrongBoardType` or `WrongApiRevision` when the board is not what was
    /// asked for; any protocol error from identify or the disables.
    pub fn attach(
        channel: &mut SerialCommandChannel,
        slot: BoardSlot,
        api_revision: u8,
    ) -> Result<Self> {
        let identity = board::identify(channel, slot)?;

        if identity.board_type != BoardType::Solenoid16 {
            return Err(CoreError::WrongBoardType {
                slot: slot.as_u8(),
                expected: BoardType::Solenoid16.to_string(),
                actual: identity.board_type.to_string(),
            }
            .into());
        }
        if identity.api_revision != api_revision {
            return Err(CoreError::WrongApiRevision {
                slot: slot.as_u8(),
                expected: api_revision,
                actual: identity.api_revision,
            }
            .into());
        }

        let mut board = Self {
            slot,
            identity,
            modes: [SolenoidMode::Disabled; SOLENOID16_CHANNELS],
            mirror: [false; SOLENOID16_CHANNELS],
        };
        for solenoid in SolenoidChannel::all() {
            board.disable(channel, solenoid)?;
        }
        info!(slot = slot.as_u8(), "all solenoid channels disabled");

        Ok(board)
    }

    pub fn slot(&self) -> BoardSlot {
        self.slot
    }

    pub fn identity(&self) -> BoardIdentity {
        self.identity
    }

    /// Mode the channel was last initialized to.
    pub fn mode(&self, solenoid: SolenoidChannel) -> SolenoidMode {
        self.modes[solenoid.index()]
    }

    /// Whether the driver last turned the channel on.
    pub fn mirror_state(&self, solenoid: SolenoidChannel) -> bool {
        self.mirror[solenoid.index()]
    }

    /// Pulse the channel with its configured on-time.
    pub fn fire(&mut self, channel: &mut SerialCommandChannel, solenoid: SolenoidChannel) -> Result<()> {
        self.send(channel, SolenoidCommand::Fire(solenoid))
    }

    /// Pulse the channel for `on_time_ms`.
    pub fn fire_for(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        on_time_ms: u32,
    ) -> Result<()> {
        self.send(
            channel,
            SolenoidCommand::FireFor {
                channel: solenoid,
                on_time_ms,
            },
        )
    }

    pub fn turn_on(&mut self, channel: &mut SerialCommandChannel, solenoid: SolenoidChannel) -> Result<()> {
        self.send(channel, SolenoidCommand::TurnOn(solenoid))?;
        self.mirror[solenoid.index()] = true;
        Ok(())
    }

    pub fn turn_off(&mut self, channel: &mut SerialCommandChannel, solenoid: SolenoidChannel) -> Result<()> {
        self.send(channel, SolenoidCommand::TurnOff(solenoid))?;
        self.mirror[solenoid.index()] = false;
        Ok(())
    }

    /// Turn the channel off if the mirror says on, otherwise on.
    ///
    /// Returns the new mirrored state.
    pub fn toggle(&mut self, channel: &mut SerialCommandChannel, solenoid: SolenoidChannel) -> Result<bool> {
        if self.mirror_state(solenoid) {
            self.turn_off(channel, solenoid)?;
        } else {
            self.turn_on(channel, solenoid)?;
        }
        Ok(self.mirror_state(solenoid))
    }

    pub fn disable(&mut self, channel: &mut SerialCommandChannel, solenoid: SolenoidChannel) -> Result<()> {
        self.init(channel, solenoid, ChannelConfig::Disabled)
    }

    /// Pulse for `on_time_ms` whenever fired.
    pub fn init_momentary(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        on_time_ms: u32,
    ) -> Result<()> {
        self.init(channel, solenoid, ChannelConfig::Momentary { on_time_ms })
    }

    /// Hold on until turned off, at most `max_on_time_ms` (0 = unlimited),
    /// PWM-ed with the given pulse times.
    pub fn init_on_off(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        max_on_time_ms: u32,
        pulse_off_ms: u8,
        pulse_on_ms: u8,
    ) -> Result<()> {
        self.init(
            channel,
            solenoid,
            ChannelConfig::OnOff {
                max_on_time_ms,
                pulse_off_ms,
                pulse_on_ms,
            },
        )
    }

    /// Use the channel as a debounced input.
    pub fn init_input(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        settle_ms: u8,
    ) -> Result<()> {
        self.init(channel, solenoid, ChannelConfig::Input { settle_ms })
    }

    /// Fire whenever the input channel `triggered_by` closes.
    pub fn init_triggered(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        triggered_by: SolenoidChannel,
        min_on_time_ms: u32,
        max_on_time_ms: u32,
        pulse_off_ms: u8,
    ) -> Result<()> {
        self.init(
            channel,
            solenoid,
            ChannelConfig::Triggered {
                triggered_by,
                min_on_time_ms,
                max_on_time_ms,
                pulse_off_ms,
            },
        )
    }

    /// Switch the channel to `config`.
    ///
    /// The on/off mirror is cleared since the board drops its output when it
    /// changes mode.
    pub fn init(
        &mut self,
        channel: &mut SerialCommandChannel,
        solenoid: SolenoidChannel,
        config: ChannelConfig,
    ) -> Result<()> {
        self.send(
            channel,
            SolenoidCommand::Init {
                channel: solenoid,
                config,
            },
        )?;
        self.modes[solenoid.index()] = config.mode();
        self.mirror[solenoid.index()] = false;
        Ok(())
    }

    fn send(&mut self, channel: &mut SerialCommandChannel, command: SolenoidCommand) -> Result<()> {
        debug!(slot = self.slot.as_u8(), ?command, "solenoid command");
        let payload = command.encode();
        channel.with_selected(self.slot, |channel| channel.send_command0(&payload))
    }
}
