//! Solenoid16 board commands.
//!
//! Every command starts with a command byte that packs a 4-bit opcode above
//! a 4-bit channel index:
//!
//! ```text
//! OOOO CCCC
//! ```
//!
//! | Opcode | Command  | Payload after the command byte                      |
//! |--------|----------|-----------------------------------------------------|
//! | 0      | Fire     | none                                                |
//! | 1      | FireFor  | `u32` on-time (ms)                                  |
//! | 3      | TurnOn   | none                                                |
//! | 4      | TurnOff  | none                                                |
//! | 6      | Init     | mode byte, reserved `u32` (0), mode parameters      |
//!
//! Init parameters per mode:
//!
//! | Mode      | Parameters                                                   |
//! |-----------|--------------------------------------------------------------|
//! | Disabled  | none                                                         |
//! | Input     | `u8` settle time                                             |
//! | Momentary | `u32` on-time                                                |
//! | OnOff     | `u32` max on-time, `u8` pulse off-time, `u8` pulse on-time   |
//! | Triggered | `u8` trigger channel, `u32` min on-time, `u32` max on-time, `u8` pulse off-time |
//!
//! Integers are little-endian. None of these commands produce a reply.

use crate::builder::CommandBuilder;
use zpin_core::{Error, Result, SolenoidChannel, SolenoidMode};

/// Upper nibble of a Solenoid16 command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Fire = 0,
    FireFor = 1,
    TurnOn = 3,
    TurnOff = 4,
    Init = 6,
}

impl Opcode {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0 => Some(Self::Fire),
            1 => Some(Self::FireFor),
            3 => Some(Self::TurnOn),
            4 => Some(Self::TurnOff),
            6 => Some(Self::Init),
            _ => None,
        }
    }
}

/// Pack an opcode and channel into a command byte.
///
/// ```
/// use zpin_core::SolenoidChannel;
/// use zpin_protocol::{Opcode, command_byte};
///
/// let channel = SolenoidChannel::new(4).unwrap();
/// assert_eq!(command_byte(Opcode::FireFor, channel), 0x14);
/// ```
#[inline]
pub fn command_byte(opcode: Opcode, channel: SolenoidChannel) -> u8 {
    ((opcode as u8) << 4) | channel.as_u8()
}

/// Autonomous behavior a channel is initialized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConfig {
    Disabled,
    Input {
        settle_ms: u8,
    },
    Momentary {
        on_time_ms: u32,
    },
    OnOff {
        max_on_time_ms: u32,
        pulse_off_ms: u8,
        pulse_on_ms: u8,
    },
    Triggered {
        triggered_by: SolenoidChannel,
        min_on_time_ms: u32,
        max_on_time_ms: u32,
        pulse_off_ms: u8,
    },
}

impl ChannelConfig {
    pub fn mode(&self) -> SolenoidMode {
        match self {
            Self::Disabled => SolenoidMode::Disabled,
            Self::Input { .. } => SolenoidMode::Input,
            Self::Momentary { .. } => SolenoidMode::Momentary,
            Self::OnOff { .. } => SolenoidMode::OnOff,
            Self::Triggered { .. } => SolenoidMode::Triggered,
        }
    }

    fn append_params(&self, builder: CommandBuilder) -> CommandBuilder {
        match *self {
            Self::Disabled => builder,
            Self::Input { settle_ms } => builder.byte(settle_ms),
            Self::Momentary { on_time_ms } => builder.int(on_time_ms),
            Self::OnOff {
                max_on_time_ms,
                pulse_off_ms,
                pulse_on_ms,
            } => builder.int(max_on_time_ms).byte(pulse_off_ms).byte(pulse_on_ms),
            Self::Triggered {
                triggered_by,
                min_on_time_ms,
                max_on_time_ms,
                pulse_off_ms,
            } => builder
                .byte(triggered_by.as_u8())
                .int(min_on_time_ms)
                .int(max_on_time_ms)
                .byte(pulse_off_ms),
        }
    }
}

/// A command addressed to one channel of a Solenoid16 board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolenoidCommand {
    Fire(SolenoidChannel),
    FireFor {
        channel: SolenoidChannel,
        on_time_ms: u32,
    },
    TurnOn(SolenoidChannel),
    TurnOff(SolenoidChannel),
    Init {
        channel: SolenoidChannel,
        config: ChannelConfig,
    },
}

/// Bytes in an Init command before the mode parameters.
const INIT_HEADER_LEN: usize = 6;

impl SolenoidCommand {
    pub fn channel(&self) -> SolenoidChannel {
        match *self {
            Self::Fire(channel) | Self::TurnOn(channel) | Self::TurnOff(channel) => channel,
            Self::FireFor { channel, .. } | Self::Init { channel, .. } => channel,
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Fire(_) => Opcode::Fire,
            Self::FireFor { .. } => Opcode::FireFor,
            Self::TurnOn(_) => Opcode::TurnOn,
            Self::TurnOff(_) => Opcode::TurnOff,
            Self::Init { .. } => Opcode::Init,
        }
    }

    /// Encode the command payload (without frame markers).
    ///
    /// ```
    /// use zpin_core::SolenoidChannel;
    /// use zpin_protocol::SolenoidCommand;
    ///
    /// let channel = SolenoidChannel::new(4).unwrap();
    /// let payload = SolenoidCommand::FireFor { channel, on_time_ms: 50 }.encode();
    /// assert_eq!(payload, vec![0x14, 50, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let builder = CommandBuilder::new().byte(command_byte(self.opcode(), self.channel()));
        match self {
            Self::Fire(_) | Self::TurnOn(_) | Self::TurnOff(_) => builder.build(),
            Self::FireFor { on_time_ms, .. } => builder.int(*on_time_ms).build(),
            Self::Init { config, .. } => config
                .append_params(builder.byte(config.mode().to_u8()).int(0))
                .build(),
        }
    }

    /// Payload length a board expects for a command starting with `payload`.
    ///
    /// Init commands are sized by their mode byte; an Init without one is
    /// measured against the Disabled form.
    pub fn expected_len(payload: &[u8]) -> Option<usize> {
        let first = *payload.first()?;
        let len = match Opcode::from_nibble(first >> 4)? {
            Opcode::Fire | Opcode::TurnOn | Opcode::TurnOff => 1,
            Opcode::FireFor => 5,
            Opcode::Init => {
                let mode = payload
                    .get(1)
                    .map_or(Ok(SolenoidMode::Disabled), |&m| SolenoidMode::from_u8(m))
                    .ok()?;
                INIT_HEADER_LEN
                    + match mode {
                        SolenoidMode::Disabled => 0,
                        SolenoidMode::Input => 1,
                        SolenoidMode::Momentary => 4,
                        SolenoidMode::OnOff => 6,
                        SolenoidMode::Triggered => 10,
                    }
            }
        };
        Some(len)
    }

    /// Decode a payload the way a board does.
    ///
    /// # Errors
    /// Returns `Error::LengthMismatch` if the payload length disagrees with
    /// what the opcode (and mode) require, and `Error::MalformedFrame` for
    /// unknown opcodes or modes.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let expected = Self::expected_len(payload).ok_or_else(|| Error::MalformedFrame {
            message: format!("unknown solenoid command {payload:?}"),
        })?;
        if payload.len() != expected {
            return Err(Error::LengthMismatch {
                sent: payload.len(),
                wanted: expected as u8,
            });
        }

        let channel = SolenoidChannel::new(payload[0] & 0x0F)?;
        let int_at = |at: usize| {
            u32::from_le_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
        };

        let command = match Opcode::from_nibble(payload[0] >> 4) {
            Some(Opcode::Fire) => Self::Fire(channel),
            Some(Opcode::TurnOn) => Self::TurnOn(channel),
            Some(Opcode::TurnOff) => Self::TurnOff(channel),
            Some(Opcode::FireFor) => Self::FireFor {
                channel,
                on_time_ms: int_at(1),
            },
            Some(Opcode::Init) => {
                let config = match SolenoidMode::from_u8(payload[1])? {
                    SolenoidMode::Disabled => ChannelConfig::Disabled,
                    SolenoidMode::Input => ChannelConfig::Input {
                        settle_ms: payload[6],
                    },
                    SolenoidMode::Momentary => ChannelConfig::Momentary {
                        on_time_ms: int_at(6),
                    },
                    SolenoidMode::OnOff => ChannelConfig::OnOff {
                        max_on_time_ms: int_at(6),
                        pulse_off_ms: payload[10],
                        pulse_on_ms: payload[11],
                    },
                    SolenoidMode::Triggered => ChannelConfig::Triggered {
                        triggered_by: SolenoidChannel::new(payload[6])?,
                        min_on_time_ms: int_at(7),
                        max_on_time_ms: int_at(11),
                        pulse_off_ms: payload[15],
                    },
                };
                Self::Init { channel, config }
            }
            None => unreachable!("expected_len rejects unknown opcodes"),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ch(index: u8) -> SolenoidChannel {
        SolenoidChannel::new(index).unwrap()
    }

    #[rstest]
    #[case(SolenoidCommand::Fire(ch(0)), vec![0x00])]
    #[case(SolenoidCommand::Fire(ch(15)), vec![0x0F])]
    #[case(SolenoidCommand::TurnOn(ch(2)), vec![0x32])]
    #[case(SolenoidCommand::TurnOff(ch(2)), vec![0x42])]
    #[case(SolenoidCommand::FireFor { channel: ch(4), on_time_ms: 50 }, vec![0x14, 50, 0, 0, 0])]
    #[case(SolenoidCommand::FireFor { channel: ch(1), on_time_ms: 300 }, vec![0x11, 0x2C, 0x01, 0, 0])]
    fn test_encode_pulse_and_level(#[case] command: SolenoidCommand, #[case] expected: Vec<u8>) {
        assert_eq!(command.encode(), expected);
    }

    #[test]
    fn test_encode_init_disabled() {
        let command = SolenoidCommand::Init {
            channel: ch(3),
            config: ChannelConfig::Disabled,
        };
        assert_eq!(command.encode(), vec![0x63, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_init_momentary() {
        let command = SolenoidCommand::Init {
            channel: ch(0),
            config: ChannelConfig::Momentary { on_time_ms: 50 },
        };
        assert_eq!(command.encode(), vec![0x60, 2, 0, 0, 0, 0, 50, 0, 0, 0]);
    }

    #[test]
    fn test_encode_init_input() {
        let command = SolenoidCommand::Init {
            channel: ch(7),
            config: ChannelConfig::Input { settle_ms: 3 },
        };
        assert_eq!(command.encode(), vec![0x67, 1, 0, 0, 0, 0, 3]);
    }

    #[test]
    fn test_encode_init_on_off() {
        let command = SolenoidCommand::Init {
            channel: ch(1),
            config: ChannelConfig::OnOff {
                max_on_time_ms: 1000,
                pulse_off_ms: 4,
                pulse_on_ms: 2,
            },
        };
        assert_eq!(
            command.encode(),
            vec![0x61, 3, 0, 0, 0, 0, 0xE8, 0x03, 0, 0, 4, 2]
        );
    }

    #[test]
    fn test_encode_init_triggered() {
        let command = SolenoidCommand::Init {
            channel: ch(5),
            config: ChannelConfig::Triggered {
                triggered_by: ch(9),
                min_on_time_ms: 0,
                max_on_time_ms: 50,
                pulse_off_ms: 0,
            },
        };
        assert_eq!(
            command.encode(),
            vec![0x65, 4, 0, 0, 0, 0, 9, 0, 0, 0, 0, 50, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_expected_len_matches_encoding() {
        let configs = [
            ChannelConfig::Disabled,
            ChannelConfig::Input { settle_ms: 30 },
            ChannelConfig::Momentary { on_time_ms: 40 },
            ChannelConfig::OnOff {
                max_on_time_ms: 0,
                pulse_off_ms: 0,
                pulse_on_ms: 0,
            },
            ChannelConfig::Triggered {
                triggered_by: ch(0),
                min_on_time_ms: 0,
                max_on_time_ms: 50,
                pulse_off_ms: 0,
            },
        ];
        for config in configs {
            let payload = SolenoidCommand::Init {
                channel: ch(1),
                config,
            }
            .encode();
            assert_eq!(SolenoidCommand::expected_len(&payload), Some(payload.len()));
            let decoded = SolenoidCommand::decode(&payload).unwrap();
            assert_eq!(decoded, SolenoidCommand::Init { channel: ch(1), config });
        }
    }

    #[test]
    fn test_decode_reports_wanted_length() {
        assert!(matches!(
            SolenoidCommand::decode(&[0x14, 50]),
            Err(Error::LengthMismatch { sent: 2, wanted: 5 })
        ));
        assert!(matches!(
            SolenoidCommand::decode(&[0x60]),
            Err(Error::LengthMismatch { sent: 1, wanted: 6 })
        ));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x20])] // opcode 2 unused
    #[case(&[0x60, 9, 0, 0, 0, 0])] // unknown mode
    fn test_decode_rejects_unknown(#[case] payload: &[u8]) {
        assert!(matches!(
            SolenoidCommand::decode(payload),
            Err(Error::MalformedFrame { .. })
        ));
    }
}
