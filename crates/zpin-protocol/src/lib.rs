//! Byte-level protocol spoken between the controller and satellite boards.
//!
//! Everything in this crate is pure encoding and decoding; moving the bytes
//! over the bus is the job of `zpin-hardware`.

pub mod builder;
pub mod commands;
pub mod frame;
pub mod identify;
pub mod reply;
pub mod status;

pub use builder::CommandBuilder;
pub use commands::{ChannelConfig, Opcode, SolenoidCommand, command_byte};
pub use frame::{CommandFrame, checksum};
pub use identify::{decode_identity, encode_identity};
pub use reply::{encode_reply, verify_reply};
pub use status::HandshakeStatus;
