//! In-process board bus with simulated Solenoid16 boards.
//!
//! The simulated boards speak the real wire protocol: they parse frames,
//! reject bad checksums, report length mismatches and answer identify, so
//! everything above [`BusTransport`] runs unmodified against them.

use crate::{BusTransport, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use zpin_core::{
    BoardIdentity, BoardSlot, BoardType, Error as CoreError, SolenoidChannel, SolenoidMode,
    constants::{
        IDENTIFY_COMMAND, MAX_BOARD_SLOTS, SOLENOID16_API_REVISION, SOLENOID16_CHANNELS,
        STATUS_CHECKSUM_FAIL, STATUS_LENGTH_MISMATCH, STATUS_READY,
    },
};
use zpin_protocol::{CommandFrame, SolenoidCommand, encode_identity, encode_reply};

/// Byte clocked in when nothing is driving a status.
const IDLE_BYTE: u8 = 0x00;

/// One-shot misbehavior for the next frame a board receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Never send READY.
    NeverReady,
    /// Reject the frame checksum.
    RejectChecksum,
    /// Claim to want a payload of this length.
    LengthMismatch(u8),
    /// Answer normally but with a wrong reply checksum.
    CorruptReplyChecksum,
    /// Answer with these reply bytes instead of processing the command.
    ReplyWith(Vec<u8>),
}

/// A frame a simulated board accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedCommand {
    pub slot: BoardSlot,
    pub payload: Vec<u8>,
}

/// Observable state of a simulated Solenoid16 board.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    identity: BoardIdentity,
    modes: [SolenoidMode; SOLENOID16_CHANNELS],
    outputs: [bool; SOLENOID16_CHANNELS],
    fires: [u32; SOLENOID16_CHANNELS],
    last_fire_for: [Option<u32>; SOLENOID16_CHANNELS],
}

impl SimulatedBoard {
    fn new(identity: BoardIdentity) -> Self {
        Self {
            identity,
            // left over from an earlier run
            modes: [SolenoidMode::Momentary; SOLENOID16_CHANNELS],
            outputs: [false; SOLENOID16_CHANNELS],
            fires: [0; SOLENOID16_CHANNELS],
            last_fire_for: [None; SOLENOID16_CHANNELS],
        }
    }

    pub fn identity(&self) -> BoardIdentity {
        self.identity
    }

    pub fn mode(&self, channel: SolenoidChannel) -> SolenoidMode {
        self.modes[channel.index()]
    }

    pub fn output(&self, channel: SolenoidChannel) -> bool {
        self.outputs[channel.index()]
    }

    pub fn fire_count(&self, channel: SolenoidChannel) -> u32 {
        self.fires[channel.index()]
    }

    pub fn last_fire_for(&self, channel: SolenoidChannel) -> Option<u32> {
        self.last_fire_for[channel.index()]
    }

    fn apply(&mut self, command: SolenoidCommand) {
        let i = command.channel().index();
        match command {
            SolenoidCommand::Fire(_) => self.fires[i] += 1,
            SolenoidCommand::FireFor { on_time_ms, .. } => {
                self.fires[i] += 1;
                self.last_fire_for[i] = Some(on_time_ms);
            }
            SolenoidCommand::TurnOn(_) => self.outputs[i] = true,
            SolenoidCommand::TurnOff(_) => self.outputs[i] = false,
            SolenoidCommand::Init { config, .. } => {
                self.modes[i] = config.mode();
                self.outputs[i] = false;
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    boards: [Option<SimulatedBoard>; MAX_BOARD_SLOTS],
    faults: [VecDeque<Fault>; MAX_BOARD_SLOTS],
    selected: Option<BoardSlot>,
    selected_by: Option<ThreadId>,
    selections: Vec<Option<BoardSlot>>,
    commands: Vec<LoggedCommand>,
    response: VecDeque<u8>,
    busy_polls: usize,
    collisions: usize,
}

impl SimState {
    fn check_collision(&mut self) {
        if self.selected.is_some() && self.selected_by != Some(thread::current().id()) {
            self.collisions += 1;
        }
    }

    fn receive(&mut self, slot: BoardSlot, bytes: &[u8]) {
        self.response.clear();
        if self.boards[slot.index()].is_none() {
            return;
        }

        let frame = match CommandFrame::decode(bytes) {
            Ok(frame) if frame.checksum_matches() => frame,
            _ => {
                self.response.push_back(STATUS_CHECKSUM_FAIL);
                return;
            }
        };
        let payload = frame.payload().to_vec();
        self.commands.push(LoggedCommand {
            slot,
            payload: payload.clone(),
        });

        self.response.extend(std::iter::repeat_n(IDLE_BYTE, self.busy_polls));

        match self.faults[slot.index()].pop_front() {
            None => self.process(slot, &payload),
            Some(Fault::NeverReady) => {}
            Some(Fault::RejectChecksum) => self.response.push_back(STATUS_CHECKSUM_FAIL),
            Some(Fault::LengthMismatch(wanted)) => {
                self.response.extend([STATUS_LENGTH_MISMATCH, wanted]);
            }
            Some(Fault::ReplyWith(reply)) => self.reply(&reply),
            Some(Fault::CorruptReplyChecksum) => {
                let before = self.response.len();
                self.process(slot, &payload);
                if self.response.len() > before + 2 {
                    if let Some(sum) = self.response.back_mut() {
                        *sum = sum.wrapping_add(1);
                    }
                } else {
                    self.response.truncate(before);
                    self.response.extend([STATUS_READY, 1, 0x00, 0x01]);
                }
            }
        }
    }

    fn process(&mut self, slot: BoardSlot, payload: &[u8]) {
        let Some(board) = self.boards[slot.index()].as_mut() else {
            return;
        };

        if payload == [IDENTIFY_COMMAND] {
            let identity = encode_identity(&board.identity);
            self.reply(&identity);
            return;
        }

        match SolenoidCommand::decode(payload) {
            Ok(command) => {
                board.apply(command);
                self.reply(&[]);
            }
            Err(CoreError::LengthMismatch { wanted, .. }) => {
                self.response.extend([STATUS_LENGTH_MISMATCH, wanted]);
            }
            Err(_) => self.response.push_back(STATUS_CHECKSUM_FAIL),
        }
    }

    fn reply(&mut self, payload: &[u8]) {
        self.response.push_back(STATUS_READY);
        self.response.extend(encode_reply(payload));
    }
}

/// Board bus backed by simulated boards.
///
/// # Examples
///
/// ```
/// use zpin_core::{BoardSlot, BusConfig};
/// use zpin_hardware::BusLock;
/// use zpin_hardware::mock::SimulatedBus;
///
/// let (bus, handle) = SimulatedBus::new();
/// let slot = BoardSlot::new(1).unwrap();
/// handle.add_solenoid16(slot);
///
/// let lock = BusLock::new(bus, &BusConfig::default());
/// let identity = lock.acquire().unwrap().identify(slot).unwrap();
/// assert_eq!(identity.api_revision, 2);
/// ```
#[derive(Debug)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    /// Create an empty bus and the handle that controls it.
    pub fn new() -> (Self, SimulatedBusHandle) {
        let state = Arc::new(Mutex::new(SimState::default()));
        let handle = SimulatedBusHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }
}

impl BusTransport for SimulatedBus {
    fn select(&mut self, slot: Option<BoardSlot>) -> Result<()> {
        let mut state = self.state.lock();
        state.check_collision();
        state.selected = slot;
        state.selected_by = slot.map(|_| thread::current().id());
        state.selections.push(slot);
        state.response.clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.check_collision();
        if let Some(slot) = state.selected {
            state.receive(slot, bytes);
        }
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.check_collision();
        Ok((0..len)
            .map(|_| state.response.pop_front().unwrap_or(IDLE_BYTE))
            .collect())
    }
}

/// Control and inspection handle for a [`SimulatedBus`].
///
/// Cloneable; every clone controls the same bus.
#[derive(Debug, Clone)]
pub struct SimulatedBusHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBusHandle {
    /// Plug a board answering identify with `identity` into `slot`.
    pub fn add_board(&self, slot: BoardSlot, identity: BoardIdentity) {
        self.state.lock().boards[slot.index()] = Some(SimulatedBoard::new(identity));
    }

    /// Plug a current Solenoid16 (hardware revision 3) into `slot`.
    pub fn add_solenoid16(&self, slot: BoardSlot) {
        self.add_board(
            slot,
            BoardIdentity {
                board_type: BoardType::Solenoid16,
                hw_revision: 3,
                api_revision: SOLENOID16_API_REVISION,
            },
        );
    }

    pub fn remove_board(&self, slot: BoardSlot) {
        self.state.lock().boards[slot.index()] = None;
    }

    /// Make the next frame received by `slot` misbehave.
    pub fn inject_fault(&self, slot: BoardSlot, fault: Fault) {
        self.state.lock().faults[slot.index()].push_back(fault);
    }

    /// Number of busy status bytes a board sends before answering.
    pub fn set_busy_polls(&self, polls: usize) {
        self.state.lock().busy_polls = polls;
    }

    pub fn board(&self, slot: BoardSlot) -> Option<SimulatedBoard> {
        self.state.lock().boards[slot.index()].clone()
    }

    /// Every accepted frame, oldest first.
    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.state.lock().commands.clone()
    }

    /// Payloads accepted by `slot`, oldest first.
    pub fn commands_for(&self, slot: BoardSlot) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|c| c.slot == slot)
            .map(|c| c.payload.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// Every select call, oldest first (`None` = deselect).
    pub fn selections(&self) -> Vec<Option<BoardSlot>> {
        self.state.lock().selections.clone()
    }

    pub fn selected(&self) -> Option<BoardSlot> {
        self.state.lock().selected
    }

    /// Bus operations made by one thread while another had a board selected.
    pub fn collisions(&self) -> usize {
        self.state.lock().collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zpin_core::constants::{END_BYTE, START_BYTE};

    fn slot() -> BoardSlot {
        BoardSlot::new(0).unwrap()
    }

    fn selected_bus() -> (SimulatedBus, SimulatedBusHandle) {
        let (mut bus, handle) = SimulatedBus::new();
        handle.add_solenoid16(slot());
        bus.select(Some(slot())).unwrap();
        (bus, handle)
    }

    #[test]
    fn test_identify_reply_bytes() {
        let (mut bus, _handle) = selected_bus();
        bus.write(CommandFrame::encode(&[IDENTIFY_COMMAND]).unwrap().as_bytes())
            .unwrap();
        assert_eq!(bus.read(5).unwrap(), vec![b'R', 2, 0x35, 0x02, 0x37]);
        assert_eq!(bus.read(1).unwrap(), vec![IDLE_BYTE]);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let (mut bus, handle) = selected_bus();
        bus.write(&[START_BYTE, 1, 0x00, 0x05, END_BYTE]).unwrap();
        assert_eq!(bus.read(1).unwrap(), vec![STATUS_CHECKSUM_FAIL]);
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn test_short_command_reports_wanted_length() {
        let (mut bus, _handle) = selected_bus();
        bus.write(CommandFrame::encode(&[0x14, 50]).unwrap().as_bytes())
            .unwrap();
        assert_eq!(bus.read(2).unwrap(), vec![STATUS_LENGTH_MISMATCH, 5]);
    }

    #[test]
    fn test_busy_polls_precede_status() {
        let (mut bus, handle) = selected_bus();
        handle.set_busy_polls(3);
        bus.write(CommandFrame::encode(&[0x00]).unwrap().as_bytes())
            .unwrap();
        assert_eq!(bus.read(5).unwrap(), vec![0, 0, 0, b'R', 0]);
    }

    #[test]
    fn test_empty_slot_stays_silent() {
        let (mut bus, handle) = SimulatedBus::new();
        bus.select(BoardSlot::new(4).ok()).unwrap();
        bus.write(CommandFrame::encode(&[IDENTIFY_COMMAND]).unwrap().as_bytes())
            .unwrap();
        assert_eq!(bus.read(2).unwrap(), vec![IDLE_BYTE, IDLE_BYTE]);
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn test_commands_change_board_state() {
        let (mut bus, handle) = selected_bus();
        let channel = SolenoidChannel::new(2).unwrap();
        for command in [
            SolenoidCommand::TurnOn(channel),
            SolenoidCommand::FireFor {
                channel,
                on_time_ms: 30,
            },
        ] {
            bus.write(CommandFrame::encode(&command.encode()).unwrap().as_bytes())
                .unwrap();
        }

        let board = handle.board(slot()).unwrap();
        assert!(board.output(channel));
        assert_eq!(board.fire_count(channel), 1);
        assert_eq!(board.last_fire_for(channel), Some(30));
    }
}
