//! Exclusive access to the board bus.
//!
//! The select lines, the data lines and the table of attached boards sit
//! behind one lock. Command handlers take it with a short bounded wait and
//! report "board busy" when they cannot; the switch scanner takes it with
//! its own bounded wait for the brief window of an autonomous fire.
//!
//! ```text
//! command thread ──┐
//! command thread ──┼──► BusLock ──► BusGuard ──► SerialCommandChannel ──► BusTransport
//! scanner trigger ─┘                   │
//!                                      └──────► BoardSlotRegistry ──► Solenoid16
//! ```

use crate::{
    BoardSlotRegistry, BusTransport, HardwareError, Result, SerialCommandChannel, Solenoid16,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{error, warn};
use zpin_core::{BoardIdentity, BoardSlot, BoardType, BusConfig};

/// Records which thread currently holds the bus lock.
#[derive(Debug, Default)]
pub(crate) struct LockOwner(Mutex<Option<ThreadId>>);

impl LockOwner {
    fn claim(&self) {
        *self.0.lock() = Some(thread::current().id());
    }

    fn clear(&self) {
        *self.0.lock() = None;
    }

    pub(crate) fn assert_held(&self) -> Result<()> {
        if *self.0.lock() == Some(thread::current().id()) {
            Ok(())
        } else {
            error!(thread = ?thread::current().id(), "bus touched without holding the bus lock");
            Err(HardwareError::LockNotHeld)
        }
    }
}

struct BusState {
    channel: SerialCommandChannel,
    boards: BoardSlotRegistry,
}

/// Mutual exclusion over the physical board bus.
///
/// Acquisition hands out a [`BusGuard`]; the bus is released when the guard
/// is released or dropped. The lock is not reentrant: a thread that already
/// holds a guard and tries to acquire again waits out its timeout and gets
/// `LockBusy`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use zpin_core::{BoardIdentity, BoardSlot, BoardType, BusConfig, SolenoidChannel};
/// use zpin_hardware::BusLock;
/// use zpin_hardware::mock::SimulatedBus;
///
/// let (bus, handle) = SimulatedBus::new();
/// let slot = BoardSlot::new(0).unwrap();
/// handle.add_board(slot, BoardIdentity {
///     board_type: BoardType::Solenoid16,
///     hw_revision: 3,
///     api_revision: 2,
/// });
///
/// let lock = BusLock::new(bus, &BusConfig::default());
/// let mut guard = lock.try_acquire(Duration::from_millis(10)).unwrap();
/// guard.attach(slot, BoardType::Solenoid16, 2).unwrap();
/// guard
///     .with_solenoid16(slot, |board, channel| {
///         board.fire(channel, SolenoidChannel::new(4).unwrap())
///     })
///     .unwrap();
/// guard.release().unwrap();
/// ```
pub struct BusLock {
    state: Mutex<BusState>,
    owner: Arc<LockOwner>,
    lock_wait: Duration,
}

impl BusLock {
    pub fn new(transport: impl BusTransport + 'static, config: &BusConfig) -> Self {
        let owner = Arc::new(LockOwner::default());
        let channel = SerialCommandChannel::new(
            Box::new(transport),
            Arc::clone(&owner),
            config.handshake_timeout(),
        );
        Self {
            state: Mutex::new(BusState {
                channel,
                boards: BoardSlotRegistry::new(),
            }),
            owner,
            lock_wait: config.lock_wait(),
        }
    }

    /// Default bounded wait for command handlers.
    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    /// Wait at most `timeout` for the bus.
    ///
    /// # Errors
    /// Returns `LockBusy` if another thread keeps the bus for the whole wait.
    pub fn try_acquire(&self, timeout: Duration) -> Result<BusGuard<'_>> {
        let state = self
            .state
            .try_lock_for(timeout)
            .ok_or_else(|| HardwareError::busy(timeout.as_millis() as u64))?;
        Ok(self.guard(state))
    }

    /// Acquire with the configured lock wait.
    pub fn acquire(&self) -> Result<BusGuard<'_>> {
        self.try_acquire(self.lock_wait)
    }

    /// Take the bus only if it is free right now.
    pub fn acquire_or_fail(&self) -> Result<BusGuard<'_>> {
        let state = self.state.try_lock().ok_or(HardwareError::busy(0))?;
        Ok(self.guard(state))
    }

    /// Fail with `LockNotHeld` unless the calling thread holds the bus.
    pub fn assert_held_by_caller(&self) -> Result<()> {
        self.owner.assert_held()
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    fn guard<'a>(&'a self, state: MutexGuard<'a, BusState>) -> BusGuard<'a> {
        self.owner.claim();
        BusGuard {
            state,
            owner: &self.owner,
        }
    }
}

impl std::fmt::Debug for BusLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusLock")
            .field("locked", &self.is_locked())
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

/// Proof that the current thread owns the board bus.
///
/// Dropping the guard deselects any selected board and releases the bus.
pub struct BusGuard<'a> {
    state: MutexGuard<'a, BusState>,
    owner: &'a LockOwner,
}

impl std::fmt::Debug for BusGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusGuard").finish_non_exhaustive()
    }
}

impl BusGuard<'_> {
    pub fn channel(&mut self) -> &mut SerialCommandChannel {
        &mut self.state.channel
    }

    pub fn boards(&self) -> &BoardSlotRegistry {
        &self.state.boards
    }

    /// Channel and board table at once.
    pub fn parts(&mut self) -> (&mut SerialCommandChannel, &mut BoardSlotRegistry) {
        let state = &mut *self.state;
        (&mut state.channel, &mut state.boards)
    }

    /// Select a board by its select-line number, `-1` meaning none.
    pub fn select_line(&mut self, line: i32) -> Result<()> {
        let slot = BoardSlot::from_line(line)?;
        self.channel().select(slot)
    }

    /// Ask the board at `slot` what it is and record the answer.
    pub fn identify(&mut self, slot: BoardSlot) -> Result<BoardIdentity> {
        let (channel, boards) = self.parts();
        boards.identify(channel, slot)
    }

    /// Attach a driver of `board_type` to `slot`, replacing any previous one.
    pub fn attach(
        &mut self,
        slot: BoardSlot,
        board_type: BoardType,
        api_revision: u8,
    ) -> Result<BoardIdentity> {
        let (channel, boards) = self.parts();
        boards.attach(channel, slot, board_type, api_revision)
    }

    /// Run `f` against the Solenoid16 driver attached at `slot`.
    pub fn with_solenoid16<T>(
        &mut self,
        slot: BoardSlot,
        f: impl FnOnce(&mut Solenoid16, &mut SerialCommandChannel) -> Result<T>,
    ) -> Result<T> {
        let (channel, boards) = self.parts();
        let board = boards.solenoid16_mut(slot)?;
        f(board, channel)
    }

    /// Deselect and release the bus, reporting a failed deselect.
    pub fn release(mut self) -> Result<()> {
        self.deselect()
    }

    fn deselect(&mut self) -> Result<()> {
        if self.state.channel.selected().is_some() {
            self.state.channel.select(None)?;
        }
        Ok(())
    }
}

impl Drop for BusGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.deselect() {
            warn!(error = %e, "failed to deselect board while releasing the bus");
        }
        self.owner.clear();
    }
}
