//! Integration tests for the board bus: locking, attach and solenoid
//! commands against simulated boards.

mod common;

use common::{SOLENOID_SLOT, attached_bus, channel, fast_bus_config, slot};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use zpin_core::{
    BoardIdentity, BoardType, Error as CoreError, SolenoidMode, constants::SOLENOID16_API_REVISION,
};
use zpin_hardware::mock::{Fault, SimulatedBus};
use zpin_hardware::{BusLock, HardwareError};

// ============================================================================
// Bus Lock
// ============================================================================

#[test]
fn test_concurrent_fires_never_interleave() {
    let (lock, handle) = attached_bus();
    let workers = 4;
    let fires_per_worker = 25;

    thread::scope(|scope| {
        for worker in 0..workers {
            let lock = Arc::clone(&lock);
            scope.spawn(move || {
                for _ in 0..fires_per_worker {
                    let mut guard = lock.try_acquire(Duration::from_secs(5)).unwrap();
                    guard
                        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| {
                            board.fire(bus, channel(worker))
                        })
                        .unwrap();
                    guard.release().unwrap();
                }
            });
        }
    });

    assert_eq!(handle.collisions(), 0);

    let selections = handle.selections();
    assert_eq!(selections.len() % 2, 0);
    for pair in selections.chunks(2) {
        assert_eq!(pair, [Some(slot(SOLENOID_SLOT)), None]);
    }

    let board = handle.board(slot(SOLENOID_SLOT)).unwrap();
    for worker in 0..workers {
        assert_eq!(board.fire_count(channel(worker)), fires_per_worker as u32);
    }
}

#[test]
fn test_held_bus_reports_busy() {
    let (lock, _handle) = attached_bus();
    let held = Barrier::new(2);
    let checked = Barrier::new(2);

    thread::scope(|scope| {
        scope.spawn(|| {
            let guard = lock.acquire().unwrap();
            held.wait();
            checked.wait();
            drop(guard);
        });

        held.wait();
        let error = lock.try_acquire(Duration::from_millis(5)).unwrap_err();
        assert!(error.is_busy());
        assert!(lock.acquire_or_fail().unwrap_err().is_busy());
        checked.wait();
    });

    assert!(!lock.is_locked());
    lock.acquire().unwrap().release().unwrap();
}

#[test]
fn test_lock_ownership_is_per_thread() {
    let (lock, _handle) = attached_bus();

    assert!(matches!(
        lock.assert_held_by_caller(),
        Err(HardwareError::LockNotHeld)
    ));

    let guard = lock.acquire().unwrap();
    lock.assert_held_by_caller().unwrap();

    thread::scope(|scope| {
        scope
            .spawn(|| {
                assert!(matches!(
                    lock.assert_held_by_caller(),
                    Err(HardwareError::LockNotHeld)
                ));
            })
            .join()
            .unwrap();
    });

    drop(guard);
    assert!(lock.assert_held_by_caller().is_err());
}

#[test]
fn test_dropped_guard_deselects() {
    let (lock, handle) = attached_bus();

    {
        let mut guard = lock.acquire().unwrap();
        guard.select_line(i32::from(SOLENOID_SLOT)).unwrap();
        assert_eq!(handle.selected(), Some(slot(SOLENOID_SLOT)));
    }

    assert_eq!(handle.selected(), None);
    assert!(!lock.is_locked());
}

#[test]
fn test_select_line_rejects_out_of_range() {
    let (lock, _handle) = attached_bus();
    let mut guard = lock.acquire().unwrap();

    assert!(matches!(
        guard.select_line(8),
        Err(HardwareError::Core(CoreError::InvalidSlot(8)))
    ));
    guard.select_line(-1).unwrap();
    assert_eq!(guard.channel().selected(), None);
}

// ============================================================================
// Identify and Attach
// ============================================================================

#[test]
fn test_identify_decodes_solenoid16() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(0));
    let lock = BusLock::new(bus, &fast_bus_config());

    let identity = lock.acquire().unwrap().identify(slot(0)).unwrap();
    assert_eq!(
        identity,
        BoardIdentity {
            board_type: BoardType::Solenoid16,
            hw_revision: 3,
            api_revision: 2,
        }
    );
    assert_eq!(handle.commands_for(slot(0)), vec![vec![0xFE]]);
}

#[test]
fn test_attach_disables_every_channel_in_order() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(1));
    let lock = BusLock::new(bus, &fast_bus_config());

    lock.acquire()
        .unwrap()
        .attach(slot(1), BoardType::Solenoid16, SOLENOID16_API_REVISION)
        .unwrap();

    let commands = handle.commands_for(slot(1));
    assert_eq!(commands.len(), 17);
    assert_eq!(commands[0], vec![0xFE]);
    for (i, payload) in commands[1..].iter().enumerate() {
        assert_eq!(payload, &vec![0x60 | i as u8, 0, 0, 0, 0, 0]);
    }

    let board = handle.board(slot(1)).unwrap();
    for i in 0..16 {
        assert_eq!(board.mode(channel(i)), SolenoidMode::Disabled);
    }
}

#[test]
fn test_wrong_api_revision_leaves_slot_empty() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_board(
        slot(2),
        BoardIdentity {
            board_type: BoardType::Solenoid16,
            hw_revision: 3,
            api_revision: 1,
        },
    );
    let lock = BusLock::new(bus, &fast_bus_config());
    let mut guard = lock.acquire().unwrap();

    let error = guard
        .attach(slot(2), BoardType::Solenoid16, SOLENOID16_API_REVISION)
        .unwrap_err();
    assert!(error.is_identity());
    assert!(matches!(
        error,
        HardwareError::Core(CoreError::WrongApiRevision {
            slot: 2,
            expected: 2,
            actual: 1
        })
    ));
    assert!(guard.boards().identity(slot(2)).is_none());
    assert!(guard.boards().driver(slot(2)).is_none());

    // no channel was touched
    assert_eq!(handle.commands_for(slot(2)), vec![vec![0xFE]]);
}

#[test]
fn test_unknown_board_type_is_fatal() {
    let (lock, handle) = attached_bus();
    handle.inject_fault(slot(SOLENOID_SLOT), Fault::ReplyWith(vec![0x37, 0x02]));

    let mut guard = lock.acquire().unwrap();
    let error = guard
        .attach(slot(SOLENOID_SLOT), BoardType::Solenoid16, SOLENOID16_API_REVISION)
        .unwrap_err();
    assert!(matches!(
        error,
        HardwareError::Core(CoreError::UnknownBoardType { slot: 3, type_id: 7 })
    ));
    assert!(guard.boards().solenoid16(slot(SOLENOID_SLOT)).is_none());
    assert!(matches!(
        guard.with_solenoid16(slot(SOLENOID_SLOT), |_, _| Ok(())),
        Err(HardwareError::Core(CoreError::SlotNotIdentified(3)))
    ));
}

#[test]
fn test_empty_slot_times_out() {
    let (bus, _handle) = SimulatedBus::new();
    let lock = BusLock::new(bus, &fast_bus_config());
    let mut guard = lock.acquire().unwrap();

    let error = guard.identify(slot(5)).unwrap_err();
    assert!(matches!(error, HardwareError::Core(CoreError::Timeout { .. })));
    assert_eq!(guard.channel().selected(), None);
}

// ============================================================================
// Solenoid16 Commands
// ============================================================================

#[test]
fn test_fire_for_payload() {
    let (lock, handle) = attached_bus();

    lock.acquire()
        .unwrap()
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| {
            board.fire_for(bus, channel(4), 50)
        })
        .unwrap();

    assert_eq!(
        handle.commands_for(slot(SOLENOID_SLOT)),
        vec![vec![0x14, 50, 0, 0, 0]]
    );
    let board = handle.board(slot(SOLENOID_SLOT)).unwrap();
    assert_eq!(board.last_fire_for(channel(4)), Some(50));
}

#[test]
fn test_toggle_follows_mirror() {
    let (lock, handle) = attached_bus();
    let mut guard = lock.acquire().unwrap();

    let first = guard
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| board.toggle(bus, channel(7)))
        .unwrap();
    let second = guard
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| board.toggle(bus, channel(7)))
        .unwrap();

    assert!(first);
    assert!(!second);
    assert_eq!(
        handle.commands_for(slot(SOLENOID_SLOT)),
        vec![vec![0x37], vec![0x47]]
    );
}

#[test]
fn test_init_clears_mirror() {
    let (lock, handle) = attached_bus();
    let mut guard = lock.acquire().unwrap();

    let mirrored = guard
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| {
            board.turn_on(bus, channel(2))?;
            board.init_momentary(bus, channel(2), 30)?;
            Ok(board.mirror_state(channel(2)))
        })
        .unwrap();

    assert!(!mirrored);

    let board = handle.board(slot(SOLENOID_SLOT)).unwrap();
    assert_eq!(board.mode(channel(2)), SolenoidMode::Momentary);
    assert!(!board.output(channel(2)));
}

#[test]
fn test_protocol_failure_is_not_retried() {
    let (lock, handle) = attached_bus();
    handle.inject_fault(slot(SOLENOID_SLOT), Fault::RejectChecksum);
    let mut guard = lock.acquire().unwrap();

    let error = guard
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| board.fire(bus, channel(0)))
        .unwrap_err();
    assert!(matches!(
        error,
        HardwareError::Core(CoreError::BoardChecksumFailure)
    ));
    assert_eq!(handle.commands_for(slot(SOLENOID_SLOT)).len(), 1);
    assert_eq!(guard.channel().selected(), None);

    // the next command goes through
    guard
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| board.fire(bus, channel(0)))
        .unwrap();
}

#[test]
fn test_busy_polls_before_ready() {
    let (lock, handle) = attached_bus();
    handle.set_busy_polls(50);

    lock.acquire()
        .unwrap()
        .with_solenoid16(slot(SOLENOID_SLOT), |board, bus| board.fire(bus, channel(1)))
        .unwrap();

    let board = handle.board(slot(SOLENOID_SLOT)).unwrap();
    assert_eq!(board.fire_count(channel(1)), 1);
}

// ============================================================================
// Machine
// ============================================================================

fn machine_config(boards: &str) -> zpin_core::MachineConfig {
    let json = format!(
        r#"{{ "bus": {{ "handshake_timeout_ms": 20, "lock_wait_ms": 20 }}, "boards": {boards} }}"#
    );
    zpin_core::MachineConfig::from_json_str(&json).unwrap()
}

#[test]
fn test_machine_attaches_configured_boards() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(0));
    handle.add_solenoid16(slot(4));

    let machine = zpin_hardware::Machine::new(
        machine_config(r#"[{ "slot": 0, "board_type": "s16" }, { "slot": 4, "board_type": "s16" }]"#),
        bus,
    );
    let attached = machine.attach_boards().unwrap();

    assert_eq!(
        attached.iter().map(|(slot, _)| *slot).collect::<Vec<_>>(),
        [slot(0), slot(4)]
    );
    machine
        .with_solenoid16(slot(4), |board, bus| board.fire_for(bus, channel(9), 25))
        .unwrap();
    assert_eq!(
        handle.board(slot(4)).unwrap().last_fire_for(channel(9)),
        Some(25)
    );
}

#[test]
fn test_machine_attach_stops_at_missing_board() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(0));

    let machine = zpin_hardware::Machine::new(
        machine_config(r#"[{ "slot": 1, "board_type": "s16" }, { "slot": 0, "board_type": "s16" }]"#),
        bus,
    );
    let error = machine.attach_boards().unwrap_err();

    assert!(error.is_protocol());
    assert!(handle.commands_for(slot(0)).is_empty());
    assert!(!machine.bus().is_locked());
}

#[test]
fn test_machine_reinit_board() {
    let (bus, handle) = SimulatedBus::new();
    handle.add_solenoid16(slot(2));
    let machine = zpin_hardware::Machine::new(machine_config("[]"), bus);

    let identity = machine.init_board(slot(2), BoardType::Solenoid16).unwrap();
    assert_eq!(identity.hw_revision, 3);
    assert_eq!(machine.identify(slot(2)).unwrap(), identity);
}

#[test]
fn test_machine_refuses_scanner_for_unscannable_matrix() {
    let (bus, _handle) = SimulatedBus::new();
    let config = zpin_core::MachineConfig {
        matrix: zpin_core::MatrixConfig {
            power_row: 9,
            ..common::quick_matrix()
        },
        ..zpin_core::MachineConfig::default()
    };
    let machine = zpin_hardware::Machine::new(config, bus);

    let (pins, _switches) = zpin_hardware::mock::MockMatrix::new();
    let clock = Arc::new(zpin_hardware::matrix::ManualClock::new());
    let result = machine.start_scanner(pins, clock);
    assert!(matches!(
        result,
        Err(HardwareError::Core(CoreError::Config(_)))
    ));
}
