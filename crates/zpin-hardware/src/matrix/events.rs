use crate::matrix::SwitchEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Unbounded FIFO of switch events.
///
/// The scanner is the only producer. Events are never reordered or
/// coalesced; a drain returns everything queued so far in arrival order.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<SwitchEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: SwitchEvent) {
        self.events.lock().push_back(event);
    }

    pub fn pop(&self) -> Option<SwitchEvent> {
        self.events.lock().pop_front()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<SwitchEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
