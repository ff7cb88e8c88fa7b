//! Per-switch debounce automaton.

use serde::Serialize;
use std::fmt;
use zpin_core::{
    Result, SwitchAddress, SwitchConfig, TriggerTarget, constants::DEFAULT_MIN_SWITCH_TIME_MS,
};

/// A stable switch transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchEvent {
    pub row: usize,
    pub col: usize,
    pub state: bool,
    /// Scanner clock at promotion, in milliseconds.
    pub timestamp_ms: f64,
    pub name: Option<String>,
}

impl SwitchEvent {
    pub fn address(&self) -> SwitchAddress {
        SwitchAddress::new(self.row, self.col)
    }
}

/// `row,col=state@timestamp`, the form the text command layer sends.
impl fmt::Display for SwitchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}={}@{}",
            self.row, self.col, self.state, self.timestamp_ms as u64
        )
    }
}

/// One matrix cell and its debounce state.
///
/// The raw state follows the sampled level; the stable state follows the
/// raw state once it has held for `min_on_time` (closing) or `min_off_time`
/// (opening). A switch with `min_on_time == 0` closes on the first pass that
/// sees it closed.
#[derive(Debug, Clone)]
pub struct Switch {
    address: SwitchAddress,
    name: Option<String>,
    inverted: bool,
    min_on_time: f64,
    min_off_time: f64,
    trigger: Option<TriggerTarget>,

    raw_state: bool,
    state: bool,
    raw_last_on_at: f64,
    raw_last_off_at: f64,
}

impl Switch {
    pub fn new(address: SwitchAddress) -> Self {
        Self {
            address,
            name: None,
            inverted: false,
            min_on_time: DEFAULT_MIN_SWITCH_TIME_MS,
            min_off_time: DEFAULT_MIN_SWITCH_TIME_MS,
            trigger: None,
            raw_state: false,
            state: false,
            raw_last_on_at: 0.0,
            raw_last_off_at: 0.0,
        }
    }

    pub fn from_config(config: &SwitchConfig) -> Result<Self> {
        let mut switch = Self::new(config.address());
        switch.apply_config(config)?;
        Ok(switch)
    }

    /// Take thresholds, polarity, name and trigger from `config`.
    ///
    /// Raw and stable state are kept. Nothing changes when `config` has an
    /// invalid threshold or trigger.
    pub fn apply_config(&mut self, config: &SwitchConfig) -> Result<()> {
        config.check_times()?;
        let trigger = config.trigger()?;
        self.name = config.name.clone();
        self.inverted = config.inverted;
        self.min_on_time = config.min_on_time;
        self.min_off_time = config.min_off_time;
        self.trigger = trigger;
        Ok(())
    }

    /// Feed one sampled level taken at `now_ms`.
    ///
    /// Returns the event when the stable state changes.
    pub fn sample(&mut self, level: bool, now_ms: f64) -> Option<SwitchEvent> {
        let sampled = level ^ self.inverted;
        let fast = self.raw_state && !self.state && self.min_on_time == 0.0;

        if sampled != self.raw_state && !fast {
            self.raw_state = sampled;
            if sampled {
                self.raw_last_on_at = now_ms;
            } else {
                self.raw_last_off_at = now_ms;
            }
        }

        if self.raw_state == self.state {
            return None;
        }

        let settled = if self.raw_state {
            now_ms - self.raw_last_on_at >= self.min_on_time
        } else {
            now_ms - self.raw_last_off_at >= self.min_off_time
        };
        if !(fast || settled) {
            return None;
        }

        self.state = self.raw_state;
        Some(SwitchEvent {
            row: self.address.row,
            col: self.address.col,
            state: self.state,
            timestamp_ms: now_ms,
            name: self.name.clone(),
        })
    }

    pub fn address(&self) -> SwitchAddress {
        self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn trigger(&self) -> Option<TriggerTarget> {
        self.trigger
    }

    /// Debounced state.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Last sampled state, before debouncing.
    pub fn raw_state(&self) -> bool {
        self.raw_state
    }
}
