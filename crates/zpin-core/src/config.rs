//! Machine configuration.
//!
//! The configuration is supplied once at startup (usually from a JSON file)
//! and is never written back. It describes which boards are expected on the
//! bus, how the switch matrix is wired, and how every switch is debounced.
//!
//! # Example
//!
//! ```
//! use zpin_core::MachineConfig;
//!
//! let config = MachineConfig::from_json_str(r#"{
//!     "boards": [{ "slot": 0, "board_type": "s16" }],
//!     "switches": [
//!         { "row": 2, "col": 3, "name": "left sling", "trigger_board": 0, "trigger_channel": 4 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.boards.len(), 1);
//! assert_eq!(config.switches[0].name.as_deref(), Some("left sling"));
//! ```

use crate::{
    BoardSlot, BoardType, Result, SolenoidChannel, SwitchAddress, TriggerTarget,
    constants::*,
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Environment variable that forces the bus mode (`physical` or `simulated`).
pub const BUS_MODE_ENV: &str = "ZPIN_BUS_MODE";

/// Complete configuration consumed by the hardware kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub bus: BusConfig,
    pub matrix: MatrixConfig,
    pub boards: Vec<BoardConfig>,
    pub switches: Vec<SwitchConfig>,
}

impl MachineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed JSON and `Error::Config`
    /// when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MachineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`MachineConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Apply the [`BUS_MODE_ENV`] override, if set.
    ///
    /// # Errors
    /// Returns `Error::Config` if the variable holds an unknown mode.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(BUS_MODE_ENV) {
            self.bus.mode = value.parse()?;
        }
        Ok(())
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.matrix.validate()?;

        let mut slots = HashSet::new();
        for board in &self.boards {
            if !slots.insert(board.slot) {
                return Err(Error::Config(format!(
                    "board slot {} configured twice",
                    board.slot
                )));
            }
        }

        let mut addresses = HashSet::new();
        for switch in &self.switches {
            let address = switch.address();
            if !self.matrix.contains(address) {
                return Err(Error::Config(format!(
                    "switch {address} is outside the {}x{} matrix",
                    self.matrix.rows,
                    self.matrix.column_count()
                )));
            }
            if !addresses.insert(address) {
                return Err(Error::Config(format!("switch {address} configured twice")));
            }
            switch.check_times()?;
            if let Some(target) = switch.trigger()?
                && !slots.contains(&target.slot)
            {
                return Err(Error::Config(format!(
                    "switch {address} triggers board {} which is not configured",
                    target.slot
                )));
            }
        }

        Ok(())
    }
}

/// How bytes reach the satellite boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusMode {
    /// Real select lines and SPI transfers.
    #[default]
    Physical,
    /// Frames are shown to an operator who types the board's reply.
    Simulated,
}

impl std::str::FromStr for BusMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physical" | "live" => Ok(BusMode::Physical),
            "simulated" | "sim" => Ok(BusMode::Simulated),
            other => Err(Error::Config(format!("unknown bus mode '{other}'"))),
        }
    }
}

/// Board bus timing and mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub mode: BusMode,

    /// How long to poll for a READY status byte after sending a frame.
    pub handshake_timeout_ms: u64,

    /// Bounded wait command handlers use when acquiring the bus.
    pub lock_wait_ms: u64,

    pub spi_clock_hz: u32,
}

impl BusConfig {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    #[must_use]
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: BusMode::Physical,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
            spi_clock_hz: DEFAULT_SPI_CLOCK_HZ,
        }
    }
}

/// Switch matrix geometry and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub rows: usize,

    /// Real columns; the power-detect pseudo column comes after them.
    pub columns: usize,

    /// Whether an extra column carries the power-detect line.
    pub power_detect: bool,

    /// Row of the power-detect column that carries the signal.
    pub power_row: usize,

    pub settle_us: u64,
    pub slow_settle_us: u64,

    /// Leading columns that use `slow_settle_us`.
    pub slow_columns: usize,

    /// Bounded bus-lock wait for scanner-driven triggers.
    pub trigger_wait_ms: u64,
}

impl MatrixConfig {
    /// Columns driven per pass, including the power-detect pseudo column.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns + usize::from(self.power_detect)
    }

    /// Column index of the power-detect pseudo column.
    #[must_use]
    pub fn power_column(&self) -> Option<usize> {
        self.power_detect.then_some(self.columns)
    }

    /// Address of the power-detect pseudo-switch.
    #[must_use]
    pub fn power_address(&self) -> Option<SwitchAddress> {
        self.power_column()
            .map(|col| SwitchAddress::new(self.power_row, col))
    }

    /// Whether `address` names a real cell or the power-detect pseudo-switch.
    #[must_use]
    pub fn contains(&self, address: SwitchAddress) -> bool {
        (address.row < self.rows && address.col < self.columns)
            || self.power_address() == Some(address)
    }

    /// Settle delay after driving `column`.
    #[must_use]
    pub fn settle_for(&self, column: usize) -> Duration {
        if column < self.slow_columns {
            Duration::from_micros(self.slow_settle_us)
        } else {
            Duration::from_micros(self.settle_us)
        }
    }

    #[must_use]
    pub fn trigger_wait(&self) -> Duration {
        Duration::from_millis(self.trigger_wait_ms)
    }

    /// Check that the geometry can be scanned.
    ///
    /// # Errors
    /// Returns `Error::Config` for an empty matrix or a power row outside
    /// the matrix rows.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(Error::Config("switch matrix must have rows and columns".into()));
        }
        if self.power_detect && self.power_row >= self.rows {
            return Err(Error::Config(format!(
                "power row {} is outside the {} matrix rows",
                self.power_row, self.rows
            )));
        }
        Ok(())
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_MATRIX_ROWS,
            columns: DEFAULT_MATRIX_COLUMNS,
            power_detect: true,
            power_row: 0,
            settle_us: DEFAULT_SETTLE_US,
            slow_settle_us: DEFAULT_SLOW_SETTLE_US,
            slow_columns: DEFAULT_SLOW_COLUMNS,
            trigger_wait_ms: DEFAULT_TRIGGER_WAIT_MS,
        }
    }
}

/// A board expected at a bus slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub slot: BoardSlot,
    pub board_type: BoardType,
    #[serde(default = "default_api_revision")]
    pub api_revision: u8,
}

fn default_api_revision() -> u8 {
    SOLENOID16_API_REVISION
}

/// Debounce and trigger settings for one switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default = "default_min_time")]
    pub min_on_time: f64,
    #[serde(default = "default_min_time")]
    pub min_off_time: f64,
    #[serde(default)]
    pub trigger_board: Option<u8>,
    #[serde(default)]
    pub trigger_channel: Option<u8>,
}

fn default_min_time() -> f64 {
    DEFAULT_MIN_SWITCH_TIME_MS
}

impl SwitchConfig {
    /// Configuration with default thresholds and no trigger.
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            name: None,
            inverted: false,
            min_on_time: DEFAULT_MIN_SWITCH_TIME_MS,
            min_off_time: DEFAULT_MIN_SWITCH_TIME_MS,
            trigger_board: None,
            trigger_channel: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_times(mut self, min_on_time: f64, min_off_time: f64) -> Self {
        self.min_on_time = min_on_time;
        self.min_off_time = min_off_time;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn with_trigger(mut self, slot: BoardSlot, channel: SolenoidChannel) -> Self {
        self.trigger_board = Some(slot.as_u8());
        self.trigger_channel = Some(channel.as_u8());
        self
    }

    #[must_use]
    pub fn address(&self) -> SwitchAddress {
        SwitchAddress::new(self.row, self.col)
    }

    /// Reject negative or NaN debounce thresholds.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the switch.
    pub fn check_times(&self) -> Result<()> {
        let valid = |t: f64| !t.is_nan() && t >= 0.0;
        if valid(self.min_on_time) && valid(self.min_off_time) {
            return Ok(());
        }
        Err(Error::Config(format!(
            "switch {} has an invalid debounce time",
            self.address()
        )))
    }

    /// Resolve the trigger fields into a validated target.
    ///
    /// # Errors
    /// Returns `Error::Config` if only one of board/channel is set, or the
    /// slot/channel errors if either is out of range.
    pub fn trigger(&self) -> Result<Option<TriggerTarget>> {
        match (self.trigger_board, self.trigger_channel) {
            (None, None) => Ok(None),
            (Some(board), Some(channel)) => Ok(Some(TriggerTarget {
                slot: BoardSlot::new(board)?,
                channel: SolenoidChannel::new(channel)?,
            })),
            _ => Err(Error::Config(format!(
                "switch {} needs both trigger_board and trigger_channel",
                self.address()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.bus.handshake_timeout_ms, DEFAULT_HANDSHAKE_TIMEOUT_MS);
        assert_eq!(config.bus.lock_wait_ms, DEFAULT_LOCK_WAIT_MS);
        assert_eq!(config.matrix.column_count(), 9);
        assert_eq!(config.matrix.power_column(), Some(8));
        assert!(config.boards.is_empty());
    }

    #[test]
    fn test_switch_defaults_from_json() {
        let config = MachineConfig::from_json_str(
            r#"{ "switches": [{ "row": 1, "col": 2 }] }"#,
        )
        .unwrap();
        let switch = &config.switches[0];
        assert_eq!(switch.min_on_time, DEFAULT_MIN_SWITCH_TIME_MS);
        assert_eq!(switch.min_off_time, DEFAULT_MIN_SWITCH_TIME_MS);
        assert!(!switch.inverted);
        assert_eq!(switch.trigger().unwrap(), None);
    }

    #[test]
    fn test_board_defaults_api_revision() {
        let config =
            MachineConfig::from_json_str(r#"{ "boards": [{ "slot": 3, "board_type": "s16" }] }"#)
                .unwrap();
        assert_eq!(config.boards[0].api_revision, SOLENOID16_API_REVISION);
        assert_eq!(config.boards[0].board_type, BoardType::Solenoid16);
    }

    #[rstest]
    #[case(r#"{ "boards": [{ "slot": 1, "board_type": "s16" }, { "slot": 1, "board_type": "s16" }] }"#)]
    #[case(r#"{ "switches": [{ "row": 8, "col": 0 }] }"#)]
    #[case(r#"{ "switches": [{ "row": 0, "col": 0 }, { "row": 0, "col": 0 }] }"#)]
    #[case(r#"{ "switches": [{ "row": 0, "col": 0, "trigger_board": 2, "trigger_channel": 1 }] }"#)]
    #[case(r#"{ "boards": [{ "slot": 2, "board_type": "s16" }], "switches": [{ "row": 0, "col": 0, "trigger_board": 2 }] }"#)]
    #[case(r#"{ "switches": [{ "row": 0, "col": 0, "min_on_time": -1.0 }] }"#)]
    fn test_invalid_configs(#[case] json: &str) {
        assert!(matches!(
            MachineConfig::from_json_str(json),
            Err(Error::Config(_))
        ));
    }

    #[rstest]
    #[case(f64::NAN, 1.0)]
    #[case(1.0, f64::NAN)]
    #[case(0.0, -0.5)]
    fn test_check_times_rejects(#[case] min_on: f64, #[case] min_off: f64) {
        let switch = SwitchConfig::new(0, 0).with_times(min_on, min_off);
        assert!(matches!(switch.check_times(), Err(Error::Config(_))));
        assert!(SwitchConfig::new(0, 0).with_times(0.0, 0.0).check_times().is_ok());
    }

    #[test]
    fn test_matrix_validate_rejects_power_row_outside_rows() {
        let matrix = MatrixConfig {
            power_row: 8,
            ..MatrixConfig::default()
        };
        assert!(matches!(matrix.validate(), Err(Error::Config(_))));
        assert!(MatrixConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_slot_is_parse_error() {
        let result = MachineConfig::from_json_str(r#"{ "boards": [{ "slot": 8, "board_type": "s16" }] }"#);
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_power_switch_address_is_valid() {
        let config =
            MachineConfig::from_json_str(r#"{ "switches": [{ "row": 0, "col": 8, "min_on_time": 0 }] }"#)
                .unwrap();
        assert_eq!(config.switches[0].min_on_time, 0.0);
        let bad = MachineConfig::from_json_str(r#"{ "switches": [{ "row": 1, "col": 8 }] }"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_trigger_resolution() {
        let slot = BoardSlot::new(0).unwrap();
        let channel = SolenoidChannel::new(4).unwrap();
        let switch = SwitchConfig::new(2, 3).with_trigger(slot, channel);
        assert_eq!(
            switch.trigger().unwrap(),
            Some(TriggerTarget { slot, channel })
        );
    }

    #[test]
    fn test_settle_is_longer_for_leading_columns() {
        let matrix = MatrixConfig::default();
        assert!(matrix.settle_for(0) > matrix.settle_for(DEFAULT_SLOW_COLUMNS));
    }

    #[rstest]
    #[case("simulated", BusMode::Simulated)]
    #[case("Sim", BusMode::Simulated)]
    #[case("physical", BusMode::Physical)]
    fn test_bus_mode_parse(#[case] input: &str, #[case] expected: BusMode) {
        assert_eq!(input.parse::<BusMode>().unwrap(), expected);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.json");
        std::fs::write(&path, r#"{ "bus": { "mode": "simulated", "handshake_timeout_ms": 10 } }"#)
            .unwrap();
        let config = MachineConfig::load(&path).unwrap();
        assert_eq!(config.bus.mode, BusMode::Simulated);
        assert_eq!(config.bus.handshake_timeout_ms, 10);
        assert_eq!(config.bus.lock_wait_ms, DEFAULT_LOCK_WAIT_MS);
    }
}
