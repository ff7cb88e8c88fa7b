//! Raspberry Pi backend.
//!
//! Board bus: eight active-low select lines on GPIO outputs and SPI0/CE0 for
//! the data lines. Switch matrix: a shift register (serial out, clock,
//! latch) drives the columns and eight pulled-up inputs read the rows,
//! a closed switch pulling its row low.
//!
//! Pin numbers are BCM.

use crate::matrix::MatrixPins;
use crate::{BusTransport, HardwareError, Result};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::info;
use zpin_core::BoardSlot;

/// Select lines for slots 0..7.
pub const SELECT_PINS: [u8; 8] = [3, 4, 5, 6, 7, 8, 12, 13];

/// Row return inputs for rows 0..7.
pub const ROW_PINS: [u8; 8] = [14, 15, 16, 17, 19, 20, 21, 22];

pub const SHIFT_DATA_PIN: u8 = 26;
pub const SHIFT_CLOCK_PIN: u8 = 25;
pub const SHIFT_LATCH_PIN: u8 = 27;

fn gpio_error(e: rppal::gpio::Error) -> HardwareError {
    HardwareError::gpio(e.to_string())
}

fn spi_error(e: rppal::spi::Error) -> HardwareError {
    HardwareError::gpio(format!("SPI: {e}"))
}

/// Board bus on the Pi's GPIO header.
pub struct PiBus {
    selects: Vec<OutputPin>,
    spi: Spi,
}

impl PiBus {
    /// Claim the select lines (all deasserted) and open SPI at `clock_hz`.
    pub fn new(clock_hz: u32) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_error)?;
        let selects = SELECT_PINS
            .iter()
            .map(|&pin| gpio.get(pin).map(|p| p.into_output_high()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(gpio_error)?;
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0).map_err(spi_error)?;

        info!(clock_hz, "board bus opened on SPI0");
        Ok(Self { selects, spi })
    }
}

impl BusTransport for PiBus {
    fn select(&mut self, slot: Option<BoardSlot>) -> Result<()> {
        let active = slot.map(|s| s.index());
        for (i, pin) in self.selects.iter_mut().enumerate() {
            if Some(i) == active {
                pin.set_low();
            } else {
                pin.set_high();
            }
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.spi.write(bytes).map_err(spi_error)?;
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut input = vec![0u8; len];
        let output = vec![0u8; len];
        self.spi.transfer(&mut input, &output).map_err(spi_error)?;
        Ok(input)
    }
}

/// Switch matrix pins on the Pi's GPIO header.
pub struct PiMatrix {
    rows: Vec<InputPin>,
    data: OutputPin,
    clock: OutputPin,
    latch: OutputPin,
    columns: usize,
}

impl PiMatrix {
    /// Claim the row inputs and the shift register for `columns` columns,
    /// the power-detect column included.
    pub fn new(columns: usize) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_error)?;
        let rows = ROW_PINS
            .iter()
            .map(|&pin| gpio.get(pin).map(|p| p.into_input_pullup()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(gpio_error)?;
        let data = gpio.get(SHIFT_DATA_PIN).map_err(gpio_error)?.into_output_low();
        let clock = gpio.get(SHIFT_CLOCK_PIN).map_err(gpio_error)?.into_output_low();
        let latch = gpio.get(SHIFT_LATCH_PIN).map_err(gpio_error)?.into_output_high();

        Ok(Self {
            rows,
            data,
            clock,
            latch,
            columns,
        })
    }
}

impl MatrixPins for PiMatrix {
    fn select_column(&mut self, column: usize) -> Result<()> {
        self.latch.set_low();
        for i in 0..self.columns {
            self.clock.set_low();
            self.data.write(if i == column { Level::Low } else { Level::High });
            self.clock.set_high();
        }
        self.latch.set_high();
        Ok(())
    }

    fn read_row(&mut self, row: usize) -> Result<bool> {
        let pin = self
            .rows
            .get(row)
            .ok_or_else(|| HardwareError::gpio(format!("no return line for row {row}")))?;
        Ok(pin.is_low())
    }
}
