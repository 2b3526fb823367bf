//! Bit-banged SPI over plain GPIO lines
//!
//! Mode 0 (clock idles low, data sampled on the rising edge), MSB first.
//! Used when the SPI peripheral is unavailable or claimed by something
//! else. Throughput is whatever the GPIO backend can toggle.

use super::gpio::{Direction, GpioBackend, Level};
use super::spi::{Bus, BusError, LineSelect};
use serde::{Deserialize, Serialize};

/// Pins used for the bit-banged bus (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitBangPins {
    /// Serial clock
    pub sclk: u8,
    /// Controller data in
    pub mosi: u8,
    /// Chip select, active low; `None` when tied low on the board
    pub cs: Option<u8>,
}

impl Default for BitBangPins {
    fn default() -> Self {
        // SPI0 pins, driven as plain GPIO
        Self {
            sclk: 11,
            mosi: 10,
            cs: Some(8),
        }
    }
}

/// GPIO bit-banged implementation of [`Bus`]
pub struct BitBangBus<G: GpioBackend> {
    gpio: G,
    pins: BitBangPins,
    dc_pin: u8,
}

impl<G: GpioBackend> BitBangBus<G> {
    /// Claim the clock, data, chip-select and data/command pins and park them idle
    pub fn new(mut gpio: G, pins: BitBangPins, dc_pin: u8) -> Result<Self, BusError> {
        for pin in Self::claimed(&pins, dc_pin) {
            gpio.export(pin)?;
            gpio.set_direction(pin, Direction::Out)?;
        }

        gpio.write(pins.sclk, Level::Low)?;
        if let Some(cs) = pins.cs {
            gpio.write(cs, Level::High)?;
        }

        log::debug!(
            "Bit-bang bus: SCLK=GPIO{}, MOSI=GPIO{}, CS={:?}, DC=GPIO{}",
            pins.sclk,
            pins.mosi,
            pins.cs,
            dc_pin
        );

        Ok(Self { gpio, pins, dc_pin })
    }

    fn claimed(pins: &BitBangPins, dc_pin: u8) -> impl Iterator<Item = u8> {
        [Some(pins.sclk), Some(pins.mosi), pins.cs, Some(dc_pin)]
            .into_iter()
            .flatten()
    }

    fn shift_out(&mut self, byte: u8) -> Result<(), BusError> {
        for bit in (0..8).rev() {
            self.gpio
                .write(self.pins.mosi, Level::from(byte & (1 << bit) != 0))?;
            self.gpio.write(self.pins.sclk, Level::High)?;
            self.gpio.write(self.pins.sclk, Level::Low)?;
        }
        Ok(())
    }
}

impl<G: GpioBackend> Bus for BitBangBus<G> {
    fn transfer(&mut self, bytes: &[u8], line: LineSelect) -> Result<(), BusError> {
        self.gpio.write(self.dc_pin, line.level())?;
        if bytes.is_empty() {
            return Ok(());
        }

        if let Some(cs) = self.pins.cs {
            self.gpio.write(cs, Level::Low)?;
        }
        for &byte in bytes {
            self.shift_out(byte)?;
        }
        if let Some(cs) = self.pins.cs {
            self.gpio.write(cs, Level::High)?;
        }
        Ok(())
    }

    fn speed_hz(&self) -> Option<u32> {
        None
    }

    fn release(&mut self) -> Result<(), BusError> {
        for pin in Self::claimed(&self.pins, self.dc_pin) {
            self.gpio.unexport(pin)?;
        }
        Ok(())
    }
}
