//! Byte-serial bus to the panel controller
//!
//! Every transfer carries a line select: the controller samples the
//! data/command line to tell command bytes from their parameters or
//! pixel data. Transfers are blocking and return only on completion.
//!
//! [`SpidevBus`] does block transfers through the kernel's spidev
//! character device. The bit-banged alternative lives in
//! [`super::bitbang`].

use super::gpio::{Direction, GpioBackend, GpioError, Level};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Meaning of the bytes in a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSelect {
    /// DC low: a single command byte
    Command,
    /// DC high: parameters or pixel data
    Data,
}

impl LineSelect {
    pub fn level(self) -> Level {
        match self {
            LineSelect::Command => Level::Low,
            LineSelect::Data => Level::High,
        }
    }
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Clock speed in Hz
    pub speed_hz: u32,
    /// SPI mode (0-3)
    pub mode: u8,
    /// Bits per word
    pub bits_per_word: u8,
}

impl SpiConfig {
    /// 32 MHz, mode 0 (ST7789 write cycle is 66 ns minimum)
    pub const DISPLAY: Self = Self {
        speed_hz: 32_000_000,
        mode: 0,
        bits_per_word: 8,
    };

    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    fn mode_flags(&self) -> SpiModeFlags {
        match self.mode {
            1 => SpiModeFlags::SPI_MODE_1,
            2 => SpiModeFlags::SPI_MODE_2,
            3 => SpiModeFlags::SPI_MODE_3,
            _ => SpiModeFlags::SPI_MODE_0,
        }
    }
}

/// Byte-oriented, blocking bus to the controller
pub trait Bus {
    /// Send `bytes` with the given line select. Returns once the transfer completed.
    fn transfer(&mut self, bytes: &[u8], line: LineSelect) -> Result<(), BusError>;

    /// Clock speed, if the backend controls one
    fn speed_hz(&self) -> Option<u32>;

    /// Read bytes back from the controller (after a read command)
    fn read(&mut self, _buffer: &mut [u8]) -> Result<(), BusError> {
        Err(BusError::ReadUnsupported)
    }

    /// Release pins and handles owned by the bus
    fn release(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn transfer(&mut self, bytes: &[u8], line: LineSelect) -> Result<(), BusError> {
        (**self).transfer(bytes, line)
    }

    fn speed_hz(&self) -> Option<u32> {
        (**self).speed_hz()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        (**self).read(buffer)
    }

    fn release(&mut self) -> Result<(), BusError> {
        (**self).release()
    }
}

/// Block-transfer bus through `/dev/spidevX.Y`
pub struct SpidevBus<G: GpioBackend> {
    spi: Spidev,
    config: SpiConfig,
    gpio: G,
    dc_pin: u8,
    /// Last level driven on DC; sysfs writes are slow, skip redundant ones
    line: Option<LineSelect>,
}

impl<G: GpioBackend> SpidevBus<G> {
    /// Open and configure the SPI device, and claim the data/command pin
    pub fn open(path: &Path, config: SpiConfig, dc_pin: u8, mut gpio: G) -> Result<Self, BusError> {
        let mut spi = Spidev::open(path).map_err(|source| BusError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let options = SpidevOptions::new()
            .bits_per_word(config.bits_per_word)
            .max_speed_hz(config.speed_hz)
            .mode(config.mode_flags())
            .build();
        spi.configure(&options).map_err(BusError::Configure)?;

        gpio.export(dc_pin)?;
        gpio.set_direction(dc_pin, Direction::Out)?;

        log::debug!(
            "SPI initialized: {} at {}Hz, mode {}, DC=GPIO{}",
            path.display(),
            config.speed_hz,
            config.mode,
            dc_pin
        );

        Ok(Self {
            spi,
            config,
            gpio,
            dc_pin,
            line: None,
        })
    }

    /// Check that the SPI device can be opened, without keeping it
    pub fn probe(path: &Path) -> Result<(), BusError> {
        Spidev::open(path)
            .map(drop)
            .map_err(|source| BusError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    fn select(&mut self, line: LineSelect) -> Result<(), BusError> {
        if self.line != Some(line) {
            self.gpio.write(self.dc_pin, line.level())?;
            self.line = Some(line);
        }
        Ok(())
    }
}

impl<G: GpioBackend> Bus for SpidevBus<G> {
    fn transfer(&mut self, bytes: &[u8], line: LineSelect) -> Result<(), BusError> {
        self.select(line)?;
        if bytes.is_empty() {
            return Ok(());
        }

        let mut transfer = SpidevTransfer::write(bytes);
        self.spi.transfer(&mut transfer).map_err(BusError::Transfer)
    }

    fn speed_hz(&self) -> Option<u32> {
        Some(self.config.speed_hz)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        self.select(LineSelect::Data)?;
        let mut transfer = SpidevTransfer::read(buffer);
        self.spi.transfer(&mut transfer).map_err(BusError::Transfer)
    }

    fn release(&mut self) -> Result<(), BusError> {
        self.line = None;
        self.gpio.unexport(self.dc_pin)?;
        Ok(())
    }
}

/// Bus errors
#[derive(Error, Debug)]
pub enum BusError {
    #[error("cannot open SPI device {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot configure SPI device: {0}")]
    Configure(io::Error),

    #[error("SPI transfer failed: {0}")]
    Transfer(io::Error),

    #[error("line select failed: {0}")]
    LineSelect(#[from] GpioError),

    #[error("bus backend cannot read from the controller")]
    ReadUnsupported,
}
