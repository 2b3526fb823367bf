//! GPIO backends for the panel control lines
//!
//! Controls the data/command, reset and backlight lines of the panel.
//!
//! # Default Pin Assignments (BCM numbering)
//!
//! | GPIO | Function      | Direction |
//! |------|---------------|-----------|
//! | 25   | DC (Data/Cmd) | Output    |
//! | 24   | RST (Reset)   | Output    |
//! | 18   | BL (Backlight)| Output    |
//!
//! Two backends implement [`GpioBackend`]: [`SysfsGpio`] writes through
//! `/sys/class/gpio`, and `NativeGpio` (feature `native-gpio`) maps the
//! BCM2711 registers through rppal. The driver cannot tell them apart.

use std::thread;
use std::time::Duration;
use thiserror::Error;

/// udev needs a moment to apply permissions to a freshly exported pin
const EXPORT_SETTLE: Duration = Duration::from_millis(100);

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Logic level of an output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Minimal GPIO surface the driver needs
pub trait GpioBackend {
    /// Make the pin available to userspace. Exporting an exported pin is a no-op.
    fn export(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Configure the pin direction
    fn set_direction(&mut self, pin: u8, direction: Direction) -> Result<(), GpioError>;

    /// Drive an output pin
    fn write(&mut self, pin: u8, level: Level) -> Result<(), GpioError>;

    /// Hand the pin back to the kernel
    fn unexport(&mut self, _pin: u8) -> Result<(), GpioError> {
        Ok(())
    }
}

impl<T: GpioBackend + ?Sized> GpioBackend for Box<T> {
    fn export(&mut self, pin: u8) -> Result<(), GpioError> {
        (**self).export(pin)
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) -> Result<(), GpioError> {
        (**self).set_direction(pin, direction)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
        (**self).write(pin, level)
    }

    fn unexport(&mut self, pin: u8) -> Result<(), GpioError> {
        (**self).unexport(pin)
    }
}

/// sysfs GPIO backend (`/sys/class/gpio`)
#[derive(Debug, Default, Clone)]
pub struct SysfsGpio;

impl SysfsGpio {
    pub fn new() -> Self {
        Self
    }

    fn pin(pin: u8) -> sysfs_gpio::Pin {
        sysfs_gpio::Pin::new(u64::from(pin))
    }
}

impl GpioBackend for SysfsGpio {
    fn export(&mut self, pin: u8) -> Result<(), GpioError> {
        let handle = Self::pin(pin);
        if handle.is_exported() {
            return Ok(());
        }

        handle
            .export()
            .map_err(|e| GpioError::pin(pin, "export", e))?;
        thread::sleep(EXPORT_SETTLE);
        log::debug!("GPIO {} exported", pin);
        Ok(())
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) -> Result<(), GpioError> {
        let direction = match direction {
            Direction::In => sysfs_gpio::Direction::In,
            Direction::Out => sysfs_gpio::Direction::Out,
        };
        Self::pin(pin)
            .set_direction(direction)
            .map_err(|e| GpioError::pin(pin, "set direction", e))
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
        Self::pin(pin)
            .set_value(level as u8)
            .map_err(|e| GpioError::pin(pin, "write", e))
    }

    fn unexport(&mut self, pin: u8) -> Result<(), GpioError> {
        let handle = Self::pin(pin);
        if !handle.is_exported() {
            return Ok(());
        }

        handle
            .unexport()
            .map_err(|e| GpioError::pin(pin, "unexport", e))?;
        log::debug!("GPIO {} unexported", pin);
        Ok(())
    }
}

/// Register-mapped GPIO backend through rppal
#[cfg(feature = "native-gpio")]
pub struct NativeGpio {
    gpio: rppal::gpio::Gpio,
    outputs: std::collections::HashMap<u8, rppal::gpio::OutputPin>,
}

#[cfg(feature = "native-gpio")]
impl NativeGpio {
    pub fn new() -> Result<Self, GpioError> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| GpioError::Unavailable(e.to_string()))?;
        Ok(Self {
            gpio,
            outputs: std::collections::HashMap::new(),
        })
    }
}

#[cfg(feature = "native-gpio")]
impl GpioBackend for NativeGpio {
    // Register access needs no export step
    fn export(&mut self, _pin: u8) -> Result<(), GpioError> {
        Ok(())
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) -> Result<(), GpioError> {
        let handle = self
            .gpio
            .get(pin)
            .map_err(|e| GpioError::pin(pin, "acquire", e))?;

        match direction {
            Direction::Out => {
                let mut output = handle.into_output();
                output.set_reset_on_drop(false);
                self.outputs.insert(pin, output);
            }
            Direction::In => {
                self.outputs.remove(&pin);
                let mut input = handle.into_input();
                input.set_reset_on_drop(false);
            }
        }
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or(GpioError::NotOutput { pin })?;
        output.write(match level {
            Level::Low => rppal::gpio::Level::Low,
            Level::High => rppal::gpio::Level::High,
        });
        Ok(())
    }

    fn unexport(&mut self, pin: u8) -> Result<(), GpioError> {
        self.outputs.remove(&pin);
        Ok(())
    }
}

/// GPIO-related errors
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("GPIO {pin}: {operation} failed: {message}")]
    Pin {
        pin: u8,
        operation: &'static str,
        message: String,
    },

    #[error("GPIO {pin} is not configured as an output")]
    NotOutput { pin: u8 },
}

impl GpioError {
    pub(crate) fn pin(pin: u8, operation: &'static str, err: impl std::fmt::Display) -> Self {
        GpioError::Pin {
            pin,
            operation,
            message: err.to_string(),
        }
    }
}
