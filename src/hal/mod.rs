//! Hardware Abstraction Layer for the panel wiring
//!
//! Provides interchangeable backends for:
//! - GPIO pin control (sysfs, or register-mapped through rppal)
//! - the byte-serial bus (spidev block transfers, or bit-banged GPIO)
//! - blocking delays

pub mod bitbang;
pub mod delay;
pub mod gpio;
pub mod spi;

pub use bitbang::{BitBangBus, BitBangPins};
pub use delay::{Delay, StdDelay};
pub use gpio::{Direction, GpioBackend, GpioError, Level, SysfsGpio};
#[cfg(feature = "native-gpio")]
pub use gpio::NativeGpio;
pub use spi::{Bus, BusError, LineSelect, SpiConfig, SpidevBus};
