//! Display driver and graphics primitives
//!
//! Provides the ST7789 controller driver, an RGB565 framebuffer with
//! bounds-checked drawing, the clock face renderer and self-test patterns.

pub mod clock_face;
pub mod font;
pub mod framebuffer;
pub mod patterns;
pub mod st7789;
pub mod window;

pub use framebuffer::{Framebuffer, Rgb565};
pub use st7789::{ControlPins, ControllerState, DisplayError, Orientation, St7789};
pub use window::AddressWindow;

use crate::config::{BusKind, DisplayConfig, GpioKind};
use crate::hal::{BitBangBus, Bus, Delay, GpioBackend, SpiConfig, SpidevBus, StdDelay, SysfsGpio};

/// Driver over the backends chosen at runtime from configuration
pub type Panel = St7789<Box<dyn Bus>, Box<dyn GpioBackend>, StdDelay>;

/// Open the configured bus and GPIO backends and claim the control pins
///
/// The controller itself is not touched; call `initialize` or
/// `hardware_reset` next.
pub fn open(config: &DisplayConfig) -> Result<Panel, DisplayError> {
    let bus: Box<dyn Bus> = match config.bus {
        BusKind::Spidev => Box::new(SpidevBus::open(
            &config.spi_device,
            SpiConfig::DISPLAY.with_speed(config.speed_hz),
            config.dc_pin,
            gpio_backend(config.gpio)?,
        )?),
        BusKind::Bitbang => Box::new(BitBangBus::new(
            gpio_backend(config.gpio)?,
            config.bitbang,
            config.dc_pin,
        )?),
    };

    let pins = ControlPins {
        reset: config.reset_pin,
        backlight: config.backlight_pin,
    };
    let mut panel = St7789::new(bus, gpio_backend(config.gpio)?, StdDelay, pins)
        .with_clear_on_init(config.clear_on_init);
    panel.claim_pins()?;
    Ok(panel)
}

/// Unexport every configured pin through the GPIO backend alone
///
/// The bus is not opened, so this works after the SPI device has gone away.
/// Every pin is attempted; the first failure is reported.
pub fn release_pins(config: &DisplayConfig) -> Result<(), DisplayError> {
    let mut gpio = gpio_backend(config.gpio)?;
    unexport_pins(&mut gpio, config.claimed_pins())
}

fn unexport_pins<G: GpioBackend>(gpio: &mut G, pins: impl IntoIterator<Item = u8>) -> Result<(), DisplayError> {
    let mut first_error = None;
    for pin in pins {
        if let Err(e) = gpio.unexport(pin) {
            log::warn!("{}", e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn gpio_backend(kind: GpioKind) -> Result<Box<dyn GpioBackend>, DisplayError> {
    match kind {
        GpioKind::Sysfs => Ok(Box::new(SysfsGpio::new())),
        #[cfg(feature = "native-gpio")]
        GpioKind::Native => Ok(Box::new(crate::hal::NativeGpio::new()?)),
        #[cfg(not(feature = "native-gpio"))]
        GpioKind::Native => Err(DisplayError::Unsupported("native GPIO (feature `native-gpio`)")),
    }
}

/// Framebuffer-backed display: draw into memory, then `refresh`
pub struct Display<B: Bus, G: GpioBackend, D: Delay> {
    controller: St7789<B, G, D>,
    framebuffer: Framebuffer,
    dirty: bool,
}

impl<B: Bus, G: GpioBackend, D: Delay> Display<B, G, D> {
    /// Wrap an initialized controller; the framebuffer matches its orientation
    pub fn new(controller: St7789<B, G, D>) -> Self {
        let framebuffer = Framebuffer::new(controller.width(), controller.height());
        Self {
            controller,
            framebuffer,
            dirty: true,
        }
    }

    /// Get mutable access to the framebuffer
    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        self.dirty = true;
        &mut self.framebuffer
    }

    pub fn controller(&self) -> &St7789<B, G, D> {
        &self.controller
    }

    /// Stream the framebuffer if it changed since the last refresh
    pub fn refresh(&mut self) -> Result<bool, DisplayError> {
        if !self.dirty {
            return Ok(false);
        }
        self.controller.draw_frame(&self.framebuffer)?;
        self.dirty = false;
        Ok(true)
    }

    /// Release the controller's lines and handles
    pub fn shutdown(&mut self) -> Result<(), DisplayError> {
        self.controller.shutdown()
    }
}
