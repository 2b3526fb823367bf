//! ST7789 TFT Controller Driver
//!
//! Sequences the controller through reset, wake and configuration, and
//! streams RGB565 pixel data into an address window.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ─► HardwareResetting ─► SoftwareResetting ─► Awake ─► Configured ─► Ready
//!        ▲                                                                            │
//!        └───────────────────────────── shutdown ◄────────────────────────────────────┘
//!
//! any state ── bus/GPIO failure ──► Faulted ── initialize ──► (hardware reset first)
//! ```
//!
//! Every command goes out on the command line select as a single byte;
//! parameters and pixels follow on the data line select. Pixels are
//! big-endian RGB565 words, row-major, directly after RAMWR.

use super::framebuffer::{Framebuffer, Rgb565};
use super::window::AddressWindow;
use crate::hal::{Bus, BusError, Delay, Direction, GpioBackend, GpioError, Level, LineSelect};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter;
use thiserror::Error;

/// ST7789 commands
mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const RDDID: u8 = 0x04; // Read display ID
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13; // Normal display mode
    pub const INVON: u8 = 0x21; // Inversion on
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A; // Column address set
    pub const RASET: u8 = 0x2B; // Row address set
    pub const RAMWR: u8 = 0x2C; // Memory write
    pub const MADCTL: u8 = 0x36; // Memory access control
    pub const COLMOD: u8 = 0x3A; // Interface pixel format
}

/// Settle delays in milliseconds
mod timing {
    pub const RESET_HIGH: u32 = 10;
    pub const RESET_LOW: u32 = 50;
    pub const RESET_RECOVER: u32 = 150;
    pub const SWRESET: u32 = 200;
    pub const SLPOUT: u32 = 120;
    pub const CONFIG: u32 = 10;
    pub const DISPON: u32 = 120;
    pub const BACKLIGHT: u32 = 50;
    pub const PIN_SETUP: u32 = 200;
}

/// 16 bits per pixel, RGB565 on both interfaces
const COLMOD_RGB565: u8 = 0x55;

/// Panel geometry before rotation
pub const NATIVE_WIDTH: u16 = 240;
pub const NATIVE_HEIGHT: u16 = 320;

/// Pixels per bus transfer. Bounds the duration of a single backend call
/// and stays within spidev's default 4096-byte buffer.
pub const PIXEL_CHUNK: usize = 2048;

/// Panel rotation, as programmed through MADCTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
    PortraitInverted,
    LandscapeInverted,
}

impl Orientation {
    /// MADCTL value (MY/MX/MV bits, RGB order)
    pub const fn madctl(self) -> u8 {
        match self {
            Orientation::Portrait => 0x00,
            Orientation::Landscape => 0x60,
            Orientation::PortraitInverted => 0xC0,
            Orientation::LandscapeInverted => 0xA0,
        }
    }

    /// Drawable (width, height) in this orientation
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Orientation::Portrait | Orientation::PortraitInverted => (NATIVE_WIDTH, NATIVE_HEIGHT),
            Orientation::Landscape | Orientation::LandscapeInverted => (NATIVE_HEIGHT, NATIVE_WIDTH),
        }
    }
}

/// Controller protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    HardwareResetting,
    SoftwareResetting,
    Awake,
    Configured,
    Ready,
    Faulted,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Control lines owned by the driver (BCM numbering)
///
/// The data/command line belongs to the bus backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPins {
    pub reset: u8,
    pub backlight: Option<u8>,
}

impl Default for ControlPins {
    fn default() -> Self {
        Self {
            reset: 24,
            backlight: Some(18),
        }
    }
}

/// ST7789 driver
pub struct St7789<B: Bus, G: GpioBackend, D: Delay> {
    bus: B,
    gpio: G,
    delay: D,
    pins: ControlPins,
    state: ControllerState,
    orientation: Orientation,
    clear_on_init: bool,
    /// Window set by the last `set_window`, consumed by the next stream
    window: Option<AddressWindow>,
    released: bool,
}

impl<B: Bus, G: GpioBackend, D: Delay> St7789<B, G, D> {
    /// Create a driver over already-opened backends. No bus traffic happens here.
    pub fn new(bus: B, gpio: G, delay: D, pins: ControlPins) -> Self {
        Self {
            bus,
            gpio,
            delay,
            pins,
            state: ControllerState::Uninitialized,
            orientation: Orientation::default(),
            clear_on_init: true,
            window: None,
            released: false,
        }
    }

    /// Clear the frame to black during `initialize` (default on)
    pub fn with_clear_on_init(mut self, clear: bool) -> Self {
        self.clear_on_init = clear;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Drawable width in the current orientation
    pub fn width(&self) -> u16 {
        self.orientation.dimensions().0
    }

    /// Drawable height in the current orientation
    pub fn height(&self) -> u16 {
        self.orientation.dimensions().1
    }

    pub fn speed_hz(&self) -> Option<u32> {
        self.bus.speed_hz()
    }

    /// Export the reset and backlight lines and make them outputs
    pub fn claim_pins(&mut self) -> Result<(), DisplayError> {
        let result = self.claim_pins_inner();
        self.track(result)
    }

    fn claim_pins_inner(&mut self) -> Result<(), DisplayError> {
        self.ensure_open()?;
        let pins = [Some(self.pins.reset), self.pins.backlight];
        for pin in pins.into_iter().flatten() {
            self.gpio.export(pin)?;
        }
        self.delay.delay_ms(timing::PIN_SETUP);
        for pin in pins.into_iter().flatten() {
            self.gpio.set_direction(pin, Direction::Out)?;
        }
        log::debug!("Control pins ready: RST=GPIO{}, BL={:?}", self.pins.reset, self.pins.backlight);
        Ok(())
    }

    /// Pulse the reset line: HIGH 10 ms, LOW 50 ms, HIGH 150 ms
    ///
    /// Runs from any state and leaves the controller in `HardwareResetting`;
    /// the caller continues with `initialize`.
    pub fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        let result = self.reset_pulse();
        self.track(result)
    }

    fn reset_pulse(&mut self) -> Result<(), DisplayError> {
        self.ensure_open()?;
        self.state = ControllerState::HardwareResetting;
        self.window = None;

        self.gpio.write(self.pins.reset, Level::High)?;
        self.delay.delay_ms(timing::RESET_HIGH);
        self.gpio.write(self.pins.reset, Level::Low)?;
        self.delay.delay_ms(timing::RESET_LOW);
        self.gpio.write(self.pins.reset, Level::High)?;
        self.delay.delay_ms(timing::RESET_RECOVER);
        Ok(())
    }

    /// Bring the controller to `Ready` in the given orientation
    pub fn initialize(&mut self, orientation: Orientation) -> Result<(), DisplayError> {
        let result = self.init_sequence(orientation);
        self.track(result)
    }

    fn init_sequence(&mut self, orientation: Orientation) -> Result<(), DisplayError> {
        self.ensure_open()?;
        log::debug!("Initializing ST7789 from {} ({:?})", self.state, orientation);

        self.backlight(Level::Low)?;

        if matches!(self.state, ControllerState::Uninitialized | ControllerState::Faulted) {
            self.reset_pulse()?;
        }

        self.state = ControllerState::SoftwareResetting;
        self.window = None;
        self.command(cmd::SWRESET)?;
        self.delay.delay_ms(timing::SWRESET);

        self.command(cmd::SLPOUT)?;
        self.delay.delay_ms(timing::SLPOUT);
        self.state = ControllerState::Awake;

        self.command_with_data(cmd::MADCTL, &[orientation.madctl()])?;
        self.delay.delay_ms(timing::CONFIG);
        self.command_with_data(cmd::COLMOD, &[COLMOD_RGB565])?;
        self.delay.delay_ms(timing::CONFIG);
        self.command(cmd::NORON)?;
        self.delay.delay_ms(timing::CONFIG);
        self.command(cmd::INVON)?;
        self.delay.delay_ms(timing::CONFIG);
        self.orientation = orientation;
        self.state = ControllerState::Configured;

        if self.clear_on_init {
            self.fill_inner(Rgb565::BLACK)?;
        }

        self.command(cmd::DISPON)?;
        self.delay.delay_ms(timing::DISPON);

        self.backlight(Level::High)?;
        self.state = ControllerState::Ready;

        log::debug!("ST7789 ready: {}x{}", self.width(), self.height());
        Ok(())
    }

    /// Program the address window and open a memory write
    pub fn set_window(&mut self, window: AddressWindow) -> Result<(), DisplayError> {
        let result = self.set_window_inner(window);
        self.track(result)
    }

    fn set_window_inner(&mut self, window: AddressWindow) -> Result<(), DisplayError> {
        self.ensure_open()?;
        if !matches!(self.state, ControllerState::Configured | ControllerState::Ready) {
            return Err(DisplayError::NotReady(self.state));
        }
        let (width, height) = self.orientation.dimensions();
        if !window.fits(width, height) {
            return Err(DisplayError::InvalidWindow { window, width, height });
        }

        self.window = None;
        self.command_with_data(cmd::CASET, &window.column_bytes())?;
        self.command_with_data(cmd::RASET, &window.row_bytes())?;
        self.command(cmd::RAMWR)?;
        self.window = Some(window);
        Ok(())
    }

    /// Stream pixels into the window set by the preceding `set_window`
    ///
    /// `pixels.len()` must equal the window area. The stream is not
    /// interruptible once started.
    pub fn stream_pixels(&mut self, pixels: &[Rgb565]) -> Result<(), DisplayError> {
        let result = self.stream(pixels.len(), pixels.iter().copied());
        self.track(result)
    }

    fn stream<I>(&mut self, count: usize, pixels: I) -> Result<(), DisplayError>
    where
        I: IntoIterator<Item = Rgb565>,
    {
        self.ensure_open()?;
        let window = self.window.take().ok_or(DisplayError::NoWindow)?;
        if count != window.area() {
            return Err(DisplayError::LengthMismatch {
                expected: window.area(),
                actual: count,
            });
        }

        let mut chunk = [0u8; PIXEL_CHUNK * 2];
        let mut filled = 0;
        for pixel in pixels.into_iter().take(count) {
            BigEndian::write_u16(&mut chunk[filled..filled + 2], pixel.0);
            filled += 2;
            if filled == chunk.len() {
                self.bus.transfer(&chunk, LineSelect::Data)?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.bus.transfer(&chunk[..filled], LineSelect::Data)?;
        }
        Ok(())
    }

    /// Paint the whole frame with one color
    pub fn fill(&mut self, color: Rgb565) -> Result<(), DisplayError> {
        let result = self.fill_inner(color);
        self.track(result)
    }

    fn fill_inner(&mut self, color: Rgb565) -> Result<(), DisplayError> {
        let window = AddressWindow::full(self.width(), self.height());
        self.set_window_inner(window)?;
        self.stream(window.area(), iter::repeat(color))
    }

    /// Stream a framebuffer anchored at the origin
    pub fn draw_frame(&mut self, frame: &Framebuffer) -> Result<(), DisplayError> {
        let result = self
            .set_window_inner(AddressWindow::full(frame.width(), frame.height()))
            .and_then(|()| self.stream(frame.len(), frame.as_slice().iter().copied()));
        self.track(result)
    }

    /// Switch the backlight, if one is wired
    pub fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError> {
        let result = self.ensure_open().and_then(|()| self.backlight(Level::from(on)));
        self.track(result)
    }

    pub fn has_backlight(&self) -> bool {
        self.pins.backlight.is_some()
    }

    /// Read the 4-byte display ID (RDDID). Needs a bus that can read.
    pub fn read_id(&mut self) -> Result<[u8; 4], DisplayError> {
        let result = self.read_id_inner();
        self.track(result)
    }

    fn read_id_inner(&mut self) -> Result<[u8; 4], DisplayError> {
        self.ensure_open()?;
        let mut id = [0u8; 4];
        self.command(cmd::RDDID)?;
        self.bus.read(&mut id)?;
        Ok(id)
    }

    /// Turn the backlight off and release every owned line and handle
    ///
    /// Idempotent. Every release step is attempted; the first failure is reported.
    pub fn shutdown(&mut self) -> Result<(), DisplayError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.window = None;
        self.state = ControllerState::Uninitialized;

        let mut first_error: Option<DisplayError> = None;
        let mut keep = |result: Result<(), DisplayError>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        if let Some(pin) = self.pins.backlight {
            keep(self.gpio.write(pin, Level::Low).map_err(DisplayError::from));
            keep(self.gpio.unexport(pin).map_err(DisplayError::from));
        }
        keep(self.gpio.unexport(self.pins.reset).map_err(DisplayError::from));
        keep(self.bus.release().map_err(DisplayError::from));

        log::debug!("ST7789 released");
        first_error.map_or(Ok(()), Err)
    }

    fn ensure_open(&self) -> Result<(), DisplayError> {
        if self.released {
            Err(DisplayError::Released)
        } else {
            Ok(())
        }
    }

    fn backlight(&mut self, level: Level) -> Result<(), DisplayError> {
        if let Some(pin) = self.pins.backlight {
            self.gpio.write(pin, level)?;
            self.delay.delay_ms(timing::BACKLIGHT);
        }
        Ok(())
    }

    fn command(&mut self, command: u8) -> Result<(), BusError> {
        self.bus.transfer(&[command], LineSelect::Command)
    }

    fn command_with_data(&mut self, command: u8, data: &[u8]) -> Result<(), BusError> {
        self.command(command)?;
        self.bus.transfer(data, LineSelect::Data)
    }

    /// Move to `Faulted` when the hardware stopped answering
    fn track<T>(&mut self, result: Result<T, DisplayError>) -> Result<T, DisplayError> {
        if let Err(e) = &result {
            if e.is_communication() {
                log::warn!("ST7789 faulted in {}: {}", self.state, e);
                self.state = ControllerState::Faulted;
                self.window = None;
            }
        }
        result
    }
}

/// Display errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("bus communication failed: {0}")]
    Communication(#[from] BusError),

    #[error("control line failed: {0}")]
    Gpio(#[from] GpioError),

    #[error("window {window} outside {width}x{height} frame")]
    InvalidWindow {
        window: AddressWindow,
        width: u16,
        height: u16,
    },

    #[error("pixel count {actual} does not match window area {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("pixel stream without a preceding set_window")]
    NoWindow,

    #[error("controller not ready (state {0})")]
    NotReady(ControllerState),

    #[error("display has been shut down")]
    Released,

    #[error("{0} support not compiled in")]
    Unsupported(&'static str),
}

impl DisplayError {
    /// Bus or GPIO failure, as opposed to a caller error
    pub fn is_communication(&self) -> bool {
        match self {
            DisplayError::Communication(BusError::ReadUnsupported) => false,
            DisplayError::Communication(_) | DisplayError::Gpio(_) => true,
            _ => false,
        }
    }
}
