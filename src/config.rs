//! Runtime configuration (TOML)
//!
//! Every field is optional; defaults match the stock wiring of a
//! Raspberry Pi with the panel on SPI0:
//!
//! ```toml
//! [display]
//! spi_device = "/dev/spidev0.0"
//! speed_hz = 32000000
//! bus = "spidev"          # or "bitbang"
//! gpio = "sysfs"          # or "native" (feature `native-gpio`)
//! dc_pin = 25
//! reset_pin = 24
//! backlight_pin = 18
//! orientation = "landscape"
//! clear_on_init = true
//!
//! [display.bitbang]
//! sclk = 11
//! mosi = 10
//! cs = 8
//!
//! [supervisor]
//! restart_window_secs = 60
//! max_restarts = 10
//! recovery_settle_secs = 2
//! alert_hold_secs = 10
//! alert_color = 0xF800
//!
//! [log]
//! supervisor_file = "/tmp/clock_failsafe.log"
//! ```

use crate::display::{Orientation, Rgb565};
use crate::hal::BitBangPins;
use crate::supervisor::RestartPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "ST7789_CLOCK_CONFIG";

/// System-wide configuration file, used when present
pub const SYSTEM_CONFIG: &str = "/etc/st7789-clock.toml";

/// Which bus backend carries commands and pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Spidev,
    Bitbang,
}

/// Which GPIO backend drives the control lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioKind {
    #[default]
    Sysfs,
    Native,
}

/// Panel wiring and controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub spi_device: PathBuf,
    pub speed_hz: u32,
    pub bus: BusKind,
    pub gpio: GpioKind,
    pub dc_pin: u8,
    pub reset_pin: u8,
    pub backlight_pin: Option<u8>,
    pub orientation: Orientation,
    pub clear_on_init: bool,
    /// Pins for `bus = "bitbang"`
    pub bitbang: BitBangPins,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            spi_device: PathBuf::from("/dev/spidev0.0"),
            speed_hz: 32_000_000,
            bus: BusKind::Spidev,
            gpio: GpioKind::Sysfs,
            dc_pin: 25,
            reset_pin: 24,
            backlight_pin: Some(18),
            orientation: Orientation::Landscape,
            clear_on_init: true,
            bitbang: BitBangPins::default(),
        }
    }
}

impl DisplayConfig {
    pub fn with_spi_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.spi_device = path.into();
        self
    }

    pub fn with_bus(mut self, bus: BusKind) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Every GPIO line the panel claims with this wiring
    pub fn claimed_pins(&self) -> Vec<u8> {
        let mut pins = vec![self.dc_pin, self.reset_pin];
        pins.extend(self.backlight_pin);
        if self.bus == BusKind::Bitbang {
            pins.extend([Some(self.bitbang.sclk), Some(self.bitbang.mosi), self.bitbang.cs].into_iter().flatten());
        }
        pins
    }
}

/// Restart policy and recovery timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub restart_window_secs: u64,
    pub max_restarts: u32,
    pub recovery_settle_secs: u64,
    pub alert_hold_secs: u64,
    /// RGB565 value painted on escalation
    pub alert_color: u16,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_window_secs: 60,
            max_restarts: 10,
            recovery_settle_secs: 2,
            alert_hold_secs: 10,
            alert_color: Rgb565::RED.0,
        }
    }
}

impl SupervisorConfig {
    pub fn policy(&self) -> RestartPolicy {
        RestartPolicy {
            window: Duration::from_secs(self.restart_window_secs),
            max_restarts: self.max_restarts,
        }
    }

    pub fn recovery_settle(&self) -> Duration {
        Duration::from_secs(self.recovery_settle_secs)
    }

    pub fn alert_hold(&self) -> Duration {
        Duration::from_secs(self.alert_hold_secs)
    }

    pub fn alert_color(&self) -> Rgb565 {
        Rgb565(self.alert_color)
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }
}

/// Log file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Supervisor log, appended alongside standard output
    pub supervisor_file: Option<PathBuf>,
    /// Worker log; standard output only when unset
    pub worker_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            supervisor_file: Some(PathBuf::from("/tmp/clock_failsafe.log")),
            worker_file: None,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub supervisor: SupervisorConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit path, else `$ST7789_CLOCK_CONFIG`, else the
    /// system file if it exists, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit, env::var_os(CONFIG_ENV).map(PathBuf::from), Path::new(SYSTEM_CONFIG)) {
            Some(path) => {
                log::debug!("Using config {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn locate(explicit: Option<&Path>, from_env: Option<PathBuf>, system: &Path) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or(from_env)
            .or_else(|| system.exists().then(|| system.to_path_buf()))
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }
}
