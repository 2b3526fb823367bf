//! ST7789 clock face with a failsafe supervisor
//!
//! This crate drives an SPI-attached ST7789 TFT controller from Linux
//! userspace and keeps it alive across crashes of the rendering process.
//!
//! # Architecture
//!
//! ```text
//!   failsafe (supervisor)            clock (worker)
//!          │  spawn / wait                │
//!          ├──────────────────────────────┤
//!          │                              ▼
//!          │                      ┌───────────────┐
//!          │                      │  Clock face   │
//!          │                      │ (Framebuffer) │
//!          │                      └───────┬───────┘
//!          ▼                              ▼
//!   ┌─────────────────────────────────────────────┐
//!   │            ST7789 controller driver         │
//!   └──────────────┬─────────────────┬────────────┘
//!                  ▼                 ▼
//!          ┌──────────────┐   ┌──────────────┐
//!          │  Bus (SPI)   │   │ GPIO backend │
//!          │spidev/bitbang│   │ sysfs/native │
//!          └──────────────┘   └──────────────┘
//! ```
//!
//! Only one process touches the bus at a time: the worker while it runs,
//! the supervisor after the worker has been reaped and before the next
//! launch.

pub mod config;
pub mod display;
pub mod hal;
pub mod logging;
pub mod signals;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use config::Config;
pub use display::{AddressWindow, ControllerState, DisplayError, Framebuffer, Orientation, Rgb565, St7789};
pub use signals::ShutdownToken;
pub use supervisor::{Outcome, Supervisor, SupervisorError};
