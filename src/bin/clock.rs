//! Clock worker
//!
//! Takes no arguments. Reads the configuration from `$ST7789_CLOCK_CONFIG`
//! or `/etc/st7789-clock.toml` if present, initializes the panel and redraws
//! the clock face whenever the wall-clock second changes. SIGINT/SIGTERM
//! stop it after the frame in progress.

use anyhow::{Context, Result};
use chrono::Local;
use log::{error, info, warn};
use st7789_clock::display::{self, clock_face, Display};
use st7789_clock::hal::{Bus, Delay, GpioBackend};
use st7789_clock::{logging, signals, Config, ShutdownToken};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let config = match Config::discover(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.log.worker_file.as_deref());

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<()> {
    let token = ShutdownToken::new();
    signals::install(&token)?;

    info!("Digital clock starting on {}", config.display.spi_device.display());
    let mut panel = display::open(&config.display)
        .with_context(|| format!("Cannot open display on {} (is SPI enabled?)", config.display.spi_device.display()))?;

    if let Err(e) = panel.initialize(config.display.orientation) {
        let _ = panel.shutdown();
        return Err(e).context("Display initialization failed");
    }
    info!(
        "Display ready: {}x{} at {} Hz",
        panel.width(),
        panel.height(),
        panel.speed_hz().unwrap_or(0)
    );

    let mut display = Display::new(panel);
    let result = tick(&mut display, &token);

    info!("Shutting down clock");
    if let Err(e) = display.shutdown() {
        warn!("Display release failed: {}", e);
    }
    result
}

/// Redraw once per wall-clock second until shutdown is requested
fn tick<B: Bus, G: GpioBackend, D: Delay>(display: &mut Display<B, G, D>, token: &ShutdownToken) -> Result<()> {
    let mut shown = None;
    while !token.is_cancelled() {
        let now = Local::now();
        let second = now.timestamp();
        if shown != Some(second) {
            clock_face::render(display.framebuffer_mut(), &now.naive_local());
            display.refresh().context("Failed to update display")?;
            shown = Some(second);
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
