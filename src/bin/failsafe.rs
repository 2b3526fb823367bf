//! Failsafe supervisor for the clock worker
//!
//! ```bash
//! failsafe /usr/local/bin/clock
//! failsafe --config /etc/st7789-clock.toml --log-file /var/log/clock.log -- /usr/local/bin/clock
//! ```
//!
//! Exits 0 when the worker exits cleanly or on SIGINT/SIGTERM, 1 when the
//! restart limit is exceeded or the panel or worker cannot be started.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use st7789_clock::config::BusKind;
use st7789_clock::display;
use st7789_clock::hal::{SpidevBus, SysfsGpio};
use st7789_clock::supervisor::{HardwarePanel, ProcessLauncher, SupervisorSettings, SystemClock, WorkerCommand};
use st7789_clock::{logging, signals, Config, Outcome, ShutdownToken, Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;

/// Failsafe supervisor
///
/// Restarts the worker after crashes, resetting the panel in between, and
/// shows a full-screen alert when crashes come too fast.
#[derive(Parser)]
#[command(name = "failsafe")]
#[command(author = "Prasanna Gautam")]
#[command(version)]
#[command(about = "Supervise the clock worker and recover the ST7789 panel after crashes")]
struct Cli {
    /// Configuration file (default: $ST7789_CLOCK_CONFIG, then /etc/st7789-clock.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append log lines to this file (overrides the configured path)
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Worker command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let log_file = cli.log_file.clone().or_else(|| config.log.supervisor_file.clone());
    logging::init(log_file.as_deref());

    info!("========== Failsafe Monitor Started ==========");
    let code = match run(&cli, &config) {
        Ok(outcome) => {
            info!("Supervision ended: {:?}", outcome);
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };
    info!("========== Failsafe Monitor Stopped ==========");
    code
}

fn run(cli: &Cli, config: &Config) -> Result<Outcome> {
    let command = WorkerCommand::from_argv(&cli.command).context("No worker command given")?;

    let token = ShutdownToken::new();
    signals::install(&token)?;

    if config.display.bus == BusKind::Spidev {
        SpidevBus::<SysfsGpio>::probe(&config.display.spi_device)
            .context("SPI device not available (is SPI enabled?)")?;
        info!("SPI device {} available", config.display.spi_device.display());
    }

    let mut panel = HardwarePanel::new(config.display.clone());
    panel.prepare().context("Failed to set up display GPIO pins")?;
    info!("GPIO pins configured");

    let settings = SupervisorSettings::from(&config.supervisor);
    info!(
        "Restart policy: at most {} restarts per {}s",
        settings.policy.max_restarts,
        settings.policy.window.as_secs()
    );

    let mut supervisor = Supervisor::new(ProcessLauncher, panel, SystemClock, settings, token);
    let outcome = supervisor.run(&command);

    if let Err(e) = display::release_pins(&config.display) {
        warn!("Failed to release GPIO pins: {}", e);
    }
    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_worker_arguments_pass_through() {
        let cli = Cli::parse_from(["failsafe", "--log-file", "/tmp/x.log", "/usr/local/bin/clock", "--verbose", "-n", "3"]);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/x.log")));
        assert_eq!(cli.command, vec!["/usr/local/bin/clock", "--verbose", "-n", "3"]);
        assert!(Cli::try_parse_from(["failsafe"]).is_err());
    }
}
