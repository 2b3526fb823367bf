//! Failsafe supervision of the clock worker
//!
//! Launches the worker, waits for it, and reacts to how it ended:
//! a clean exit stops supervision, a crash triggers a hardware reset of
//! the panel and a relaunch, and a burst of crashes paints a full-screen
//! alert and gives up.

pub mod child;
pub mod ledger;
pub mod monitor;
pub mod recovery;

pub use child::{ChildProcess, ExitClassification, Launcher, ProcessLauncher, SpawnedChild, WaitOutcome, WorkerCommand};
pub use ledger::{RestartDecision, RestartLedger, RestartPolicy};
pub use monitor::{Clock, Outcome, Supervisor, SupervisorSettings, SupervisorState, SystemClock};
pub use recovery::{HardwarePanel, RecoveryPanel};

use std::io;
use thiserror::Error;

/// Supervisor errors
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to launch `{command}`: {source}")]
    Launch { command: String, source: io::Error },

    #[error("failed to wait for worker: {0}")]
    Wait(io::Error),

    #[error("failed to signal worker: {0}")]
    Signal(io::Error),

    #[error("signal handlers already installed")]
    AlreadyInstalled,
}
