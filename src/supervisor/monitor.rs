//! Supervisor state machine
//!
//! ```text
//! Idle ─► Launching ─► Monitoring ─┬─ clean exit ─────────────────────────► Stopped
//!             ▲                    ├─ crash, within budget ─► Recovering ─┐
//!             └────────────────────┼──────────────────────────────────────┘
//!                                  └─ crash, budget exceeded ─► Escalating ─► Stopped
//! ```
//!
//! The only blocking point is the wait on the worker. The panel is touched
//! only between reaping one worker and launching the next.

use super::child::{ChildProcess, ExitClassification, Launcher, WaitOutcome, WorkerCommand};
use super::ledger::{RestartDecision, RestartLedger, RestartPolicy};
use super::recovery::RecoveryPanel;
use super::SupervisorError;
use crate::config::SupervisorConfig;
use crate::display::Rgb565;
use crate::signals::ShutdownToken;
use log::{error, info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Source of time for the restart window and the fixed waits
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Launching,
    Monitoring,
    Recovering,
    Escalating,
    Stopped,
}

/// Why supervision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Worker exited with status 0
    CleanExit,
    /// SIGINT/SIGTERM received; worker was asked to stop and reaped
    ShutdownRequested,
    /// Restart budget exhausted; alert shown
    Escalated,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Outcome::Escalated)
    }
}

/// Restart policy plus the fixed recovery and alert timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub policy: RestartPolicy,
    pub recovery_settle: Duration,
    pub alert_hold: Duration,
    pub alert_color: Rgb565,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&SupervisorConfig::default())
    }
}

impl From<&SupervisorConfig> for SupervisorSettings {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            policy: config.policy(),
            recovery_settle: config.recovery_settle(),
            alert_hold: config.alert_hold(),
            alert_color: config.alert_color(),
        }
    }
}

/// Failsafe supervisor for one worker command
pub struct Supervisor<L: Launcher, P: RecoveryPanel, C: Clock> {
    launcher: L,
    panel: P,
    clock: C,
    settings: SupervisorSettings,
    token: ShutdownToken,
    ledger: RestartLedger,
    state: SupervisorState,
}

impl<L: Launcher, P: RecoveryPanel, C: Clock> Supervisor<L, P, C> {
    pub fn new(launcher: L, panel: P, clock: C, settings: SupervisorSettings, token: ShutdownToken) -> Self {
        Self {
            launcher,
            panel,
            clock,
            settings,
            token,
            ledger: RestartLedger::new(),
            state: SupervisorState::Idle,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn ledger(&self) -> &RestartLedger {
        &self.ledger
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    /// Supervise `command` until it exits cleanly, shutdown is requested,
    /// or the restart budget runs out
    pub fn run(&mut self, command: &WorkerCommand) -> Result<Outcome, SupervisorError> {
        loop {
            if self.token.is_cancelled() {
                self.transition(SupervisorState::Stopped);
                return Ok(Outcome::ShutdownRequested);
            }

            self.transition(SupervisorState::Launching);
            info!("Starting: {}", command);
            let mut child = match self.launcher.launch(command) {
                Ok(child) => child,
                Err(e) => {
                    error!("{}", e);
                    self.transition(SupervisorState::Stopped);
                    return Err(e);
                }
            };
            info!("Worker started (PID {})", child.id());

            self.transition(SupervisorState::Monitoring);
            let how = match self.monitor(&mut child) {
                Ok(how) => how,
                Err(e) => {
                    error!("Lost track of worker (PID {}): {}", child.id(), e);
                    self.transition(SupervisorState::Stopped);
                    return Err(e);
                }
            };
            info!("Worker (PID {}) {}", child.id(), how);

            if self.token.is_cancelled() {
                self.transition(SupervisorState::Stopped);
                return Ok(Outcome::ShutdownRequested);
            }

            if !how.is_crash() {
                self.transition(SupervisorState::Stopped);
                return Ok(Outcome::CleanExit);
            }

            match self.ledger.record_crash(self.clock.now(), &self.settings.policy) {
                RestartDecision::Recover { count } => {
                    warn!(
                        "Crash {} of {} allowed within {}s",
                        count,
                        self.settings.policy.max_restarts,
                        self.settings.policy.window.as_secs()
                    );
                    self.recover();
                }
                RestartDecision::Escalate { count } => {
                    error!(
                        "Too many restarts ({} within {}s), giving up",
                        count,
                        self.settings.policy.window.as_secs()
                    );
                    self.escalate();
                    return Ok(Outcome::Escalated);
                }
            }
        }
    }

    /// Wait for the child, forwarding a shutdown request to it once
    fn monitor(&mut self, child: &mut L::Child) -> Result<ExitClassification, SupervisorError> {
        let mut forwarded = false;
        loop {
            if self.token.is_cancelled() && !forwarded {
                info!("Shutdown requested, sending SIGTERM to worker (PID {})", child.id());
                child.terminate()?;
                forwarded = true;
            }

            match child.wait()? {
                WaitOutcome::Terminated(how) => return Ok(how),
                WaitOutcome::Interrupted => continue,
            }
        }
    }

    /// Put the panel back into a known electrical state; the next worker initializes it
    fn recover(&mut self) {
        self.transition(SupervisorState::Recovering);
        info!("Resetting display hardware");
        if let Err(e) = self.panel.hardware_reset() {
            warn!("Display reset failed: {}", e);
        }
        info!("Restarting in {}s", self.settings.recovery_settle.as_secs());
        self.clock.sleep(self.settings.recovery_settle);
    }

    fn escalate(&mut self) {
        self.transition(SupervisorState::Escalating);
        if let Err(e) = self.panel.show_alert(self.settings.alert_color) {
            error!("Cannot show alert screen: {}", e);
        }
        info!("Holding alert for {}s", self.settings.alert_hold.as_secs());
        self.clock.sleep(self.settings.alert_hold);
        self.transition(SupervisorState::Stopped);
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            info!("Supervisor: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
