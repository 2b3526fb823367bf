//! Worker process launch, wait and classification

use super::SupervisorError;
use crate::signals;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};

/// How the worker ended, as far as we know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    RunningUnknown,
    ExitedClean,
    ExitedError(i32),
    KilledBySignal(i32),
}

impl ExitClassification {
    /// Anything but a clean exit counts against the restart budget
    pub fn is_crash(self) -> bool {
        self != ExitClassification::ExitedClean
    }
}

impl From<ExitStatus> for ExitClassification {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => ExitClassification::ExitedClean,
            (Some(code), _) => ExitClassification::ExitedError(code),
            (None, Some(signal)) => ExitClassification::KilledBySignal(signal),
            (None, None) => ExitClassification::RunningUnknown,
        }
    }
}

impl fmt::Display for ExitClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitClassification::RunningUnknown => write!(f, "state unknown"),
            ExitClassification::ExitedClean => write!(f, "exited normally"),
            ExitClassification::ExitedError(code) => write!(f, "exited with code {}", code),
            ExitClassification::KilledBySignal(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

/// Result of one blocking wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Terminated(ExitClassification),
    /// A signal arrived before the child changed state
    Interrupted,
}

/// Worker program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split `argv` into program and arguments; `None` if empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A launched worker
pub trait ChildProcess {
    fn id(&self) -> u32;

    /// Block until the child terminates or a signal interrupts the wait
    fn wait(&mut self) -> Result<WaitOutcome, SupervisorError>;

    /// Ask the child to stop (SIGTERM); never force-kills
    fn terminate(&mut self) -> Result<(), SupervisorError>;
}

/// Starts workers
pub trait Launcher {
    type Child: ChildProcess;

    fn launch(&mut self, command: &WorkerCommand) -> Result<Self::Child, SupervisorError>;
}

/// Launches real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    type Child = SpawnedChild;

    fn launch(&mut self, command: &WorkerCommand) -> Result<SpawnedChild, SupervisorError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                command: command.to_string(),
                source,
            })?;
        Ok(SpawnedChild { child, reaped: false })
    }
}

/// Child process reaped through `waitpid`
///
/// `std::process::Child::wait` retries on `EINTR`; waiting directly lets a
/// signal break the wait. While blocked, the signal handler forwards
/// SIGTERM to this child itself, so a request that lands after the
/// caller's last check still reaches the worker.
#[derive(Debug)]
pub struct SpawnedChild {
    child: Child,
    reaped: bool,
}

impl SpawnedChild {
    fn pid(&self) -> libc::pid_t {
        self.child.id() as libc::pid_t
    }
}

impl ChildProcess for SpawnedChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait(&mut self) -> Result<WaitOutcome, SupervisorError> {
        if signals::watch_child(self.pid()) {
            // Request arrived before the handler knew about us
            if let Err(e) = self.terminate() {
                signals::unwatch_child();
                return Err(e);
            }
        }

        let mut status: libc::c_int = 0;
        // SAFETY: `status` is a valid out-pointer; the pid is our own unreaped child.
        let rc = unsafe { libc::waitpid(self.pid(), &mut status, 0) };
        signals::unwatch_child();
        if rc == -1 {
            let err = io::Error::last_os_error();
            return if err.kind() == io::ErrorKind::Interrupted {
                Ok(WaitOutcome::Interrupted)
            } else {
                Err(SupervisorError::Wait(err))
            };
        }

        self.reaped = true;
        Ok(WaitOutcome::Terminated(ExitStatus::from_raw(status).into()))
    }

    fn terminate(&mut self) -> Result<(), SupervisorError> {
        if self.reaped {
            return Ok(());
        }
        // SAFETY: plain kill(2) on a pid we spawned and have not reaped.
        if unsafe { libc::kill(self.pid(), libc::SIGTERM) } == -1 {
            return Err(SupervisorError::Signal(io::Error::last_os_error()));
        }
        Ok(())
    }
}
