//! Recording fakes shared by the unit tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::display::{DisplayError, Rgb565};
use crate::hal::{Bus, BusError, Delay, Direction, GpioBackend, GpioError, Level, LineSelect};
use crate::signals::{self, ShutdownToken};
use crate::supervisor::{ChildProcess, Clock, ExitClassification, Launcher, RecoveryPanel, SupervisorError, WaitOutcome, WorkerCommand};

static SIGNAL_TOKEN: Lazy<ShutdownToken> = Lazy::new(|| {
    let token = ShutdownToken::new();
    signals::install(&token).expect("signal handlers install once per test process");
    token
});

static PROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that spawn workers or raise signals, and hand out the
/// process-wide token with the handlers installed and the flag cleared
pub fn signal_guard() -> (MutexGuard<'static, ()>, ShutdownToken) {
    let guard = PROCESS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    SIGNAL_TOKEN.reset();
    (guard, SIGNAL_TOKEN.clone())
}

/// One observable hardware interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Export(u8),
    SetDirection(u8, Direction),
    Write { pin: u8, level: Level },
    Unexport(u8),
    Command(u8),
    Data(Vec<u8>),
    Delay(u32),
}

/// Event log shared between fakes so ordering across GPIO, bus and delay is visible
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Bus traffic only
    pub fn bus_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Command(_) | Event::Data(_)))
            .collect()
    }

    /// Commands only, in order
    pub fn commands(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

pub struct MockGpio {
    log: EventLog,
}

impl MockGpio {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl GpioBackend for MockGpio {
    fn export(&mut self, pin: u8) -> Result<(), GpioError> {
        self.log.push(Event::Export(pin));
        Ok(())
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) -> Result<(), GpioError> {
        self.log.push(Event::SetDirection(pin, direction));
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
        self.log.push(Event::Write { pin, level });
        Ok(())
    }

    fn unexport(&mut self, pin: u8) -> Result<(), GpioError> {
        self.log.push(Event::Unexport(pin));
        Ok(())
    }
}

pub struct MockBus {
    log: EventLog,
    /// Number of transfers that succeed before every later one fails
    fail_after: Option<usize>,
    transfers: usize,
    id: Option<[u8; 4]>,
}

impl MockBus {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_after: None,
            transfers: 0,
            id: None,
        }
    }

    pub fn failing_after(mut self, transfers: usize) -> Self {
        self.fail_after = Some(transfers);
        self
    }

    pub fn with_id(mut self, id: [u8; 4]) -> Self {
        self.id = Some(id);
        self
    }
}

impl Bus for MockBus {
    fn transfer(&mut self, bytes: &[u8], line: LineSelect) -> Result<(), BusError> {
        if self.fail_after.is_some_and(|limit| self.transfers >= limit) {
            return Err(BusError::Transfer(io::Error::new(io::ErrorKind::Other, "injected failure")));
        }
        self.transfers += 1;
        match line {
            LineSelect::Command => {
                assert_eq!(bytes.len(), 1, "commands are a single byte");
                self.log.push(Event::Command(bytes[0]));
            }
            LineSelect::Data => self.log.push(Event::Data(bytes.to_vec())),
        }
        Ok(())
    }

    fn speed_hz(&self) -> Option<u32> {
        Some(32_000_000)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        let id = self.id.ok_or(BusError::ReadUnsupported)?;
        buffer.copy_from_slice(&id[..buffer.len()]);
        Ok(())
    }
}

pub struct MockDelay {
    log: EventLog,
}

impl MockDelay {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Delay for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Event::Delay(ms));
    }
}

/// Clock whose `sleep` advances `now` instantly
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Rc<Cell<Instant>>,
    slept: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
            slept: Rc::default(),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// One scripted worker run: how long it lives and how it ends
#[derive(Debug, Clone, Copy)]
pub struct Run {
    pub lasts: Duration,
    pub ends: ExitClassification,
    /// First wait is interrupted by a shutdown signal
    pub signalled: bool,
}

impl Run {
    pub fn crash_after(secs: u64) -> Self {
        Self {
            lasts: Duration::from_secs(secs),
            ends: ExitClassification::KilledBySignal(11),
            signalled: false,
        }
    }

    pub fn clean_after(secs: u64) -> Self {
        Self {
            lasts: Duration::from_secs(secs),
            ends: ExitClassification::ExitedClean,
            signalled: false,
        }
    }

    /// Interrupted by SIGTERM while waited on, then dies of the forwarded signal
    pub fn until_signalled() -> Self {
        Self {
            lasts: Duration::from_secs(1),
            ends: ExitClassification::KilledBySignal(15),
            signalled: true,
        }
    }
}

/// Launcher replaying a fixed list of runs against a [`FakeClock`]
pub struct ScriptedLauncher {
    runs: VecDeque<Run>,
    clock: FakeClock,
    token: ShutdownToken,
    pub launches: Rc<Cell<usize>>,
    pub terminations: Rc<Cell<usize>>,
}

impl ScriptedLauncher {
    pub fn new(clock: FakeClock, runs: impl IntoIterator<Item = Run>) -> Self {
        Self {
            runs: runs.into_iter().collect(),
            clock,
            token: ShutdownToken::new(),
            launches: Rc::default(),
            terminations: Rc::default(),
        }
    }

    /// Token cancelled when a signalled run is interrupted
    pub fn signalling(mut self, token: ShutdownToken) -> Self {
        self.token = token;
        self
    }
}

impl Launcher for ScriptedLauncher {
    type Child = ScriptedChild;

    fn launch(&mut self, command: &WorkerCommand) -> Result<ScriptedChild, SupervisorError> {
        let run = self.runs.pop_front().ok_or_else(|| SupervisorError::Launch {
            command: command.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "script exhausted"),
        })?;
        self.launches.set(self.launches.get() + 1);
        Ok(ScriptedChild {
            run,
            clock: self.clock.clone(),
            token: self.token.clone(),
            terminations: Rc::clone(&self.terminations),
            id: 1000 + self.launches.get() as u32,
        })
    }
}

pub struct ScriptedChild {
    run: Run,
    clock: FakeClock,
    token: ShutdownToken,
    terminations: Rc<Cell<usize>>,
    id: u32,
}

impl ChildProcess for ScriptedChild {
    fn id(&self) -> u32 {
        self.id
    }

    fn wait(&mut self) -> Result<WaitOutcome, SupervisorError> {
        if self.run.signalled {
            self.run.signalled = false;
            self.token.cancel();
            return Ok(WaitOutcome::Interrupted);
        }
        self.clock.advance(self.run.lasts);
        Ok(WaitOutcome::Terminated(self.run.ends))
    }

    fn terminate(&mut self) -> Result<(), SupervisorError> {
        self.terminations.set(self.terminations.get() + 1);
        Ok(())
    }
}

/// What the supervisor asked the panel to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCall {
    HardwareReset,
    Alert(Rgb565),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPanel {
    pub calls: Rc<RefCell<Vec<PanelCall>>>,
    failing: bool,
}

impl RecordingPanel {
    /// Records calls but reports every one as failed
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PanelCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: PanelCall) -> Result<(), DisplayError> {
        self.calls.borrow_mut().push(call);
        if self.failing {
            Err(DisplayError::Communication(BusError::Transfer(io::Error::new(
                io::ErrorKind::Other,
                "injected failure",
            ))))
        } else {
            Ok(())
        }
    }
}

impl RecoveryPanel for RecordingPanel {
    fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        self.record(PanelCall::HardwareReset)
    }

    fn show_alert(&mut self, color: Rgb565) -> Result<(), DisplayError> {
        self.record(PanelCall::Alert(color))
    }
}
