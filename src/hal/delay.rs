//! Blocking delays for controller settle times

use std::thread;
use std::time::Duration;

/// Millisecond delay provider
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Delay backed by `thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
