//! Cooperative shutdown on SIGINT/SIGTERM
//!
//! The handler stores into an atomic flag and, while the supervisor is
//! blocked on a worker, sends that worker SIGTERM directly. Loops poll the
//! token at their natural check points; a pixel stream in progress runs to
//! completion first.
//!
//! Handlers are installed without `SA_RESTART`, so a blocking `waitpid`
//! returns `EINTR` and the supervisor sees the request without delay.

use crate::supervisor::SupervisorError;
use once_cell::sync::OnceCell;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

static SHUTDOWN_FLAG: OnceCell<Arc<AtomicBool>> = OnceCell::new();

/// Worker the handler forwards SIGTERM to; 0 when none is being waited on
static WATCHED_CHILD: AtomicI32 = AtomicI32::new(0);

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Route SIGINT and SIGTERM to `token`. Can be called once per process.
pub fn install(token: &ShutdownToken) -> Result<(), SupervisorError> {
    SHUTDOWN_FLAG
        .set(Arc::clone(&token.flag))
        .map_err(|_| SupervisorError::AlreadyInstalled)?;

    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: `on_signal` only touches atomics and calls kill(2), all
        // async-signal-safe; the action struct is fully initialized.
        let installed = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if installed != 0 {
            return Err(SupervisorError::Signal(io::Error::last_os_error()));
        }
    }

    log::debug!("Signal handlers installed");
    Ok(())
}

/// Have the handler send SIGTERM to `pid` until [`unwatch_child`]
///
/// Returns true if shutdown had already been requested, in which case the
/// handler will not fire again and the caller must signal `pid` itself.
pub fn watch_child(pid: libc::pid_t) -> bool {
    WATCHED_CHILD.store(pid, Ordering::SeqCst);
    SHUTDOWN_FLAG
        .get()
        .is_some_and(|flag| flag.load(Ordering::SeqCst))
}

pub fn unwatch_child() {
    WATCHED_CHILD.store(0, Ordering::SeqCst);
}

extern "C" fn on_signal(_signal: libc::c_int) {
    if let Some(flag) = SHUTDOWN_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
    let pid = WATCHED_CHILD.load(Ordering::SeqCst);
    if pid > 0 {
        // SAFETY: kill(2) is async-signal-safe
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_token_clones_share_state() {
        let token = ShutdownToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_signal_cancels_token_and_install_is_single_shot() {
        let (_guard, token) = testing::signal_guard();
        assert!(matches!(install(&ShutdownToken::new()), Err(SupervisorError::AlreadyInstalled)));

        // SAFETY: the handler installed by `signal_guard` catches SIGTERM
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_watch_reports_earlier_request() {
        let (_guard, token) = testing::signal_guard();
        assert!(!watch_child(0));
        token.cancel();
        assert!(watch_child(0));
        unwatch_child();
        assert_eq!(WATCHED_CHILD.load(Ordering::SeqCst), 0);
    }
}
