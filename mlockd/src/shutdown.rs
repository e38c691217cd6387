//! Waiting for a termination signal.
//!
//! SIGINT, SIGQUIT and SIGTERM are blocked when the supervisor is
//! installed and only unblocked inside `sigsuspend(2)`, so a signal that
//! arrives between checking the run flag and suspending stays pending and
//! ends the next suspension instead of being lost. The handler itself only
//! stores to atomics; the signal is logged after the wait returns.

use crate::error::ShutdownError;
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, sigaction, sigprocmask,
};
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::{info, warn};

/// Signals that end the idle phase.
pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM];

static RUNNING: AtomicBool = AtomicBool::new(true);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_termination(signal: c_int) {
    LAST_SIGNAL.store(signal, Ordering::SeqCst);
    RUNNING.store(false, Ordering::SeqCst);
}

/// Installed termination handling. Restores the previous signal mask on drop.
#[derive(Debug)]
pub struct ShutdownSupervisor {
    previous_mask: SigSet,
}

impl ShutdownSupervisor {
    /// Block the termination signals and install their handlers.
    pub fn install() -> Result<Self, ShutdownError> {
        let mut blocked = SigSet::empty();
        for signal in TERMINATION_SIGNALS {
            blocked.add(signal);
        }

        let mut previous_mask = SigSet::empty();
        sigprocmask(
            SigmaskHow::SIG_BLOCK,
            Some(&blocked),
            Some(&mut previous_mask),
        )
        .map_err(ShutdownError::Mask)?;
        let supervisor = Self { previous_mask };

        let action = SigAction::new(
            SigHandler::Handler(on_termination),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in TERMINATION_SIGNALS {
            // SAFETY: the handler only touches atomics.
            unsafe { sigaction(signal, &action) }
                .map_err(|source| ShutdownError::Handler { signal, source })?;
        }

        Ok(supervisor)
    }

    /// False once a termination signal has been handled.
    pub fn is_running(&self) -> bool {
        RUNNING.load(Ordering::SeqCst)
    }

    /// Suspend until a termination signal arrives; returns immediately if one already has.
    pub fn wait(&self) -> Option<Signal> {
        let mut suspend_mask = self.previous_mask;
        for signal in TERMINATION_SIGNALS {
            suspend_mask.remove(signal);
        }

        while RUNNING.load(Ordering::SeqCst) {
            // Returns EINTR once a handler has run.
            match suspend_mask.suspend() {
                Ok(()) | Err(Errno::EINTR) => {}
                Err(e) => warn!("sigsuspend failed: {}", e),
            }
        }

        let signal = Signal::try_from(LAST_SIGNAL.load(Ordering::SeqCst)).ok();
        match signal {
            Some(signal) => info!("Received signal {}", signal),
            None => info!("Received termination request"),
        }
        signal
    }
}

impl Drop for ShutdownSupervisor {
    fn drop(&mut self) {
        if let Err(e) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous_mask), None) {
            warn!("could not restore signal mask: {}", e);
        }
    }
}
