//! Foreground/background split with a one-shot outcome handshake.
//!
//! The invoking process forks. The foreground side writes the pid file,
//! then blocks until the background side reports the outcome of its load
//! pass over a pipe, and exits with that outcome. The background side
//! detaches and carries on with the lifecycle. Exactly one native-endian
//! `i32` ever crosses the pipe.

use crate::error::HandshakeError;
use nix::unistd::{ForkResult, Pid, fork, pipe, setsid};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Which side of the split the caller ended up on.
#[derive(Debug)]
pub enum Role {
    /// The invoking instance; the background has already reported.
    Foreground {
        /// Process id of the background instance.
        background: Pid,
        /// Outcome reported by the background instance.
        outcome: i32,
    },
    /// The detached instance, holding the write end of the handshake.
    Background(HandshakeWriter),
}

/// Write end of the handshake pipe. Sends at most one outcome.
#[derive(Debug)]
pub struct HandshakeWriter {
    pipe: Option<File>,
}

impl HandshakeWriter {
    /// Send `outcome` to the foreground instance.
    ///
    /// Only the first call writes; the pipe is closed afterwards and later
    /// calls are no-ops.
    pub fn report(&mut self, outcome: i32) -> Result<(), HandshakeError> {
        if let Some(mut pipe) = self.pipe.take() {
            debug!("reporting outcome {} to foreground", outcome);
            pipe.write_all(&outcome.to_ne_bytes())?;
        }
        Ok(())
    }

    /// Whether no outcome has been sent yet.
    pub fn is_pending(&self) -> bool {
        self.pipe.is_some()
    }
}

/// Split into a foreground and a background instance.
///
/// Must be called while the process is single-threaded. The foreground
/// side returns only after the background has written its outcome, or with
/// `HandshakeError::BackgroundDied` if it exited without writing. Failure to
/// write `pid_file` is logged and otherwise ignored.
pub fn daemonize(pid_file: &Path) -> Result<Role, HandshakeError> {
    let (read_end, write_end) = pipe().map_err(HandshakeError::Pipe)?;

    // SAFETY: called before any thread is spawned; the child continues
    // with ordinary single-threaded code.
    match unsafe { fork() }.map_err(HandshakeError::Fork)? {
        ForkResult::Parent { child } => {
            drop(write_end);
            if let Err(e) = write_pid_file(pid_file, child) {
                warn!("WARNING, {}", e);
            }
            let outcome = read_outcome(File::from(read_end), child)?;
            Ok(Role::Foreground {
                background: child,
                outcome,
            })
        }
        ForkResult::Child => {
            drop(read_end);
            if let Err(e) = setsid() {
                warn!("could not start a new session: {}", e);
            }
            Ok(Role::Background(HandshakeWriter {
                pipe: Some(File::from(write_end)),
            }))
        }
    }
}

/// Write `pid` as one decimal line to `path`.
pub fn write_pid_file(path: &Path, pid: Pid) -> Result<(), HandshakeError> {
    fs::write(path, format!("{}\n", pid)).map_err(|source| HandshakeError::PidFile {
        path: path.to_path_buf(),
        source,
    })
}

fn read_outcome(mut pipe: File, background: Pid) -> Result<i32, HandshakeError> {
    let mut buf = [0u8; size_of::<i32>()];
    match pipe.read_exact(&mut buf) {
        Ok(()) => Ok(i32::from_ne_bytes(buf)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(HandshakeError::BackgroundDied {
            pid: background.as_raw(),
        }),
        Err(e) => Err(e.into()),
    }
}
