//! Error types for the pinning lifecycle

use mlockd_common::config::ConfigError;
use mlockd_common::exit;
use nix::sys::signal::Signal;
use std::collections::TryReserveError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of one step of loading a single file
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file does not exist or is not readable
    #[error("could not open {}: {source}", .path.display())]
    Open {
        /// Offending path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },

    /// The file size could not be queried
    #[error("could not stat {}: {source}", .path.display())]
    Stat {
        /// Offending path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },

    /// The file could not be mapped into the address space
    #[error("could not mmap {}: {source}", .path.display())]
    Map {
        /// Offending path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },

    /// The mapped range could not be locked in physical memory
    #[error("could not mlock {}: {source}", .path.display())]
    Pin {
        /// Offending path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },
}

impl LoadError {
    /// Path of the file that failed to load
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Open { path, .. }
            | LoadError::Stat { path, .. }
            | LoadError::Map { path, .. }
            | LoadError::Pin { path, .. } => path,
        }
    }
}

/// Registry storage could not be grown
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Allocation of the record storage failed
    #[error("registry allocation failed ({requested} records): {source}")]
    Allocation {
        /// Capacity that was requested
        requested: usize,
        /// Source allocation error
        source: TryReserveError,
    },

    /// The configured record limit was reached
    #[error("registry limit of {limit} records reached")]
    Limit {
        /// Maximum number of records
        limit: usize,
    },
}

/// Failures of the foreground/background split
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// The handshake pipe could not be created
    #[error("could not create handshake pipe: {0}")]
    Pipe(#[source] nix::Error),

    /// The background instance could not be forked
    #[error("could not fork: {0}")]
    Fork(#[source] nix::Error),

    /// The background instance exited without reporting an outcome
    #[error("background instance {pid} exited before reporting its load outcome")]
    BackgroundDied {
        /// Background process id
        pid: i32,
    },

    /// The pid file could not be written; reported as a warning only
    #[error("could not write pid file {}: {source}", .path.display())]
    PidFile {
        /// Pid file path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },

    /// Reading or writing the handshake pipe failed
    #[error("handshake pipe error: {0}")]
    Io(#[from] io::Error),
}

/// Termination signal handling could not be installed
#[derive(Error, Debug, Clone)]
pub enum ShutdownError {
    /// Blocking the termination signals failed
    #[error("could not set signal mask: {0}")]
    Mask(#[source] nix::Error),

    /// Installing a signal handler failed
    #[error("could not install handler for {signal:?}: {source}")]
    Handler {
        /// Signal whose handler failed
        signal: Signal,
        /// Source nix error
        source: nix::Error,
    },
}

/// Release counts differ from acquisition counts after unwind
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "accounting mismatch: {unlocked}/{locked} files unlocked, {unmapped}/{mapped} files unmapped"
)]
pub struct AccountingMismatch {
    /// Files mapped during the load pass
    pub mapped: u64,
    /// Files locked during the load pass
    pub locked: u64,
    /// Files unmapped during unwind
    pub unmapped: u64,
    /// Files unlocked during unwind
    pub unlocked: u64,
}

/// Top-level error of an mlockd run
#[derive(Error, Debug)]
pub enum MlockdError {
    /// Invalid configuration or command line
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Per-file load error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Handshake error
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Signal handling error
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// Unwind accounting error
    #[error(transparent)]
    Accounting(#[from] AccountingMismatch),

    /// The list file could not be read
    #[error("could not read file list {}: {source}", .path.display())]
    PathList {
        /// List file path
        path: PathBuf,
        /// Source IO error
        source: io::Error,
    },
}

impl MlockdError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MlockdError::Config(_) => exit::USAGE,
            MlockdError::Registry(_) => exit::ALLOCATION_FAILED,
            MlockdError::Load(_) | MlockdError::Shutdown(_) | MlockdError::PathList { .. } => {
                exit::LOAD_FAILED
            }
            MlockdError::Handshake(_) => exit::HANDSHAKE_FAILED,
            MlockdError::Accounting(_) => exit::ACCOUNTING_MISMATCH,
        }
    }
}

/// Result type for mlockd operations
pub type MlockdResult<T> = Result<T, MlockdError>;
