//! The pinning lifecycle of one instance.
//!
//! ```text
//! registry allocation ──► load pass ──► report outcome ──► idle ──► unwind
//!          │                  │          (background)        ▲        ▲
//!          └── fatal ─────────┴── abort (non-lazy failure) ──┴────────┘
//! ```
//!
//! [`run`] drives the whole sequence. Loading and unwinding are
//! synchronous; the idle phase is supplied by the caller so the binary can
//! wait for a signal while tests return immediately.

use crate::accounting::Accounting;
use crate::daemon::HandshakeWriter;
use crate::error::{MlockdError, ShutdownError};
use crate::loader::load_file;
use crate::memory::MemoryBackend;
use crate::paths::read_path_list;
use crate::registry::{REGISTRY_INITIAL_CAPACITY, ResourceRegistry};
use crate::unwind::{UnwindReport, unwind};
use mlockd_common::config::MlockdConfig;
use mlockd_common::exit;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What to load and how to react to failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Keep loading after a failed file instead of aborting the pass.
    pub lazy: bool,
    /// List file whose paths are loaded first.
    pub list_file: Option<PathBuf>,
    /// Paths loaded after the list file.
    pub files: Vec<PathBuf>,
    /// Upper bound on the number of registry records.
    pub max_files: Option<usize>,
}

impl From<&MlockdConfig> for Options {
    fn from(config: &MlockdConfig) -> Self {
        Self {
            lazy: config.lazy,
            list_file: config.list_file.clone(),
            files: config.files.clone(),
            max_files: config.max_files,
        }
    }
}

/// Aggregate result of the load pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// Paths for which loading was attempted.
    pub attempted: usize,
    /// Paths mapped and pinned.
    pub loaded: usize,
    /// Paths that failed to load.
    pub failed: usize,
    /// The pass stopped before the last path.
    pub aborted: bool,
    /// The registry could not be allocated or grown.
    pub allocation_failed: bool,
    /// The list file could not be read.
    pub list_failed: bool,
}

impl PassOutcome {
    /// Every requested path loaded.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.aborted
    }

    /// Outcome code reported over the handshake.
    pub fn code(&self) -> i32 {
        if self.allocation_failed {
            exit::ALLOCATION_FAILED
        } else if self.is_success() {
            exit::SUCCESS
        } else {
            exit::LOAD_FAILED
        }
    }

    fn fatal() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }
}

/// Final exit disposition of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Everything loaded, idled and released cleanly.
    Success,
    /// A file failed to load, the list file was unreadable, or the idle phase failed.
    LoadFailed,
    /// Registry allocation failed.
    AllocationFailed,
    /// Unwind released a different number of resources than were acquired.
    AccountingMismatch,
}

impl Disposition {
    /// Process exit code for this disposition.
    pub fn exit_code(self) -> i32 {
        match self {
            Disposition::Success => exit::SUCCESS,
            Disposition::LoadFailed => exit::LOAD_FAILED,
            Disposition::AllocationFailed => exit::ALLOCATION_FAILED,
            Disposition::AccountingMismatch => exit::ACCOUNTING_MISMATCH,
        }
    }
}

/// Everything [`run`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Final disposition.
    pub disposition: Disposition,
    /// Load pass outcome.
    pub pass: PassOutcome,
    /// Counters after unwind.
    pub accounting: Accounting,
    /// Unwind report, absent on accounting mismatch.
    pub unwind: Option<UnwindReport>,
}

/// Load `paths` in order, one registry slot each.
///
/// Without `lazy` the first failure stops the pass and later paths are
/// never attempted. A registry allocation failure always stops it.
pub fn load_pass<B, I>(
    backend: &mut B,
    registry: &mut ResourceRegistry<B::Region>,
    accounting: &mut Accounting,
    paths: I,
    lazy: bool,
) -> PassOutcome
where
    B: MemoryBackend,
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let mut outcome = PassOutcome::default();

    for path in paths {
        let (index, record) = match registry.allocate_slot() {
            Ok(slot) => slot,
            Err(e) => {
                error!("{}", e);
                outcome.allocation_failed = true;
                outcome.aborted = true;
                break;
            }
        };

        outcome.attempted += 1;
        match load_file(backend, index, record, path.as_ref(), accounting) {
            Ok(_) => outcome.loaded += 1,
            Err(_) => {
                outcome.failed += 1;
                if !lazy {
                    outcome.aborted = true;
                    break;
                }
            }
        }
    }

    outcome
}

/// Collect input paths: the list file's first, then `files`.
pub fn input_paths(options: &Options) -> Result<Vec<PathBuf>, MlockdError> {
    let mut paths = match &options.list_file {
        Some(list) => read_path_list(list).map_err(|source| MlockdError::PathList {
            path: list.clone(),
            source,
        })?,
        None => Vec::new(),
    };
    paths.extend(options.files.iter().cloned());
    Ok(paths)
}

/// Run the full lifecycle of one instance.
///
/// `handshake` is the background side of a daemonized run; it receives the
/// pass outcome exactly once, from the run phase if the pass completed,
/// otherwise from cleanup. `idle` is called only when the pass was not
/// aborted and returns when the instance should shut down.
pub fn run<B, F>(
    backend: &mut B,
    options: &Options,
    mut handshake: Option<HandshakeWriter>,
    idle: F,
) -> RunSummary
where
    B: MemoryBackend,
    F: FnOnce() -> Result<(), ShutdownError>,
{
    let mut accounting = Accounting::new();

    let limit = options.max_files.unwrap_or(usize::MAX);
    let initial = if options.list_file.is_some() {
        REGISTRY_INITIAL_CAPACITY
    } else {
        options.files.len()
    }
    .min(limit);

    let (mut registry, mut pass) = match ResourceRegistry::with_capacity(initial) {
        Ok(registry) => (registry.with_limit(limit), PassOutcome::default()),
        Err(e) => {
            error!("initial allocation failed: {}", e);
            let pass = PassOutcome {
                allocation_failed: true,
                ..PassOutcome::fatal()
            };
            (ResourceRegistry::new(), pass)
        }
    };

    if !pass.aborted {
        pass = match input_paths(options) {
            Ok(paths) => load_pass(
                backend,
                &mut registry,
                &mut accounting,
                &paths,
                options.lazy,
            ),
            Err(e) => {
                error!("{}", e);
                PassOutcome {
                    list_failed: true,
                    ..PassOutcome::fatal()
                }
            }
        };
    }

    let mut idle_failed = false;
    if !pass.aborted {
        info!("{} files mapped", accounting.files_mapped);
        info!("{} files locked", accounting.files_locked);
        if !accounting.is_steady() {
            error!("mismatch between files locked/mapped after load");
            pass.failed += 1;
        }
        if pass.is_success() {
            info!("All files loaded");
        } else {
            warn!("WARNING, not all files were loaded");
        }

        if let Some(writer) = handshake.as_mut() {
            report_outcome(writer, pass.code());
        }

        if let Err(e) = idle() {
            error!("{}", e);
            idle_failed = true;
        }
    }

    info!("Terminating");
    if let Some(writer) = handshake.as_mut() {
        if writer.is_pending() {
            report_outcome(writer, pass.code());
        }
    }

    let unwound = unwind(backend, registry, &mut accounting);

    let disposition = if pass.allocation_failed {
        Disposition::AllocationFailed
    } else if !pass.is_success() || idle_failed {
        Disposition::LoadFailed
    } else if unwound.is_err() {
        Disposition::AccountingMismatch
    } else {
        Disposition::Success
    };

    if disposition == Disposition::Success {
        info!("Exit Success");
    } else {
        error!("Exit Failure ({:?})", disposition);
    }

    RunSummary {
        disposition,
        pass,
        accounting,
        unwind: unwound.ok(),
    }
}

fn report_outcome(writer: &mut HandshakeWriter, code: i32) {
    if let Err(e) = writer.report(code) {
        error!("could not report outcome to foreground: {}", e);
    }
}
