//! # mlockd
//!
//! Keeps a fixed set of files resident in physical memory for the lifetime
//! of the process. Each file is mapped read-only, locked with `mlock(2)`
//! and read once end to end; the process then idles until SIGINT, SIGQUIT
//! or SIGTERM, releases everything, and checks that every pin and mapping
//! acquired was released exactly once.
//!
//! # Module Structure
//!
//! - [`registry`] - Per-file resource records with an explicit growth policy
//! - [`memory`] - OS backend trait and the real mmap/mlock implementation
//! - [`loader`] - Loading one file into a registry slot
//! - [`accounting`] - Acquisition/release counters
//! - [`daemon`] - Fork + pipe handshake for background mode
//! - [`shutdown`] - Signal-driven idle phase
//! - [`unwind`] - Releasing every resource and verifying the counts
//! - [`lifecycle`] - The full sequence, and the exit disposition
//! - [`paths`] - List-file reader
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   fork + pipe   ┌──────────────────────────────────────┐
//! │  foreground   │◄───── i32 ──────┤  background (or the only instance)   │
//! │ writes pidfile│                 │                                      │
//! └───────────────┘                 │  ResourceRegistry ◄── load_file ──┐  │
//!                                   │        │                 MemoryBackend
//!                                   │        ▼                          │  │
//!                                   │  ShutdownSupervisor ──► unwind ───┘  │
//!                                   └──────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod accounting;
pub mod daemon;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod memory;
pub mod paths;
pub mod registry;
pub mod shutdown;
pub mod unwind;

pub use accounting::Accounting;
pub use error::{
    AccountingMismatch, HandshakeError, LoadError, MlockdError, MlockdResult, RegistryError,
    ShutdownError,
};
pub use lifecycle::{Disposition, Options, PassOutcome, RunSummary, load_pass, run};
pub use loader::{LoadReport, load_file};
pub use memory::{MemoryBackend, SystemMemory};
pub use registry::{REGISTRY_INITIAL_CAPACITY, ResourceRecord, ResourceRegistry};
pub use shutdown::ShutdownSupervisor;
pub use unwind::{UnwindReport, unwind};
