//! Process exit codes.
//!
//! The background instance sends one of these over the handshake pipe and
//! the foreground instance exits with it unchanged, so the numbering is
//! shared by both sides of the split.

/// All requested files were mapped, pinned and released cleanly.
pub const SUCCESS: i32 = 0;

/// At least one file failed to load, or the list file could not be read.
pub const LOAD_FAILED: i32 = 1;

/// Invalid command line or configuration file. Matches clap's usage code.
pub const USAGE: i32 = 2;

/// The resource registry could not be allocated or grown.
pub const ALLOCATION_FAILED: i32 = 3;

/// Release counts did not match acquisition counts during unwind.
pub const ACCOUNTING_MISMATCH: i32 = 4;

/// The background instance could not be started or died before reporting.
pub const HANDSHAKE_FAILED: i32 = 5;
