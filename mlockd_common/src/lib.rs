//! mlockd Common Library
//!
//! Shared pieces of the mlockd workspace that do not touch memory or
//! processes: configuration loading and the process exit codes.
//!
//! # Module Structure
//!
//! - [`config`] - TOML configuration file, log level, loader trait
//! - [`exit`] - Exit codes of the daemon and its foreground instance
//!
//! # Usage
//!
//! ```rust,no_run
//! use mlockd_common::config::{ConfigLoader, MlockdConfig};
//! use std::path::Path;
//!
//! let config = MlockdConfig::load(Path::new("/etc/mlockd.toml")).unwrap();
//! config.validate().unwrap();
//! ```

pub mod config;
pub mod exit;
