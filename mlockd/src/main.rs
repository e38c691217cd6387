//! # mlockd
//!
//! Pins files in physical memory until told to stop.
//!
//! # Usage
//!
//! ```bash
//! # Lock two files in the foreground; Ctrl+C releases them
//! mlockd /srv/tables/geo.idx /srv/tables/asn.idx
//!
//! # Lock everything listed in files.txt, keep going past failures
//! mlockd -l -f files.txt
//!
//! # Load, then leave a background instance holding the pages
//! mlockd -D /run/mlockd.pid -f files.txt
//! ```

use clap::Parser;
use mlockd::MlockdResult;
use mlockd::daemon::{HandshakeWriter, Role, daemonize};
use mlockd::lifecycle::{Options, run};
use mlockd::memory::SystemMemory;
use mlockd::shutdown::ShutdownSupervisor;
use mlockd_common::config::{ConfigLoader, LogLevel, MlockdConfig};
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// mlockd - keep files resident in RAM
#[derive(Parser, Debug)]
#[command(name = "mlockd")]
#[command(version)]
#[command(about = "Map and lock files in physical memory until signalled")]
struct Args {
    /// Files to lock, loaded after the list file.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Read files to lock from a list, one path per line.
    #[arg(short = 'f', long = "file-list", value_name = "LIST")]
    file_list: Option<PathBuf>,

    /// Keep loading the remaining files after a failure.
    #[arg(short, long)]
    lazy: bool,

    /// Run in the background and write its pid to PIDFILE.
    #[arg(short = 'D', long = "daemon", value_name = "PIDFILE")]
    daemon: Option<PathBuf>,

    /// Maximum number of files to hold.
    #[arg(long, value_name = "N")]
    max_files: Option<usize>,

    /// TOML configuration file; command-line values take precedence.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            error!("{e}");
            process::exit(e.exit_code());
        }
    };
    setup_tracing(&args, config.log_level);

    info!("mlockd v{} starting...", env!("CARGO_PKG_VERSION"));

    let handshake = match split(&config) {
        Ok(handshake) => handshake,
        Err(e) => {
            error!("{e}");
            process::exit(e.exit_code());
        }
    };

    // Installed before loading: a termination signal arriving during the
    // load pass stays pending and ends the idle phase at once.
    let supervisor = ShutdownSupervisor::install();
    if let Err(e) = &supervisor {
        error!("{e}");
    }

    let options = Options::from(&config);
    let summary = run(&mut SystemMemory, &options, handshake, || {
        let supervisor = supervisor.as_ref().map_err(Clone::clone)?;
        supervisor.wait();
        Ok(())
    });

    info!("Done");
    process::exit(summary.disposition.exit_code());
}

/// Merge the optional config file with the command line.
fn resolve_config(args: &Args) -> MlockdResult<MlockdConfig> {
    let mut config = match &args.config {
        Some(path) => MlockdConfig::load(path)?,
        None => MlockdConfig::default(),
    };

    config.lazy |= args.lazy;
    if args.file_list.is_some() {
        config.list_file = args.file_list.clone();
    }
    if args.daemon.is_some() {
        config.pid_file = args.daemon.clone();
    }
    if args.max_files.is_some() {
        config.max_files = args.max_files;
    }
    config.files.extend(args.files.iter().cloned());

    config.validate()?;
    Ok(config)
}

/// Fork into the background if a pid file is configured.
///
/// The foreground instance never returns: it exits with the outcome the
/// background reports.
fn split(config: &MlockdConfig) -> MlockdResult<Option<HandshakeWriter>> {
    let Some(pid_file) = config.pid_file.as_deref() else {
        return Ok(None);
    };

    match daemonize(pid_file)? {
        Role::Foreground {
            background,
            outcome,
        } => {
            info!("background instance {background} reported outcome {outcome}");
            process::exit(outcome);
        }
        Role::Background(writer) => Ok(Some(writer)),
    }
}

/// Setup tracing subscriber on stderr.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}
