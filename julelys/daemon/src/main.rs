//! Julelys Daemon - LED Matrix Controller
//!
//! Entry point for `julelysd`. It loads the configuration, starts the
//! rendering pipeline and serves the local control socket until it is told
//! to stop.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (SPI output on /dev/spidev1.1)
//! julelysd
//!
//! # No hardware: render and discard
//! julelysd --mode headless
//!
//! # A 10 x 30 curtain on another bus
//! julelysd --matrix-width 10 --matrix-height 30 --device /dev/spidev0.0
//!
//! # Verbose logging
//! RUST_LOG=debug julelysd
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod server;
mod spi;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use julelys_core::config::{load_config_from_path, default_config_path};
use julelys_core::{ConfigOverrides, OutputMode};

use server::DaemonServer;

/// Julelys Daemon - drives an RGBW LED matrix
#[derive(Parser, Debug)]
#[command(name = "julelysd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Unix socket path for control connections
    #[arg(short = 's', long, value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "JULELYS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output mode (real, headless)
    #[arg(long, value_name = "MODE")]
    mode: Option<OutputMode>,

    /// Number of LED strings
    #[arg(long, value_name = "N")]
    matrix_width: Option<usize>,

    /// LEDs per string
    #[arg(long, value_name = "N")]
    matrix_height: Option<usize>,

    /// SPI device node
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// PID file path
    #[arg(long, env = "JULELYS_PID_FILE", value_name = "PATH")]
    pid_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "JULELYS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides =
            ConfigOverrides::new().with_matrix(self.matrix_width, self.matrix_height);
        if let Some(ref path) = self.socket_path {
            overrides = overrides.with_socket_path(path.clone());
        }
        if let Some(mode) = self.mode {
            overrides = overrides.with_mode(mode);
        }
        if let Some(ref device) = self.device {
            overrides = overrides.with_device(device.clone());
        }
        overrides
    }
}

/// Get the default PID file path
///
/// Uses XDG_RUNTIME_DIR if available, otherwise /tmp/julelys-$UID/
fn default_pid_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("julelys").join("julelysd.pid")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/julelys-{uid}/julelysd.pid"))
    }
}

/// Write PID file
fn write_pid_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create PID directory: {parent:?}"))?;
    }

    let pid = std::process::id();
    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to create PID file: {path:?}"))?;
    writeln!(file, "{pid}")?;

    info!(pid = pid, path = ?path, "PID file created");
    Ok(())
}

/// Remove PID file
fn remove_pid_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(error = %e, path = ?path, "Failed to remove PID file");
        } else {
            info!(path = ?path, "PID file removed");
        }
    }
}

/// Refuse to start if the PID file names a live process
fn check_existing_daemon(pid_path: &Path) -> Result<()> {
    if !pid_path.exists() {
        return Ok(());
    }

    let pid_str = fs::read_to_string(pid_path)
        .with_context(|| format!("Failed to read PID file: {pid_path:?}"))?;
    let pid: i32 = pid_str.trim().parse().context("Invalid PID in file")?;

    // No signal: existence check only
    if kill(Pid::from_raw(pid), None).is_ok() {
        anyhow::bail!(
            "Another julelysd is already running (PID: {pid}). \
             Stop it first or remove {pid_path:?} if it's stale."
        );
    }

    warn!(pid = pid, "Removing stale PID file");
    fs::remove_file(pid_path)?;
    Ok(())
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("julelys_daemon={level},julelys_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();
}

/// Raise `shutdown` on SIGTERM or SIGINT
fn install_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
        }
        shutdown.store(true, Ordering::SeqCst);
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Julelys daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line override")?;

    info!(
        socket_path = ?config.socket_path,
        device = ?config.device,
        source = %config.source(),
        "Configuration resolved"
    );

    let pid_path = args.pid_file.clone().unwrap_or_else(default_pid_path);
    info!(pid_path = ?pid_path, "PID file path");

    check_existing_daemon(&pid_path)?;
    write_pid_file(&pid_path)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(Arc::clone(&shutdown))?;

    let socket_path = config.socket_path.clone();
    let result = match DaemonServer::new(config) {
        Ok(mut server) => server.run(socket_path, shutdown).await,
        Err(e) => Err(e),
    };

    info!("Shutting down...");
    remove_pid_file(&pid_path);

    match result {
        Ok(()) => {
            info!("Julelys daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
