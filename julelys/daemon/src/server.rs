//! Daemon Server Implementation
//!
//! Wires the rendering core into one process:
//! - Builds the compositor, runner, controller and output device from config
//! - Starts the runner thread and the transmission thread
//! - Serves the control socket until shutdown
//! - Tears everything down in reverse order
//!
//! # Threads
//!
//! ```text
//!   tokio runtime                julelys-runner          julelys-transmit
//!   ControlServer ──► Controller ──► SequenceRunner
//!                                        │ FrameWriter
//!                                        ▼
//!                                  FrameCompositor ◄──── TransmissionLoop ──► device
//! ```

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{info, warn};

use julelys_core::{
    output::ChannelOrderEncoder, ControlServer, Controller, DirectoryStore, FrameCompositor,
    FrameEncoder, FrameWriter, JulelysConfig, MemoryStore, NullDevice, OutputDevice, OutputMode,
    SequenceRunner, SequenceStore, TransmissionHandle, TransmissionLoop,
};
use julelys_core::transport::ServerSettings;

use crate::spi::SpiDevice;

/// The main daemon server
pub struct DaemonServer {
    config: JulelysConfig,
    compositor: Arc<FrameCompositor>,
    runner: Arc<SequenceRunner>,
    controller: Arc<Controller>,
    encoder: Arc<dyn FrameEncoder>,
}

impl DaemonServer {
    /// Build the pipeline from `config` without starting any thread
    pub fn new(config: JulelysConfig) -> Result<Self> {
        let compositor = Arc::new(FrameCompositor::new(config.matrix));
        let runner = Arc::new(SequenceRunner::new(config.idle_poll));
        let encoder: Arc<dyn FrameEncoder> =
            Arc::new(ChannelOrderEncoder::new(config.channel_order));

        let store: Arc<dyn SequenceStore> = if config.storage_enabled {
            info!(path = ?config.storage_dir, "Using sequence storage directory");
            Arc::new(DirectoryStore::new(config.storage_dir.clone()))
        } else {
            info!("Sequence storage disabled, custom sequences are kept in memory");
            Arc::new(MemoryStore::new())
        };

        let controller = Arc::new(
            Controller::new(config.matrix, config.mode, Arc::clone(&runner))
                .with_store(store)
                .with_encoder(Arc::clone(&encoder)),
        );

        Ok(Self {
            config,
            compositor,
            runner,
            controller,
            encoder,
        })
    }

    /// Open the configured output device
    fn open_device(&self) -> Result<Box<dyn OutputDevice>> {
        match self.config.mode {
            OutputMode::Real => {
                let device = SpiDevice::open(&self.config.device, self.config.baud_rate)?;
                Ok(Box::new(device))
            }
            OutputMode::Headless => {
                info!("Headless mode, frames are discarded");
                Ok(Box::new(NullDevice))
            }
        }
    }

    fn spawn_runner(&self) -> Result<JoinHandle<()>> {
        let runner = Arc::clone(&self.runner);
        let compositor = Arc::clone(&self.compositor);
        let commit_delay = self.config.commit_delay;
        thread::Builder::new()
            .name("julelys-runner".to_string())
            .spawn(move || {
                let mut writer = FrameWriter::new(compositor, commit_delay);
                runner.run_forever(&mut writer);
            })
            .context("Failed to spawn runner thread")
    }

    /// Run until `shutdown` is raised
    pub async fn run(&mut self, socket_path: PathBuf, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!(
            width = self.config.matrix.width,
            height = self.config.matrix.height,
            mode = %self.config.mode,
            fps = self.config.fps,
            "Starting julelys pipeline"
        );

        let device = self.open_device()?;
        let transmission = TransmissionLoop::new(
            Arc::clone(&self.compositor),
            device,
            Arc::clone(&self.encoder),
            self.config.fps,
        )
        .spawn()
        .context("Failed to spawn transmission thread")?;

        let runner_thread = self.spawn_runner()?;

        let controller = Arc::clone(&self.controller);
        let restored = tokio::task::spawn_blocking(move || {
            controller.load_custom_sequences();
            controller.restore_active();
        })
        .await;
        if let Err(e) = restored {
            warn!(error = %e, "Failed to load saved sequences");
        }

        let mut server = ControlServer::new(
            &socket_path,
            Arc::clone(&self.controller),
            ServerSettings::from(&self.config),
        );
        let result = server
            .run(shutdown)
            .await
            .with_context(|| format!("Control server on {socket_path:?} failed"));

        self.shutdown(runner_thread, transmission);
        result
    }

    /// Graceful shutdown
    fn shutdown(&self, runner_thread: JoinHandle<()>, mut transmission: TransmissionHandle) {
        info!("Initiating graceful shutdown");

        self.runner.shutdown();
        if runner_thread.join().is_err() {
            warn!("Runner thread panicked");
        }

        transmission.stop();
        let stats = transmission.stats();
        info!(
            frames_sent = stats.frames_sent(),
            frames_dropped = stats.frames_dropped(),
            "Transmission stopped"
        );

        info!("Shutdown complete");
    }
}
