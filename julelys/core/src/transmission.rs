//! Transmission Loop
//!
//! A dedicated OS thread that streams the front buffer to the output device
//! for the lifetime of the process. Each cycle snapshots the front buffer,
//! encodes it, writes it, then sleeps one full period. The sleep does not
//! shrink when the write was slow, so sustained slow I/O lowers the
//! effective rate instead of being compensated.
//!
//! Write failures are never retried. The frame is dropped, and the next
//! cycle sends whatever the front buffer holds by then.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::compositor::FrameCompositor;
use crate::frame::Frame;
use crate::output::{FrameEncoder, OutputDevice};

/// Counters shared between the loop and its handle
#[derive(Debug, Default)]
pub struct TransmissionStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl TransmissionStats {
    /// Frames the device accepted
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames lost to write failures
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Streams the compositor's front buffer to an output device
pub struct TransmissionLoop {
    compositor: Arc<FrameCompositor>,
    device: Box<dyn OutputDevice>,
    encoder: Arc<dyn FrameEncoder>,
    period: Duration,
    scratch: Frame,
    buffer: Vec<u8>,
    failure_streak: u64,
    stats: Arc<TransmissionStats>,
}

impl TransmissionLoop {
    /// Create a loop running at `fps` cycles per second
    ///
    /// An `fps` of zero is treated as one.
    pub fn new(
        compositor: Arc<FrameCompositor>,
        device: Box<dyn OutputDevice>,
        encoder: Arc<dyn FrameEncoder>,
        fps: u32,
    ) -> Self {
        let period = Duration::from_secs(1) / fps.max(1);
        Self {
            scratch: Frame::new(compositor.size()),
            compositor,
            device,
            encoder,
            period,
            buffer: Vec::new(),
            failure_streak: 0,
            stats: Arc::new(TransmissionStats::default()),
        }
    }

    /// Sleep between cycles
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Shared counters
    #[must_use]
    pub fn stats(&self) -> Arc<TransmissionStats> {
        Arc::clone(&self.stats)
    }

    /// Run one cycle without sleeping
    ///
    /// Returns `true` if the device accepted the frame.
    pub fn tick(&mut self) -> bool {
        self.compositor.copy_front_into(&mut self.scratch);
        self.buffer.clear();
        self.encoder.encode_into(&self.scratch, &mut self.buffer);

        match self.device.write(&self.buffer) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                if self.failure_streak > 0 {
                    info!(
                        device = self.device.name(),
                        dropped = self.failure_streak,
                        "Output device recovered"
                    );
                    self.failure_streak = 0;
                }
                true
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if self.failure_streak == 0 {
                    warn!(device = self.device.name(), error = %e, "Frame write failed, dropping frames until the device recovers");
                }
                self.failure_streak += 1;
                false
            }
        }
    }

    /// Start the loop on its own thread
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut self) -> io::Result<TransmissionHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = self.stats();
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("julelys-transmit".into())
            .spawn(move || {
                info!(
                    device = self.device.name(),
                    period_ms = self.period.as_millis() as u64,
                    "Transmission loop started"
                );
                while flag.load(Ordering::SeqCst) {
                    self.tick();
                    thread::sleep(self.period);
                }
                info!(
                    sent = self.stats.frames_sent(),
                    dropped = self.stats.frames_dropped(),
                    "Transmission loop stopped"
                );
            })?;

        Ok(TransmissionHandle {
            running,
            thread: Some(thread),
            stats,
        })
    }
}

/// Handle to a running transmission thread
#[derive(Debug)]
pub struct TransmissionHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<TransmissionStats>,
}

impl TransmissionHandle {
    /// Shared counters
    #[must_use]
    pub fn stats(&self) -> &TransmissionStats {
        &self.stats
    }

    /// Whether the thread is still meant to run
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Transmission thread panicked");
            } else {
                debug!("Transmission thread joined");
            }
        }
    }
}

impl Drop for TransmissionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
