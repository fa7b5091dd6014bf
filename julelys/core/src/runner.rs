//! Sequence Runner
//!
//! Owns the active set and drives it on a dedicated thread.
//!
//! # Active set handoff
//!
//! The active set lives behind `RwLock<Arc<ActiveSet>>`. A pass clones the
//! `Arc` under a read lock and iterates that snapshot with the lock
//! released, so a concurrent [`SequenceRunner::replace_active_set`] can never
//! change the list mid-pass. Replacement raises every old stop flag and
//! swaps the handle under the write lock, then returns without waiting for
//! the old sequences to unwind; the next pass picks up the new set.
//!
//! Within a pass sequences run strictly one after another, each with
//! exclusive use of the draw sink.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::color::Color;
use crate::sequence::{DrawSink, Sequence, SequenceContext, StopFlag};

/// A sequence instance installed in the active set
#[derive(Debug)]
pub struct ActiveSequence {
    name: String,
    stop: StopFlag,
    body: Mutex<Sequence>,
}

impl ActiveSequence {
    /// Wrap a fresh sequence instance
    pub fn new(name: impl Into<String>, sequence: Sequence) -> Self {
        Self {
            name: name.into(),
            stop: StopFlag::new(),
            body: Mutex::new(sequence),
        }
    }

    /// Registry name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to this instance's stop flag
    #[must_use]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Ask the instance to return at its next checkpoint
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// Check whether a stop was requested
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Run the sequence body once against `sink`
    pub fn run(&self, sink: &mut dyn DrawSink) {
        let mut body = self.body.lock();
        debug!(sequence = %self.name, kind = body.kind(), "Sequence started");
        let mut ctx = SequenceContext::new(sink, &self.stop);
        body.run(&mut ctx);
        debug!(
            sequence = %self.name,
            stopped = self.stop.is_requested(),
            "Sequence returned"
        );
    }
}

/// Immutable snapshot of the sequences selected to run
pub type ActiveSet = Vec<Arc<ActiveSequence>>;

/// Drives the active set
#[derive(Debug)]
pub struct SequenceRunner {
    active: RwLock<Arc<ActiveSet>>,
    alive: AtomicBool,
    blank_requested: AtomicBool,
    passes: AtomicU64,
    idle_poll: Duration,
}

impl SequenceRunner {
    /// Create a runner with an empty active set
    ///
    /// `idle_poll` is the shortest time one pass of
    /// [`run_forever`](Self::run_forever) takes, which bounds spinning when
    /// the set is empty or every sequence returns at once.
    #[must_use]
    pub fn new(idle_poll: Duration) -> Self {
        Self {
            active: RwLock::new(Arc::new(Vec::new())),
            alive: AtomicBool::new(true),
            blank_requested: AtomicBool::new(false),
            passes: AtomicU64::new(0),
            idle_poll,
        }
    }

    /// Install a new active set
    ///
    /// Every sequence in the current set gets its stop flag raised first.
    /// Returns once the new set is current; old sequences may still be
    /// unwinding.
    pub fn replace_active_set(&self, sequences: Vec<ActiveSequence>) {
        let next: Arc<ActiveSet> = Arc::new(sequences.into_iter().map(Arc::new).collect());
        let names: Vec<&str> = next.iter().map(|s| s.name()).collect();
        info!(sequences = ?names, "Replacing active set");

        let mut current = self.active.write();
        for sequence in current.iter() {
            sequence.request_stop();
        }
        *current = next;
    }

    /// The current active set
    #[must_use]
    pub fn snapshot(&self) -> Arc<ActiveSet> {
        Arc::clone(&self.active.read())
    }

    /// Names in the current active set
    #[must_use]
    pub fn active_names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|sequence| sequence.name().to_string())
            .collect()
    }

    /// Fill the output with black before the next pass
    pub fn request_blank(&self) {
        self.blank_requested.store(true, Ordering::SeqCst);
    }

    /// Whether the runner loop should keep going
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Completed passes so far
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Stop the loop and every sequence in the current set
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        for sequence in self.snapshot().iter() {
            sequence.request_stop();
        }
        info!("Sequence runner shutting down");
    }

    /// Run every sequence of one snapshot, in order
    ///
    /// Sequences whose stop flag is already raised are skipped. Returns the
    /// number of sequences that ran.
    pub fn run_pass(&self, sink: &mut dyn DrawSink) -> usize {
        let set = self.snapshot();
        let mut ran = 0;
        for sequence in set.iter() {
            if !self.is_alive() {
                break;
            }
            if sequence.is_stop_requested() {
                continue;
            }
            sequence.run(sink);
            ran += 1;
        }
        self.passes.fetch_add(1, Ordering::Relaxed);
        ran
    }

    /// Keep running passes until [`shutdown`](Self::shutdown)
    pub fn run_forever(&self, sink: &mut dyn DrawSink) {
        info!(idle_poll_ms = self.idle_poll.as_millis() as u64, "Sequence runner started");
        while self.is_alive() {
            let started = Instant::now();
            if self.blank_requested.swap(false, Ordering::SeqCst) {
                Self::blank(sink);
            }

            self.run_pass(sink);

            if let Some(rest) = self.idle_poll.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        info!(passes = self.pass_count(), "Sequence runner stopped");
    }

    fn blank(sink: &mut dyn DrawSink) {
        for index in 0..sink.size().cell_count() {
            sink.set_pixel_at(index, Color::BLACK);
        }
        sink.commit_frame();
        debug!("Output blanked");
    }
}

impl Default for SequenceRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}
