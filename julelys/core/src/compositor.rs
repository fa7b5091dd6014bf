//! Double-Buffered Frame Compositor
//!
//! Two frames of identical size: the *back* buffer, written by whichever
//! sequence is executing, and the *front* buffer, read by the transmission
//! loop.
//!
//! ```text
//!   runner thread                          transmission thread
//!   ─────────────                          ───────────────────
//!   FrameWriter ── set_pixel ──► back
//!        │
//!        └── commit_frame ──► swap() ──┐
//!                                      ▼
//!                            ┌───────────────────┐
//!                            │ Mutex<front Frame>│ ◄── snapshot_front()
//!                            └───────────────────┘
//! ```
//!
//! The back buffer is owned by the [`FrameWriter`] and never shared, so pixel
//! writes take no lock. The mutex guards only the exchange of the two
//! buffers and the copy-out taken by the reader.
//!
//! After a swap the old front frame becomes the new back frame with whatever
//! it held. Sequences that draw sparse frames clear the rest themselves.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::color::Color;
use crate::frame::Frame;
use crate::matrix::{MatrixSize, Point};
use crate::sequence::DrawSink;

/// Holds the front buffer and performs the swap
#[derive(Debug)]
pub struct FrameCompositor {
    size: MatrixSize,
    front: Mutex<Frame>,
    swaps: AtomicU64,
}

impl FrameCompositor {
    /// Create a compositor with an all-black front buffer
    #[must_use]
    pub fn new(size: MatrixSize) -> Self {
        Self {
            size,
            front: Mutex::new(Frame::new(size)),
            swaps: AtomicU64::new(0),
        }
    }

    /// Matrix dimensions
    #[must_use]
    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// Exchange `back` with the front buffer
    ///
    /// On return `back` holds the previous front frame.
    pub fn swap(&self, back: &mut Frame) {
        {
            let mut front = self.front.lock();
            mem::swap(&mut *front, back);
        }
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current front buffer
    #[must_use]
    pub fn snapshot_front(&self) -> Frame {
        self.front.lock().clone()
    }

    /// Copy the front buffer into an existing frame without allocating
    pub fn copy_front_into(&self, target: &mut Frame) {
        target.copy_from(&self.front.lock());
    }

    /// Number of swaps performed so far
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }
}

/// How a writer handles pacing requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pace {
    /// Really sleep (hardware-paced)
    Sleep,
    /// Only account for the time (tests and off-device rendering)
    Simulated,
}

/// Draw sink that renders into the compositor's back buffer
///
/// One writer exists per runner. Every [`commit_frame`](DrawSink::commit_frame)
/// swaps the back buffer into the front and then waits `commit_delay` to
/// bound the draw rate.
#[derive(Debug)]
pub struct FrameWriter {
    back: Frame,
    compositor: Arc<FrameCompositor>,
    commit_delay: Duration,
    pace: Pace,
    elapsed: Duration,
}

impl FrameWriter {
    /// Create a hardware-paced writer
    #[must_use]
    pub fn new(compositor: Arc<FrameCompositor>, commit_delay: Duration) -> Self {
        Self {
            back: Frame::new(compositor.size()),
            compositor,
            commit_delay,
            pace: Pace::Sleep,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a writer whose delays advance a simulated clock instead of sleeping
    #[must_use]
    pub fn simulated(compositor: Arc<FrameCompositor>) -> Self {
        Self {
            pace: Pace::Simulated,
            ..Self::new(compositor, Duration::ZERO)
        }
    }

    /// Total time spent in pacing delays
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The compositor this writer swaps into
    #[must_use]
    pub fn compositor(&self) -> &Arc<FrameCompositor> {
        &self.compositor
    }

    fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        self.elapsed += duration;
        if self.pace == Pace::Sleep {
            thread::sleep(duration);
        }
    }
}

impl DrawSink for FrameWriter {
    fn size(&self) -> MatrixSize {
        self.back.size()
    }

    fn set_pixel(&mut self, point: Point, color: Color) {
        self.back.set(point, color);
    }

    fn commit_frame(&mut self) {
        self.compositor.swap(&mut self.back);
        self.pause(self.commit_delay);
    }

    fn delay(&mut self, duration: Duration) {
        self.pause(duration);
    }
}
