//! Off-Device Preview
//!
//! Runs a sequence against a synthetic [`DrawSink`] instead of the
//! compositor. Every commit records a copy of the back buffer, delays only
//! advance a simulated clock, and the sink raises the sequence's stop flag
//! once enough frames are in, so even endless sequences return.

use std::time::Duration;

use tracing::debug;

use crate::color::Color;
use crate::frame::Frame;
use crate::matrix::{MatrixSize, Point};
use crate::output::FrameEncoder;
use crate::sequence::{DrawSink, Sequence, SequenceContext, StopFlag};

/// Frames captured when the request does not say
pub const DEFAULT_PREVIEW_FRAMES: usize = 30;

/// Upper bound on captured frames
pub const MAX_PREVIEW_FRAMES: usize = 300;

/// Clamp a requested frame count into `1..=MAX_PREVIEW_FRAMES`
#[must_use]
pub fn clamp_frames(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_PREVIEW_FRAMES)
        .clamp(1, MAX_PREVIEW_FRAMES)
}

/// Draw sink that records committed frames
#[derive(Debug)]
pub struct PreviewSink {
    back: Frame,
    frames: Vec<Frame>,
    max_frames: usize,
    stop: StopFlag,
    elapsed: Duration,
}

impl PreviewSink {
    /// Capture at most `max_frames`, raising `stop` when the limit is hit
    #[must_use]
    pub fn new(size: MatrixSize, max_frames: usize, stop: StopFlag) -> Self {
        Self {
            back: Frame::new(size),
            frames: Vec::with_capacity(max_frames),
            max_frames,
            stop,
            elapsed: Duration::ZERO,
        }
    }

    /// Simulated time spent in delays
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Captured frames, oldest first
    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl DrawSink for PreviewSink {
    fn size(&self) -> MatrixSize {
        self.back.size()
    }

    fn set_pixel(&mut self, point: Point, color: Color) {
        self.back.set(point, color);
    }

    fn commit_frame(&mut self) {
        if self.frames.len() >= self.max_frames {
            return;
        }
        self.frames.push(self.back.clone());
        if self.frames.len() == self.max_frames {
            self.stop.request();
        }
    }

    fn delay(&mut self, duration: Duration) {
        self.elapsed += duration;
    }
}

/// Frames captured from one preview run
#[derive(Clone, Debug)]
pub struct Preview {
    /// Captured frames, oldest first
    pub frames: Vec<Frame>,
    /// Simulated running time of the capture
    pub elapsed: Duration,
}

impl Preview {
    /// Encode every frame with `encoder` and hex it
    #[must_use]
    pub fn hex_frames(&self, encoder: &dyn FrameEncoder) -> Vec<String> {
        self.frames
            .iter()
            .map(|frame| hex::encode(encoder.encode(frame)))
            .collect()
    }
}

/// Run `sequence` off-device and capture up to `max_frames`
///
/// `stop` lets the caller abandon the run early; it is also raised by the
/// sink once the frame limit is reached.
pub fn capture(sequence: &mut Sequence, size: MatrixSize, max_frames: usize, stop: StopFlag) -> Preview {
    let mut sink = PreviewSink::new(size, max_frames, stop.clone());
    {
        let mut ctx = SequenceContext::new(&mut sink, &stop);
        sequence.run(&mut ctx);
    }
    let elapsed = sink.elapsed();
    let frames = sink.into_frames();
    debug!(kind = sequence.kind(), frames = frames.len(), "Preview captured");
    Preview { frames, elapsed }
}
