//! Draw-call sink and the per-run context handed to sequences

use std::thread;
use std::time::Duration;

use crate::color::Color;
use crate::matrix::{MatrixSize, Point};

use super::StopFlag;

/// Longest uninterrupted sleep inside [`SequenceContext::delay`]
const DELAY_SLICE: Duration = Duration::from_millis(20);

/// Receiver of draw calls
///
/// The runner passes a [`FrameWriter`](crate::compositor::FrameWriter) that
/// renders into the compositor; previews pass a recording sink instead. The
/// same sequence code drives both.
pub trait DrawSink: Send {
    /// Matrix dimensions seen by the sequence
    fn size(&self) -> MatrixSize;

    /// Write one cell of the current frame; off-grid points are ignored
    fn set_pixel(&mut self, point: Point, color: Color);

    /// Write one cell by column-major linear index
    fn set_pixel_at(&mut self, index: usize, color: Color) {
        let point = self.size().point_at(index);
        self.set_pixel(point, color);
    }

    /// Finish the current frame
    fn commit_frame(&mut self);

    /// Pace the animation
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Everything a running sequence may touch
///
/// Wraps the sink with the sequence's stop flag so pacing delays wake up as
/// soon as a stop is requested.
pub struct SequenceContext<'a> {
    sink: &'a mut dyn DrawSink,
    stop: &'a StopFlag,
}

impl<'a> SequenceContext<'a> {
    /// Bind a sink and a stop flag for one run
    pub fn new(sink: &'a mut dyn DrawSink, stop: &'a StopFlag) -> Self {
        Self { sink, stop }
    }

    /// Matrix dimensions
    #[must_use]
    pub fn size(&self) -> MatrixSize {
        self.sink.size()
    }

    /// Number of strings
    #[must_use]
    pub fn width(&self) -> usize {
        self.size().width
    }

    /// LEDs per string
    #[must_use]
    pub fn height(&self) -> usize {
        self.size().height
    }

    /// Write a cell by coordinate
    pub fn set_pixel(&mut self, point: Point, color: Color) {
        self.sink.set_pixel(point, color);
    }

    /// Write a cell by linear index
    pub fn set_pixel_at(&mut self, index: usize, color: Color) {
        self.sink.set_pixel_at(index, color);
    }

    /// Set every cell of the back buffer
    pub fn fill(&mut self, color: Color) {
        for index in 0..self.size().cell_count() {
            self.sink.set_pixel_at(index, color);
        }
    }

    /// Set every cell of the back buffer to black
    pub fn clear(&mut self) {
        self.fill(Color::BLACK);
    }

    /// Signal the end of one logical frame
    pub fn commit_frame(&mut self) {
        self.sink.commit_frame();
    }

    /// Check the cooperative stop flag
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.is_requested()
    }

    /// Sleep for `duration`, returning early once a stop is requested
    ///
    /// Returns `false` if the delay was cut short.
    pub fn delay(&mut self, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.should_stop() {
                return false;
            }
            let slice = remaining.min(DELAY_SLICE);
            self.sink.delay(slice);
            remaining -= slice;
        }
        !self.should_stop()
    }

    /// Millisecond form of [`delay`](Self::delay)
    pub fn delay_ms(&mut self, millis: u64) -> bool {
        self.delay(Duration::from_millis(millis))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_delay_is_sliced() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::new(MatrixSize::new(1, 1));
        let mut ctx = SequenceContext::new(&mut sink, &stop);

        assert!(ctx.delay_ms(1000));
        assert_eq!(sink.slept, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_returns_early_when_stopped() {
        let stop = StopFlag::new();
        stop.request();
        let mut sink = RecordingSink::new(MatrixSize::new(1, 1));
        let mut ctx = SequenceContext::new(&mut sink, &stop);

        assert!(!ctx.delay_ms(1000));
        assert_eq!(sink.slept, Duration::ZERO);
    }

    #[test]
    fn test_linear_write_uses_column_major_mapping() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::new(MatrixSize::new(3, 4));
        let mut ctx = SequenceContext::new(&mut sink, &stop);

        ctx.set_pixel_at(5, Color::RED);
        ctx.commit_frame();

        assert_eq!(sink.frames[0].get(Point::new(1, 1)), Some(Color::RED));
    }
}
