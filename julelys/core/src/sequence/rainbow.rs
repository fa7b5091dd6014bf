use std::time::Duration;

use crate::color::wheel;

use super::{grid_point, Animation, SequenceContext};

/// Steps in one trip around the wheel
const WHEEL_STEPS: usize = 255;

/// Rotates the color wheel along every string
///
/// The wheel is spread over the string's height so each string shows one
/// full rainbow, and the whole pattern shifts one wheel position per frame.
#[derive(Clone, Debug)]
pub struct RainbowCycle {
    iterations: usize,
    step: Duration,
}

impl RainbowCycle {
    /// Cycle `iterations` times around the wheel at 30 ms per step
    #[must_use]
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            step: Duration::from_millis(30),
        }
    }
}

impl Default for RainbowCycle {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Animation for RainbowCycle {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let size = ctx.size();
        if size.height == 0 {
            return;
        }

        for shift in 0..WHEEL_STEPS * self.iterations {
            if ctx.should_stop() {
                return;
            }
            for col in 0..size.width {
                for row in 0..size.height {
                    let position = ((row * 255 / size.height) + shift) & 255;
                    ctx.set_pixel(grid_point(row, col), wheel(position as u8));
                }
            }
            ctx.commit_frame();
            if !ctx.delay(self.step) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixSize, Point};
    use crate::sequence::testing::RecordingSink;
    use crate::sequence::StopFlag;

    #[test]
    fn test_frame_count_and_shift() {
        let stop = StopFlag::new();
        let size = MatrixSize::new(2, 5);
        let mut sink = RecordingSink::new(size);
        RainbowCycle::new(1).run(&mut SequenceContext::new(&mut sink, &stop));

        assert_eq!(sink.frames.len(), 255);
        assert_eq!(sink.frames[0].get(Point::new(0, 0)), Some(wheel(0)));
        assert_eq!(sink.frames[10].get(Point::new(0, 1)), Some(wheel(10)));
        assert_eq!(sink.frames[0].get(Point::new(2, 0)), Some(wheel(102)));
    }

    #[test]
    fn test_stops_on_request() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::stopping_after(MatrixSize::new(2, 5), 3, stop.clone());
        RainbowCycle::default().run(&mut SequenceContext::new(&mut sink, &stop));
        assert_eq!(sink.frames.len(), 3);
    }
}
