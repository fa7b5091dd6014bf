//! Installation test patterns

use std::time::Duration;

use crate::color::Color;

use super::{grid_point, Animation, SequenceContext};

/// Fills shown by [`TestColor`], in order
pub const TEST_COLORS: [Color; 5] = [
    Color::RED,
    Color::GREEN,
    Color::BLUE,
    Color::TRUE_WHITE,
    Color::BLACK,
];

/// Fills the whole grid with each of [`TEST_COLORS`], holding each for a second
#[derive(Clone, Debug)]
pub struct TestColor {
    hold: Duration,
}

impl TestColor {
    /// Create the pattern with the standard one-second hold
    #[must_use]
    pub fn new() -> Self {
        Self {
            hold: Duration::from_secs(1),
        }
    }
}

impl Default for TestColor {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for TestColor {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let cells = ctx.size().cell_count();
        for color in TEST_COLORS {
            if ctx.should_stop() {
                return;
            }
            for index in 0..cells {
                ctx.set_pixel_at(index, color);
            }
            ctx.commit_frame();
            if !ctx.delay(self.hold) {
                return;
            }
        }
    }
}

/// Lights one row red across every string, walking down the strings
#[derive(Clone, Debug)]
pub struct TestRed {
    step: Duration,
}

impl TestRed {
    /// Create the sweep with a 250 ms step
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: Duration::from_millis(250),
        }
    }
}

impl Default for TestRed {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for TestRed {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let size = ctx.size();
        for lit in 0..size.height {
            if ctx.should_stop() {
                return;
            }
            for col in 0..size.width {
                for row in 0..size.height {
                    let color = if row == lit { Color::RED } else { Color::BLACK };
                    ctx.set_pixel(grid_point(row, col), color);
                }
            }
            ctx.commit_frame();
            if !ctx.delay(self.step) {
                return;
            }
        }
    }
}
