use crate::color::Color;

use super::{Animation, SequenceContext};

/// Even cells breathe red while odd cells stay green
///
/// Runs until stopped. The red level moves one step per frame and bounces
/// between 0 and 255; the level survives across runs.
#[derive(Clone, Debug, Default)]
pub struct FadeColor {
    level: u8,
    falling: bool,
}

impl FadeColor {
    /// Start from black, fading up
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn step(&mut self) {
        if self.falling {
            self.level = self.level.saturating_sub(1);
            if self.level == 0 {
                self.falling = false;
            }
        } else {
            self.level = self.level.saturating_add(1);
            if self.level == u8::MAX {
                self.falling = true;
            }
        }
    }
}

impl Animation for FadeColor {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let cells = ctx.size().cell_count();
        while !ctx.should_stop() {
            let red = Color::rgb(self.level, 0, 0);
            for index in 0..cells {
                let color = if index % 2 == 0 { red } else { Color::GREEN };
                ctx.set_pixel_at(index, color);
            }
            ctx.commit_frame();
            self.step();
        }
    }
}
