use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::Color;
use crate::matrix::Point;

use super::{grid_point, tail_factor, Animation, SequenceContext};

/// Longest tail a drop may have
const MAX_TAIL: i32 = 4;

#[derive(Clone, Copy, Debug)]
struct Raindrop {
    position: Point,
    color: Color,
    length: i32,
    speed: i32,
}

impl Raindrop {
    fn gone(&self) -> bool {
        self.position.row <= -self.length
    }
}

/// Drops that enter at the bottom of the strings and climb to the top
/// leaving a fading tail
///
/// One drop is spawned per frame until the budget is used up; the run ends
/// when the last drop has left the matrix.
#[derive(Debug)]
pub struct MatrixRain {
    palette: Vec<Color>,
    total: usize,
    frame_time: Duration,
    rng: StdRng,
    remaining: usize,
    drops: Vec<Raindrop>,
}

impl MatrixRain {
    /// `total` drops colored from `palette`
    #[must_use]
    pub fn new(palette: Vec<Color>, total: usize) -> Self {
        Self {
            palette,
            total,
            frame_time: Duration::from_millis(100),
            rng: StdRng::from_entropy(),
            remaining: 0,
            drops: Vec::new(),
        }
    }

    /// Classic green rain
    #[must_use]
    pub fn green() -> Self {
        Self::new(vec![Color::GREEN], 150)
    }

    /// Mostly green with red, white and yellow highlights
    #[must_use]
    pub fn four_colors() -> Self {
        Self::new(
            vec![
                Color::GREEN,
                Color::GREEN,
                Color::RED,
                Color::GREEN,
                Color::GREEN,
                Color::TRUE_WHITE,
                Color::YELLOW,
            ],
            200,
        )
    }

    /// Red and white, four to one
    #[must_use]
    pub fn dannebrog() -> Self {
        Self::new(
            vec![
                Color::RED,
                Color::RED,
                Color::RED,
                Color::RED,
                Color::TRUE_WHITE,
            ],
            200,
        )
    }

    /// Replace the random source, for reproducible runs
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0 && self.drops.is_empty()
    }

    fn spawn(&mut self, width: usize, height: usize) {
        if self.remaining == 0 || self.palette.is_empty() {
            self.remaining = 0;
            return;
        }
        let color = self.palette[self.rng.gen_range(0..self.palette.len())];
        let col = self.rng.gen_range(0..=width);
        if col < width {
            self.drops.push(Raindrop {
                position: grid_point(height, col),
                color,
                length: self.rng.gen_range(1..=MAX_TAIL),
                speed: self.rng.gen_range(1..=2),
            });
        }
        self.remaining -= 1;
    }
}

impl Animation for MatrixRain {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let size = ctx.size();
        self.remaining = self.total;
        self.drops.clear();

        while !self.is_finished() && !ctx.should_stop() {
            ctx.clear();
            for drop in &mut self.drops {
                drop.position.row -= drop.speed;
                ctx.set_pixel(drop.position, drop.color);
                for i in 1..=drop.length {
                    let tail = Point::new(drop.position.row + i, drop.position.col);
                    ctx.set_pixel(tail, drop.color * tail_factor(i, drop.length));
                }
            }
            self.drops.retain(|drop| !drop.gone());

            self.spawn(size.width, size.height);
            ctx.commit_frame();
            if !ctx.delay(self.frame_time) {
                return;
            }
        }
    }
}
