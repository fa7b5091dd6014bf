//! Twinkling stars and fireworks
//!
//! Both effects spawn short-lived points that brighten and fade with an
//! elastic ease. Stars use one fixed color and pace; fireworks pick one
//! palette color per run and give every burst its own pace.

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::Color;
use crate::matrix::Point;

use super::{grid_point, Animation, SequenceContext};

/// New points attempted per frame
const SPAWNS_PER_FRAME: usize = 5;

/// Palette used by the fireworks preset
pub const FIREWORK_COLORS: [Color; 9] = [
    Color::PINK,
    Color::GREEN,
    Color::BLUE,
    Color::RED,
    Color::YELLOW,
    Color::TRUE_WHITE,
    Color::PURPLE,
    Color::MAGENTA,
    Color::ORANGE,
];

/// Elastic ease-in-out over `[0, 1]`
fn ease_in_out_elastic(x: f32) -> f32 {
    let c5 = (2.0 * PI) / 4.5;
    if x == 0.0 {
        0.0
    } else if x == 1.0 {
        1.0
    } else if x < 0.5 {
        -(2f32.powf(20.0 * x - 10.0) * ((20.0 * x - 11.125) * c5).sin()) / 2.0
    } else {
        (2f32.powf(-20.0 * x + 10.0) * ((20.0 * x - 11.125) * c5).sin()) / 2.0 + 1.0
    }
}

#[derive(Clone, Debug)]
struct Star {
    position: Point,
    color: Color,
    time: f32,
    step: f32,
    velocity: f32,
    done: bool,
}

impl Star {
    fn new(position: Point, color: Color, step: f32) -> Self {
        Self {
            position,
            color,
            time: 0.0,
            step,
            velocity: step,
            done: false,
        }
    }

    /// Advance one frame and return the color to draw
    fn advance(&mut self) -> Color {
        self.time += self.velocity;
        if self.time >= 1.0 {
            self.velocity = -self.step;
        }
        if self.time <= 0.0 {
            self.time = 0.0;
            self.done = true;
        }
        self.color * ease_in_out_elastic(self.time)
    }
}

#[derive(Clone, Debug)]
enum Palette {
    Fixed(Color),
    OnePerRun(Vec<Color>),
}

#[derive(Clone, Copy, Debug)]
enum Pace {
    Fixed(f32),
    Random { min: f32, max: f32 },
}

/// Field of points that flare up and fade out
#[derive(Debug)]
pub struct Starfield {
    total: usize,
    palette: Palette,
    pace: Pace,
    rng: StdRng,
    remaining: usize,
    color: Color,
    stars: Vec<Star>,
}

impl Starfield {
    /// Up to 600 stars in `color`
    #[must_use]
    pub fn stars(color: Color) -> Self {
        Self::build(600, Palette::Fixed(color), Pace::Fixed(0.1))
    }

    /// Up to 800 bursts in one color drawn from [`FIREWORK_COLORS`]
    #[must_use]
    pub fn fireworks() -> Self {
        Self::build(
            800,
            Palette::OnePerRun(FIREWORK_COLORS.to_vec()),
            Pace::Random { min: 0.1, max: 0.2 },
        )
    }

    /// Replace the random source, for reproducible runs
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Cap the number of points spawned per run
    #[must_use]
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    fn build(total: usize, palette: Palette, pace: Pace) -> Self {
        Self {
            total,
            palette,
            pace,
            rng: StdRng::from_entropy(),
            remaining: 0,
            color: Color::TRUE_WHITE,
            stars: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.remaining = self.total;
        self.stars.clear();
        self.color = match &self.palette {
            Palette::Fixed(color) => *color,
            Palette::OnePerRun(colors) if !colors.is_empty() => {
                colors[self.rng.gen_range(0..colors.len())]
            }
            Palette::OnePerRun(_) => Color::TRUE_WHITE,
        };
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0 && self.stars.is_empty()
    }

    /// Try to spawn one point
    ///
    /// A draw of `width` for the column is a miss that still uses up one
    /// spawn. Landing on an occupied cell is dropped without using one up.
    fn spawn(&mut self, width: usize, height: usize) {
        if self.remaining == 0 {
            return;
        }
        let col = self.rng.gen_range(0..=width);
        if col < width {
            let row = self.rng.gen_range(0..height);
            let position = grid_point(row, col);
            if self.stars.iter().any(|star| star.position == position) {
                return;
            }
            let step = match self.pace {
                Pace::Fixed(step) => step,
                Pace::Random { min, max } => self.rng.gen_range(min..=max),
            };
            self.stars.push(Star::new(position, self.color, step));
        }
        self.remaining -= 1;
    }
}

impl Animation for Starfield {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        let size = ctx.size();
        if size.cell_count() == 0 {
            return;
        }

        self.reset();
        self.spawn(size.width, size.height);

        while !self.is_finished() && !ctx.should_stop() {
            ctx.clear();
            for star in &mut self.stars {
                let color = star.advance();
                ctx.set_pixel(star.position, color);
            }
            self.stars.retain(|star| !star.done);

            for _ in 0..SPAWNS_PER_FRAME {
                self.spawn(size.width, size.height);
            }
            ctx.commit_frame();
        }
    }
}
