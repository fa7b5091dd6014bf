use crate::color::Color;
use crate::matrix::Point;

use super::{grid_point, tail_factor, Animation, SequenceContext};

/// Cells trailing each ball
const TAIL_LENGTH: i32 = 4;

#[derive(Clone, Copy, Debug)]
struct Ball {
    position: Point,
}

/// One ball per string, staggered so together they trace a spiral
///
/// String `c` starts its ball at row `-c`. Every frame each ball advances
/// one row; the run ends once every ball has left the bottom.
#[derive(Clone, Debug)]
pub struct Twist {
    color: Color,
    balls: Vec<Ball>,
}

impl Twist {
    /// Spiral in `color`
    #[must_use]
    pub fn new(color: Color) -> Self {
        Self {
            color,
            balls: Vec::new(),
        }
    }

    fn reset(&mut self, width: usize) {
        self.balls = (0..width)
            .map(|col| {
                let col = grid_point(0, col).col;
                Ball {
                    position: Point::new(-col, col),
                }
            })
            .collect();
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::new(Color::TRUE_WHITE)
    }
}

impl Animation for Twist {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        self.reset(ctx.width());
        let height = grid_point(ctx.height(), 0).row;

        while !self.balls.is_empty() && !ctx.should_stop() {
            ctx.clear();
            for ball in &mut self.balls {
                ball.position.row += 1;
                ctx.set_pixel(ball.position, self.color);
                for i in 1..=TAIL_LENGTH {
                    let tail = Point::new(ball.position.row - i, ball.position.col);
                    ctx.set_pixel(tail, self.color * tail_factor(i, TAIL_LENGTH));
                }
            }
            self.balls.retain(|ball| ball.position.row <= height);
            ctx.commit_frame();
        }
    }
}
