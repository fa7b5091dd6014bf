//! Sequences
//!
//! A sequence is a unit of animation logic. It receives a
//! [`SequenceContext`] on every run, issues draw calls through it, commits
//! frames, and returns when it is finished or when its stop flag is raised.
//!
//! All variants live in the closed [`Sequence`] enum so the runner can hold
//! them without boxing. Built-ins implement [`Animation`] directly; script
//! sequences forward the same context to a [`ScriptEngine`](crate::script::ScriptEngine).
//!
//! # Lifecycle
//!
//! ```text
//! idle ──run()──► running ──StopFlag::request()──► stop-requested
//!                    │                                   │
//!                    └──────────── returns ──────────────┴──► terminated
//! ```
//!
//! A stopped sequence is never run again; restarting means building a
//! fresh instance.

mod context;
mod fade;
mod matrix_rain;
mod rainbow;
mod starfield;
mod test_pattern;
mod twist;

pub use context::{DrawSink, SequenceContext};
pub use fade::FadeColor;
pub use matrix_rain::MatrixRain;
pub use rainbow::RainbowCycle;
pub use starfield::Starfield;
pub use test_pattern::{TestColor, TestRed};
pub use twist::Twist;

#[cfg(test)]
pub(crate) use context::testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::matrix::Point;
use crate::script::ScriptSequence;

/// Grid coordinate from loop counters, which always fit the matrix
fn grid_point(row: usize, col: usize) -> Point {
    Point::new(
        i32::try_from(row).unwrap_or(i32::MAX),
        i32::try_from(col).unwrap_or(i32::MAX),
    )
}

/// Brightness of tail cell `index` (1-based) behind a particle of `length`
fn tail_factor(index: i32, length: i32) -> f32 {
    0.5 * (1.0 - index as f32 / length as f32) + 0.2
}

/// Cooperative cancellation flag shared between a sequence and the runner
///
/// Once requested it stays requested.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a flag in the "keep running" state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the sequence to return at its next checkpoint
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether a stop was requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identifying metadata reported to control clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInfo {
    /// Stable identifier
    pub id: String,
    /// Display name, also the key used by `runSequences`
    pub name: String,
    /// Human-readable description
    pub description: String,
}

impl SequenceInfo {
    /// Create sequence metadata
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Animation logic driven through a [`SequenceContext`]
pub trait Animation {
    /// Render until the animation is complete or a stop is requested
    ///
    /// Implementations check [`SequenceContext::should_stop`] at least once
    /// per committed frame. Each call starts the animation from the
    /// beginning.
    fn run(&mut self, ctx: &mut SequenceContext<'_>);
}

/// Every kind of sequence the runner can execute
#[derive(Debug)]
pub enum Sequence {
    /// Full-grid color test
    TestColor(TestColor),
    /// Row-by-row red sweep
    TestRed(TestRed),
    /// White spiral
    Twist(Twist),
    /// Rainbow wheel cycle
    Rainbow(RainbowCycle),
    /// Twinkling stars and fireworks
    Starfield(Starfield),
    /// Falling drops
    MatrixRain(MatrixRain),
    /// Endless red/green fade
    FadeColor(FadeColor),
    /// Body supplied by the scripting engine
    Script(ScriptSequence),
}

impl Sequence {
    /// Execute the sequence against `ctx`
    pub fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        match self {
            Self::TestColor(animation) => animation.run(ctx),
            Self::TestRed(animation) => animation.run(ctx),
            Self::Twist(animation) => animation.run(ctx),
            Self::Rainbow(animation) => animation.run(ctx),
            Self::Starfield(animation) => animation.run(ctx),
            Self::MatrixRain(animation) => animation.run(ctx),
            Self::FadeColor(animation) => animation.run(ctx),
            Self::Script(animation) => animation.run(ctx),
        }
    }

    /// Short variant label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TestColor(_) => "test_color",
            Self::TestRed(_) => "test_red",
            Self::Twist(_) => "twist",
            Self::Rainbow(_) => "rainbow",
            Self::Starfield(_) => "starfield",
            Self::MatrixRain(_) => "matrix_rain",
            Self::FadeColor(_) => "fade_color",
            Self::Script(_) => "script",
        }
    }

    /// Whether the body comes from the scripting engine
    #[must_use]
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script(_))
    }
}
