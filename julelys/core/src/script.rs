//! Scripting Collaborator
//!
//! User-authored sequences carry their body as script text. The language and
//! its interpreter live outside this crate behind [`ScriptEngine`]; the engine
//! only gets a [`SequenceContext`], so a script can do exactly what a
//! built-in can: read the matrix size, set pixels, commit frames, delay, and
//! observe its stop flag.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::sequence::{Animation, SequenceContext};

/// Errors raised while executing a script
#[derive(Debug, Error)]
pub enum ScriptError {
    /// No interpreter is linked into this build
    #[error("no script engine is available")]
    EngineUnavailable,

    /// The script text could not be parsed
    #[error("script failed to compile: {0}")]
    Compile(String),

    /// The script raised an error while running
    #[error("script failed at runtime: {0}")]
    Runtime(String),
}

/// Interpreter for sequence scripts
pub trait ScriptEngine: Send + Sync {
    /// Execute `code` until it finishes, fails, or observes a stop request
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptError`] if the script cannot be compiled or fails
    /// while running.
    fn run(&self, code: &str, ctx: &mut SequenceContext<'_>) -> Result<(), ScriptError>;

    /// Engine name for logs
    fn name(&self) -> &str {
        "script"
    }
}

/// Engine used when no interpreter is configured
///
/// Every run fails with [`ScriptError::EngineUnavailable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableEngine;

impl ScriptEngine for UnavailableEngine {
    fn run(&self, _code: &str, _ctx: &mut SequenceContext<'_>) -> Result<(), ScriptError> {
        Err(ScriptError::EngineUnavailable)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// A sequence whose body is script text
///
/// Script failures never reach the runner: the first failure is logged at
/// `warn`, repeats at `debug`.
pub struct ScriptSequence {
    name: String,
    code: Arc<str>,
    engine: Arc<dyn ScriptEngine>,
    failures: u64,
}

impl ScriptSequence {
    /// Bind `code` to `engine`
    pub fn new(name: impl Into<String>, code: Arc<str>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            name: name.into(),
            code,
            engine,
            failures: 0,
        }
    }

    /// Script text
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of runs that ended in an error
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl fmt::Debug for ScriptSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSequence")
            .field("name", &self.name)
            .field("engine", &self.engine.name())
            .field("code_len", &self.code.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl Animation for ScriptSequence {
    fn run(&mut self, ctx: &mut SequenceContext<'_>) {
        if let Err(e) = self.engine.run(&self.code, ctx) {
            self.failures += 1;
            if self.failures == 1 {
                warn!(sequence = %self.name, engine = self.engine.name(), error = %e, "Script sequence failed");
            } else {
                debug!(sequence = %self.name, failures = self.failures, error = %e, "Script sequence failed again");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::matrix::{MatrixSize, Point};
    use crate::sequence::testing::RecordingSink;
    use crate::sequence::StopFlag;

    /// Interprets each line `row col` as a red pixel, then commits
    struct LineEngine;

    impl ScriptEngine for LineEngine {
        fn run(&self, code: &str, ctx: &mut SequenceContext<'_>) -> Result<(), ScriptError> {
            for line in code.lines() {
                let mut parts = line.split_whitespace().map(str::parse::<i32>);
                match (parts.next(), parts.next()) {
                    (Some(Ok(row)), Some(Ok(col))) => {
                        ctx.set_pixel(Point::new(row, col), Color::RED);
                    }
                    _ => return Err(ScriptError::Compile(format!("bad line: {line}"))),
                }
            }
            ctx.commit_frame();
            Ok(())
        }
    }

    #[test]
    fn test_script_draws_through_context() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::new(MatrixSize::new(2, 2));
        let mut seq = ScriptSequence::new("dots", Arc::from("0 0\n1 1"), Arc::new(LineEngine));
        seq.run(&mut SequenceContext::new(&mut sink, &stop));

        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].get(Point::new(1, 1)), Some(Color::RED));
        assert_eq!(seq.failures(), 0);
    }

    #[test]
    fn test_failures_are_contained() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::new(MatrixSize::new(2, 2));
        let mut seq = ScriptSequence::new("broken", Arc::from("nope"), Arc::new(LineEngine));

        seq.run(&mut SequenceContext::new(&mut sink, &stop));
        seq.run(&mut SequenceContext::new(&mut sink, &stop));
        assert_eq!(seq.failures(), 2);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_unavailable_engine() {
        let stop = StopFlag::new();
        let mut sink = RecordingSink::new(MatrixSize::new(1, 1));
        let result = UnavailableEngine.run("", &mut SequenceContext::new(&mut sink, &stop));
        assert!(matches!(result, Err(ScriptError::EngineUnavailable)));
    }
}
