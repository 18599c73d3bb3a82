//! Audio pattern evaluator abstraction
//!
//! The evaluator is the external engine that turns generated scripts into
//! sound. The session only talks to it through [`AudioEvaluator`]; the
//! built-in implementations hand scripts to a writer or a watched file for
//! a live-coding engine running elsewhere.

pub mod file;
pub mod samples;
pub mod writer;

pub use file::FileEvaluator;
pub use samples::SampleMap;
pub use writer::WriterEvaluator;

use std::sync::Arc;

use serde::Serialize;

use crate::error::EvaluatorError;
use crate::visualizer::SignalTap;

/// Result type alias for evaluator operations.
pub type Result<T> = std::result::Result<T, EvaluatorError>;

/// State of the evaluator's audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// Created but not producing audio; call [`AudioEvaluator::resume`].
    Suspended,
    /// Producing audio.
    Running,
}

/// External engine that evaluates pattern scripts.
///
/// Implementations use `&self` with interior mutability so one evaluator
/// can be shared between the session task and its dispatcher.
#[async_trait::async_trait]
pub trait AudioEvaluator: Send + Sync {
    /// Replaces the playing pattern with `script`.
    async fn evaluate(&self, script: &str) -> Result<()>;

    /// Current audio context state.
    fn context_state(&self) -> ContextState;

    /// Resumes a suspended audio context.
    async fn resume(&self) -> Result<()>;

    /// Registers sample banks. Called once per session task.
    async fn register_samples(&self, _samples: &SampleMap) -> Result<()> {
        Ok(())
    }

    /// Returns the output tap, if this evaluator exposes its audio.
    fn try_get_output_tap(&self) -> Option<Arc<dyn SignalTap>> {
        None
    }

    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;
}
