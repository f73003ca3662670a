//! Error types for the tickjob-runner crate.

use thiserror::Error;

/// Errors raised while launching or supervising a pipeline step.
///
/// A step that runs and exits non-zero is not an error: it is reported
/// through [`crate::types::PipelineResult`].
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The step's process could not be started.
    #[error("Failed to launch {step}: {reason}")]
    Spawn { step: String, reason: String },

    /// Underlying I/O failure while supervising the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operator interrupted the run (Ctrl+C).
    #[error("Interrupted by operator")]
    Interrupted,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
