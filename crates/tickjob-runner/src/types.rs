//! Pipelines, their steps and the result of running one.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::surface::ConsoleSurface;

/// Flags whose following argument is a credential and must never be logged.
pub const REDACTED_FLAGS: &[&str] = &["--appkey", "--secret"];

/// Process exit code used when the operator interrupts a run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

// ---------------------------------------------------------------------------
// PipelineStep
// ---------------------------------------------------------------------------

/// One external process invocation. Exit code 0 is success, anything else
/// is failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Short label used in logs and diagnostics.
    pub name: String,
    pub program: PathBuf,
    pub arguments: Vec<String>,
    /// What the step leaves behind on success, for reporting.
    pub expected_artifact: String,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl PipelineStep {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        expected_artifact: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            arguments: Vec::new(),
            expected_artifact: expected_artifact.into(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The command line with the value of every credential flag masked.
    pub fn redacted_command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        let mut mask_next = false;
        for arg in &self.arguments {
            if mask_next {
                parts.push("***".to_string());
                mask_next = false;
                continue;
            }
            match arg.split_once('=') {
                Some((flag, _)) if REDACTED_FLAGS.contains(&flag) => {
                    parts.push(format!("{flag}=***"));
                }
                _ => {
                    mask_next = REDACTED_FLAGS.contains(&arg.as_str());
                    parts.push(arg.clone());
                }
            }
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// ExecutionMode / Pipeline
// ---------------------------------------------------------------------------

/// Whether anyone is watching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionMode {
    /// No console. Diagnostics go to the log only and nothing ever blocks
    /// waiting for a person.
    Unattended,
    /// Runs in a foreground console sized by the surface; failures wait for
    /// the operator to acknowledge them.
    Attended { surface: ConsoleSurface },
}

impl ExecutionMode {
    pub fn is_attended(&self) -> bool {
        matches!(self, ExecutionMode::Attended { .. })
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Unattended => write!(f, "unattended"),
            ExecutionMode::Attended { .. } => write!(f, "attended"),
        }
    }
}

/// An ordered sequence of dependent steps. Step `i + 1` only starts after
/// step `i` exited with 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub mode: ExecutionMode,
    pub steps: Vec<PipelineStep>,
}

// ---------------------------------------------------------------------------
// StepExit / PipelineResult
// ---------------------------------------------------------------------------

/// How a launched step ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Last part of stderr, when it was captured.
    pub stderr_tail: Option<String>,
}

impl StepExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr_tail: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Outcome of one pipeline run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub pipeline: String,
    pub succeeded: bool,
    /// Zero-based index of the step that failed or was interrupted.
    pub failed_step_index: Option<usize>,
    /// Exit code of that step, if it produced one.
    pub exit_code: Option<i32>,
    /// Expected artifacts of every step, in order. Empty unless succeeded.
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub interrupted: bool,
}

impl PipelineResult {
    pub fn success(pipeline: &Pipeline) -> Self {
        Self {
            pipeline: pipeline.name.clone(),
            succeeded: true,
            failed_step_index: None,
            exit_code: None,
            artifacts: pipeline
                .steps
                .iter()
                .map(|s| s.expected_artifact.clone())
                .collect(),
            interrupted: false,
        }
    }

    pub fn failure(pipeline: &Pipeline, index: usize, exit_code: Option<i32>) -> Self {
        Self {
            pipeline: pipeline.name.clone(),
            succeeded: false,
            failed_step_index: Some(index),
            exit_code,
            artifacts: Vec::new(),
            interrupted: false,
        }
    }

    pub fn interrupted(pipeline: &Pipeline, index: usize) -> Self {
        Self {
            interrupted: true,
            ..Self::failure(pipeline, index, None)
        }
    }

    /// Exit code for the `tickjob` process itself.
    pub fn process_exit_code(&self) -> i32 {
        if self.succeeded {
            0
        } else if self.interrupted {
            INTERRUPTED_EXIT_CODE
        } else {
            1
        }
    }
}
