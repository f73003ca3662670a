//! tickjob-runner: fail-fast pipelines of external processes.
//!
//! A [`Pipeline`](types::Pipeline) is an ordered list of steps run by
//! [`PipelineRunner`](runner::PipelineRunner). Two execution modes:
//! - `Unattended`: output goes to the log, failures never wait for anyone
//! - `Attended`: a sized foreground console, failures wait for Enter
//!
//! Steps are launched through the [`StepLauncher`](launcher::StepLauncher)
//! trait so the runner can be driven without real processes.

pub mod ack;
pub mod error;
pub mod launcher;
pub mod runner;
pub mod surface;
pub mod truncate;
pub mod types;

pub use error::{Result, RunnerError};
pub use runner::PipelineRunner;
pub use types::{ExecutionMode, Pipeline, PipelineResult, PipelineStep};
