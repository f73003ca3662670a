//! Fail-fast execution of a pipeline.

use tracing::{error, info, warn};

use crate::ack::{Acknowledger, StdinAcknowledger};
use crate::error::RunnerError;
use crate::launcher::{ProcessLauncher, StepLauncher};
use crate::surface::{SurfaceAllocator, TerminalAllocator};
use crate::types::{ExecutionMode, Pipeline, PipelineResult, PipelineStep, StepExit};

/// Runs pipelines step by step, stopping at the first failure.
pub struct PipelineRunner {
    launcher: Box<dyn StepLauncher>,
    acknowledger: Box<dyn Acknowledger>,
    allocator: Box<dyn SurfaceAllocator>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new(ProcessLauncher::default())
    }
}

impl PipelineRunner {
    pub fn new(launcher: impl StepLauncher + 'static) -> Self {
        Self {
            launcher: Box::new(launcher),
            acknowledger: Box::new(StdinAcknowledger),
            allocator: Box::new(TerminalAllocator),
        }
    }

    pub fn with_acknowledger(mut self, acknowledger: impl Acknowledger + 'static) -> Self {
        self.acknowledger = Box::new(acknowledger);
        self
    }

    pub fn with_allocator(mut self, allocator: impl SurfaceAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Run every step of `pipeline` in order.
    ///
    /// A step starts only after the previous one exited with 0. The first
    /// failure ends the run: later steps are never launched and completed
    /// ones are not undone. The failure is logged before anything else
    /// happens; attended pipelines then wait for the operator.
    pub async fn run(&self, pipeline: &Pipeline) -> PipelineResult {
        info!(
            pipeline = %pipeline.name,
            mode = %pipeline.mode,
            steps = pipeline.steps.len(),
            "starting pipeline"
        );

        if let ExecutionMode::Attended { surface } = &pipeline.mode {
            if let Err(e) = self.allocator.allocate(surface) {
                warn!(pipeline = %pipeline.name, "could not prepare console: {e}");
            }
        }

        for (index, step) in pipeline.steps.iter().enumerate() {
            info!(
                pipeline = %pipeline.name,
                step = index + 1,
                name = %step.name,
                command = %step.redacted_command_line(),
                "launching step"
            );

            let exit = match self.launcher.launch(step, &pipeline.mode).await {
                Ok(exit) => exit,
                Err(RunnerError::Interrupted) => {
                    warn!(pipeline = %pipeline.name, step = index + 1, "stopped by operator");
                    return PipelineResult::interrupted(pipeline, index);
                }
                Err(e) => {
                    self.report_failure(pipeline, index, step, &StepExit::default(), Some(&e))
                        .await;
                    return PipelineResult::failure(pipeline, index, None);
                }
            };

            if !exit.success() {
                self.report_failure(pipeline, index, step, &exit, None).await;
                return PipelineResult::failure(pipeline, index, exit.code);
            }
            info!(
                pipeline = %pipeline.name,
                step = index + 1,
                artifact = %step.expected_artifact,
                "step completed"
            );
        }

        let result = PipelineResult::success(pipeline);
        info!(
            pipeline = %pipeline.name,
            artifacts = %result.artifacts.join(", "),
            "pipeline completed"
        );
        result
    }

    async fn report_failure(
        &self,
        pipeline: &Pipeline,
        index: usize,
        step: &PipelineStep,
        exit: &StepExit,
        launch_error: Option<&RunnerError>,
    ) {
        let skipped = pipeline.steps.len() - index - 1;
        match launch_error {
            Some(e) => error!(
                pipeline = %pipeline.name,
                step = index + 1,
                name = %step.name,
                skipped,
                "step could not be started: {e}"
            ),
            None => error!(
                pipeline = %pipeline.name,
                step = index + 1,
                name = %step.name,
                exit_code = ?exit.code,
                skipped,
                "step failed"
            ),
        }
        if let Some(tail) = &exit.stderr_tail {
            error!(pipeline = %pipeline.name, step = index + 1, "stderr:\n{tail}");
        }

        if pipeline.mode.is_attended() {
            let prompt = format!(
                "Step {} ({}) failed. Press Enter to close...",
                index + 1,
                step.name
            );
            self.acknowledger.acknowledge(&prompt).await;
        }
    }
}
