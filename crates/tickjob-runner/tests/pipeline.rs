// Fail-fast ordering, artifact reporting and the attended/unattended split,
// driven through a recording launcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tickjob_runner::ack::Acknowledger;
use tickjob_runner::launcher::StepLauncher;
use tickjob_runner::surface::{ConsoleSurface, SurfaceAllocator};
use tickjob_runner::types::StepExit;
use tickjob_runner::{ExecutionMode, Pipeline, PipelineRunner, PipelineStep, RunnerError};

/// Records launches in order and exits with a preset code per step.
#[derive(Clone, Default)]
struct RecordingLauncher {
    launched: Arc<Mutex<Vec<String>>>,
    exits: HashMap<String, i32>,
    interrupt: Option<String>,
    unlaunchable: Option<String>,
}

impl RecordingLauncher {
    fn exiting(mut self, step: &str, code: i32) -> Self {
        self.exits.insert(step.to_string(), code);
        self
    }

    fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepLauncher for RecordingLauncher {
    async fn launch(
        &self,
        step: &PipelineStep,
        _mode: &ExecutionMode,
    ) -> tickjob_runner::Result<StepExit> {
        self.launched.lock().unwrap().push(step.name.clone());
        if self.interrupt.as_deref() == Some(step.name.as_str()) {
            return Err(RunnerError::Interrupted);
        }
        if self.unlaunchable.as_deref() == Some(step.name.as_str()) {
            return Err(RunnerError::Spawn {
                step: step.name.clone(),
                reason: "not found".to_string(),
            });
        }
        Ok(StepExit::from_code(*self.exits.get(&step.name).unwrap_or(&0)))
    }
}

#[derive(Clone, Default)]
struct CountingAcknowledger(Arc<AtomicUsize>);

#[async_trait]
impl Acknowledger for CountingAcknowledger {
    async fn acknowledge(&self, _prompt: &str) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct RecordingAllocator(Arc<Mutex<Vec<ConsoleSurface>>>);

impl SurfaceAllocator for RecordingAllocator {
    fn allocate(&self, surface: &ConsoleSurface) -> tickjob_runner::Result<()> {
        self.0.lock().unwrap().push(surface.clone());
        Ok(())
    }
}

fn pipeline(mode: ExecutionMode) -> Pipeline {
    Pipeline {
        name: "daily".to_string(),
        mode,
        steps: vec![
            PipelineStep::new("A", "tracker", "output/marketcap_universe.xlsx"),
            PipelineStep::new("B", "signals", "output/trading_signals_s1.xlsx"),
        ],
    }
}

fn attended() -> ExecutionMode {
    ExecutionMode::Attended {
        surface: ConsoleSurface::default(),
    }
}

struct Harness {
    launcher: RecordingLauncher,
    acks: CountingAcknowledger,
    allocator: RecordingAllocator,
}

impl Harness {
    fn new(launcher: RecordingLauncher) -> Self {
        Self {
            launcher,
            acks: CountingAcknowledger::default(),
            allocator: RecordingAllocator::default(),
        }
    }

    fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(self.launcher.clone())
            .with_acknowledger(self.acks.clone())
            .with_allocator(self.allocator.clone())
    }

    fn acknowledgments(&self) -> usize {
        self.acks.0.load(Ordering::SeqCst)
    }

    fn allocations(&self) -> usize {
        self.allocator.0.lock().unwrap().len()
    }
}

#[tokio::test]
async fn first_failure_stops_the_pipeline() {
    let h = Harness::new(RecordingLauncher::default().exiting("A", 1));
    let result = h.runner().run(&pipeline(ExecutionMode::Unattended)).await;

    assert!(!result.succeeded);
    assert_eq!(result.failed_step_index, Some(0));
    assert_eq!(result.exit_code, Some(1));
    assert!(result.artifacts.is_empty());
    assert_eq!(h.launcher.launched(), ["A"]);
    assert_eq!(result.process_exit_code(), 1);
}

#[tokio::test]
async fn second_step_failure_reports_index_one() {
    let h = Harness::new(RecordingLauncher::default().exiting("B", 7));
    let result = h.runner().run(&pipeline(ExecutionMode::Unattended)).await;

    assert_eq!(result.failed_step_index, Some(1));
    assert_eq!(result.exit_code, Some(7));
    assert_eq!(h.launcher.launched(), ["A", "B"]);
}

#[tokio::test]
async fn success_lists_every_artifact_in_order() {
    let h = Harness::new(RecordingLauncher::default());
    let result = h.runner().run(&pipeline(ExecutionMode::Unattended)).await;

    assert!(result.succeeded);
    assert_eq!(result.failed_step_index, None);
    assert_eq!(
        result.artifacts,
        [
            "output/marketcap_universe.xlsx",
            "output/trading_signals_s1.xlsx"
        ]
    );
    assert_eq!(result.process_exit_code(), 0);
}

#[tokio::test]
async fn unattended_failure_never_waits_or_allocates() {
    let h = Harness::new(RecordingLauncher::default().exiting("A", 1));
    h.runner().run(&pipeline(ExecutionMode::Unattended)).await;

    assert_eq!(h.acknowledgments(), 0);
    assert_eq!(h.allocations(), 0);
}

#[tokio::test]
async fn attended_failure_waits_for_acknowledgment() {
    let h = Harness::new(RecordingLauncher::default().exiting("B", 1));
    let result = h.runner().run(&pipeline(attended())).await;

    assert!(!result.succeeded);
    assert_eq!(h.acknowledgments(), 1);
}

#[tokio::test]
async fn attended_run_always_allocates_its_surface() {
    let h = Harness::new(RecordingLauncher::default());
    let result = h.runner().run(&pipeline(attended())).await;

    assert!(result.succeeded);
    assert_eq!(h.allocations(), 1);
    assert_eq!(h.acknowledgments(), 0);
    assert_eq!(h.allocator.0.lock().unwrap()[0], ConsoleSurface::default());
}

#[tokio::test]
async fn launch_error_is_a_step_failure() {
    let launcher = RecordingLauncher {
        unlaunchable: Some("A".to_string()),
        ..RecordingLauncher::default()
    };
    let h = Harness::new(launcher);
    let result = h.runner().run(&pipeline(ExecutionMode::Unattended)).await;

    assert_eq!(result.failed_step_index, Some(0));
    assert_eq!(result.exit_code, None);
    assert_eq!(h.launcher.launched(), ["A"]);
}

#[tokio::test]
async fn interrupt_ends_the_run_without_acknowledgment() {
    let launcher = RecordingLauncher {
        interrupt: Some("A".to_string()),
        ..RecordingLauncher::default()
    };
    let h = Harness::new(launcher);
    let result = h.runner().run(&pipeline(attended())).await;

    assert!(result.interrupted);
    assert_eq!(result.failed_step_index, Some(0));
    assert_eq!(result.process_exit_code(), 130);
    assert_eq!(h.acknowledgments(), 0);
    assert_eq!(h.launcher.launched(), ["A"]);
}

#[cfg(unix)]
mod process {
    use super::*;
    use tickjob_runner::launcher::ProcessLauncher;

    fn sh(name: &str, script: &str) -> PipelineStep {
        PipelineStep::new(name, "sh", format!("{name}.out"))
            .arg("-c")
            .arg(script)
    }

    #[tokio::test]
    async fn real_processes_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("b-ran");
        let pipeline = Pipeline {
            name: "daily".to_string(),
            mode: ExecutionMode::Unattended,
            steps: vec![
                sh("A", "echo starting; echo 'no data' >&2; exit 3"),
                sh("B", &format!("touch {}", marker.display())),
            ],
        };

        let result = PipelineRunner::new(ProcessLauncher::new())
            .with_acknowledger(CountingAcknowledger::default())
            .run(&pipeline)
            .await;

        assert_eq!(result.failed_step_index, Some(0));
        assert_eq!(result.exit_code, Some(3));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn stderr_tail_is_captured_when_unattended() {
        let step = sh("A", "echo first >&2; echo last >&2; exit 1");
        let exit = ProcessLauncher::new()
            .launch(&step, &ExecutionMode::Unattended)
            .await
            .unwrap();

        assert_eq!(exit.code, Some(1));
        assert_eq!(exit.stderr_tail.as_deref(), Some("first\nlast"));
    }

    #[tokio::test]
    async fn non_utf8_output_does_not_break_the_pipe() {
        // A closed pipe would make `echo` fail and the script exit 9.
        let step = sh(
            "A",
            r"printf '\275\303\300\333\n'; printf '\377 warn\n' >&2
            i=0
            while [ $i -lt 20000 ]; do echo line $i || exit 9; i=$((i + 1)); done
            exit 0",
        );
        let exit = ProcessLauncher::new()
            .launch(&step, &ExecutionMode::Unattended)
            .await
            .unwrap();

        assert_eq!(exit.code, Some(0));
        assert!(exit.success());
        assert_eq!(exit.stderr_tail.as_deref(), Some("\u{fffd} warn"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let step = PipelineStep::new("A", "/nonexistent/tickjob-step", "x");
        let err = ProcessLauncher::new()
            .launch(&step, &ExecutionMode::Unattended)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
