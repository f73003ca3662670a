//! Launching a step as a child process.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::truncate::{excerpt, DEFAULT_MAX_CHARS};
use crate::types::{ExecutionMode, PipelineStep, StepExit};

/// Lines of stderr kept for the failure diagnostic.
const STDERR_TAIL_LINES: usize = 40;

/// Runs one step to completion.
#[async_trait]
pub trait StepLauncher: Send + Sync {
    /// Launch `step` and wait for it to exit. There is no timeout: a step
    /// that never exits blocks until the operator or the host stops it.
    ///
    /// Returns `Err(RunnerError::Interrupted)` when the operator pressed
    /// Ctrl+C while the step was running.
    async fn launch(&self, step: &PipelineStep, mode: &ExecutionMode) -> Result<StepExit>;
}

/// Launches steps as real processes.
///
/// Unattended steps get their stdout/stderr piped into the log line by line.
/// Attended steps inherit the console so the operator sees their output.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    max_tail_chars: usize,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            max_tail_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tail_chars(mut self, max_tail_chars: usize) -> Self {
        self.max_tail_chars = max_tail_chars;
        self
    }

    fn command(step: &PipelineStep) -> Command {
        let mut command = Command::new(&step.program);
        command.args(&step.arguments).kill_on_drop(true);
        if let Some(dir) = &step.working_dir {
            command.current_dir(dir);
        }
        command
    }

    fn spawn(step: &PipelineStep, mut command: Command) -> Result<Child> {
        command.spawn().map_err(|e| RunnerError::Spawn {
            step: step.name.clone(),
            reason: format!("{}: {e}", step.program.display()),
        })
    }
}

#[async_trait]
impl StepLauncher for ProcessLauncher {
    async fn launch(&self, step: &PipelineStep, mode: &ExecutionMode) -> Result<StepExit> {
        let mut command = Self::command(step);

        if mode.is_attended() {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            let mut child = Self::spawn(step, command)?;
            let status =
                wait_or_interrupt(&mut child, &step.name, tokio::signal::ctrl_c()).await?;
            return Ok(StepExit {
                code: status.code(),
                stderr_tail: None,
            });
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = Self::spawn(step, command)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, (), tail) = tokio::join!(
            wait_or_interrupt(&mut child, &step.name, tokio::signal::ctrl_c()),
            forward_stdout(stdout, &step.name),
            collect_stderr(stderr, &step.name),
        );
        let status = status?;

        let tail = tail.trim_end();
        Ok(StepExit {
            code: status.code(),
            stderr_tail: (!tail.is_empty()).then(|| excerpt(tail, self.max_tail_chars)),
        })
    }
}

/// Wait for the child, killing it if `interrupt` fires first.
///
/// When no interrupt listener can be installed the step keeps running to
/// completion.
async fn wait_or_interrupt<F>(child: &mut Child, step: &str, interrupt: F) -> Result<ExitStatus>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        status = child.wait() => Ok(status?),
        signal = interrupt => match signal {
            Ok(()) => {
                warn!(step, "interrupt received, stopping step");
                child.kill().await?;
                Err(RunnerError::Interrupted)
            }
            Err(e) => {
                warn!(step, "cannot listen for Ctrl+C: {e}");
                Ok(child.wait().await?)
            }
        },
    }
}

/// Read `stream` to EOF, one line at a time. Bytes that are not UTF-8 are
/// replaced rather than ending the read, so the child never sees a closed pipe.
async fn drain_lines<R, F>(stream: R, step: &str, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\r', '\n']).to_owned());
            }
            Err(e) => {
                debug!(step, "output stream closed: {e}");
                break;
            }
        }
    }
}

async fn forward_stdout<R: AsyncRead + Unpin>(stream: Option<R>, step: &str) {
    let Some(stream) = stream else { return };
    drain_lines(stream, step, |line| info!(step, "{line}")).await;
}

async fn collect_stderr<R: AsyncRead + Unpin>(stream: Option<R>, step: &str) -> String {
    let Some(stream) = stream else {
        return String::new();
    };
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    drain_lines(stream, step, |line| {
        warn!(step, "{line}");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    })
    .await;
    Vec::from(tail).join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn step_runs_on_when_interrupt_listener_fails() {
        let mut child = sh("exit 0");
        let listener = async { Err(io::Error::other("no signal handler")) };
        let status = wait_or_interrupt(&mut child, "A", listener).await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn interrupt_kills_the_step() {
        let mut child = sh("sleep 5");
        let result = wait_or_interrupt(&mut child, "A", async { Ok(()) }).await;
        assert!(matches!(result, Err(RunnerError::Interrupted)));
    }

    #[tokio::test]
    async fn invalid_utf8_lines_are_kept() {
        let input: &[u8] = b"ok\n\xbd\xc3 bad\r\nlast";
        let mut lines = Vec::new();
        drain_lines(input, "A", |line| lines.push(line)).await;
        assert_eq!(lines, ["ok", "\u{fffd}\u{fffd} bad", "last"]);
    }
}
