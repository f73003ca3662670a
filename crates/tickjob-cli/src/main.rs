//! `tickjob`: registers the scheduled jobs and runs the pipelines they fire.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tickjob_core::config::LoggingConfig;
use tickjob_core::TickjobConfig;
use tickjob_runner::PipelineRunner;
use tickjob_scheduler::memory::InMemoryGateway;
use tickjob_scheduler::registrar::{RegistrationReport, TaskRegistrar};
use tickjob_scheduler::schtasks::SchtasksGateway;
use tickjob_scheduler::SchedulerGateway;
use tracing::{error, info};

mod elevation;
mod jobs;
mod logging;
mod pipelines;
mod report;

use logging::LogTarget;

/// Recurring-job orchestrator for the daily signal pipeline and the
/// realtime monitor.
#[derive(Parser)]
#[command(name = "tickjob", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Defaults to `register`.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Register (or re-register) both jobs with the host scheduler.
    Register {
        /// Register against an in-memory scheduler and print the definitions.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a pipeline now. This is what the scheduled jobs invoke.
    Run {
        #[command(subcommand)]
        pipeline: PipelineKind,
    },

    /// Print both job definitions and their next fire times.
    Show,
}

#[derive(Subcommand, Clone, Copy)]
enum PipelineKind {
    /// Unattended: market-cap universe, then trading signals.
    Daily,
    /// Attended: the realtime monitor in a foreground console.
    Realtime,
}

impl PipelineKind {
    fn log_target(self) -> (&'static str, LogTarget) {
        match self {
            PipelineKind::Daily => ("daily_pipeline", LogTarget::FileOnly),
            PipelineKind::Realtime => ("realtime_monitor", LogTarget::ConsoleAndFile),
        }
    }
}

impl Command {
    /// Log file prefix and target, for commands that write a log.
    fn log_target(self) -> Option<(&'static str, LogTarget)> {
        match self {
            Command::Register { .. } => Some(("register", LogTarget::ConsoleAndFile)),
            Command::Run { pipeline } => Some(pipeline.log_target()),
            Command::Show => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = cli.command.unwrap_or(Command::Register { dry_run: false });
    let config = match TickjobConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // An unattended run has no console: the log file is the only record.
            let Some((file_prefix, target)) = command.log_target() else {
                return Err(e).context("loading configuration");
            };
            let _guard = logging::init(&LoggingConfig::default(), file_prefix, target)?;
            error!(code = e.code(), "cannot load configuration: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let config_path = cli
        .config
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("resolving the configuration path")?;

    match command {
        Command::Register { dry_run } => register(&config, config_path.as_deref(), dry_run),
        Command::Run { pipeline } => run_pipeline(&config, pipeline).await,
        Command::Show => show(&config, config_path.as_deref()),
    }
}

fn register(config: &TickjobConfig, config_path: Option<&Path>, dry_run: bool) -> anyhow::Result<ExitCode> {
    let _guard = logging::init(&config.logging, "register", LogTarget::ConsoleAndFile)?;
    if !dry_run {
        elevation::warn_if_unelevated();
    }

    let executable = jobs::executable(config)?;
    let definitions = jobs::job_definitions(config, &executable, config_path)?;
    let folder = config.orchestrator.folder.as_str();

    let report = if dry_run {
        let gateway = InMemoryGateway::new();
        let report = register_with(&gateway, folder, &definitions);
        if report.is_some() {
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        report
    } else {
        register_with(&SchtasksGateway::default(), folder, &definitions)
    };
    let Some(report) = report else {
        return Ok(ExitCode::FAILURE);
    };

    report::print_registration(&report);
    match report.into_result() {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// `None` when the scheduler could not be reached; nothing was registered.
fn register_with<G: SchedulerGateway>(
    gateway: &G,
    folder: &str,
    definitions: &[tickjob_scheduler::types::ScheduledJobDefinition],
) -> Option<RegistrationReport> {
    match TaskRegistrar::new(gateway, folder).register(definitions) {
        Ok(report) => Some(report),
        Err(e) => {
            error!("registration aborted: {e}");
            None
        }
    }
}

async fn run_pipeline(config: &TickjobConfig, kind: PipelineKind) -> anyhow::Result<ExitCode> {
    let (file_prefix, target) = kind.log_target();
    let _guard = logging::init(&config.logging, file_prefix, target)?;

    let pipeline = match kind {
        PipelineKind::Daily => pipelines::daily(config),
        PipelineKind::Realtime => pipelines::realtime(config),
    };
    let pipeline = match pipeline {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(code = e.code(), "cannot build pipeline: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let result = PipelineRunner::default().run(&pipeline).await;
    info!(
        pipeline = %result.pipeline,
        succeeded = result.succeeded,
        failed_step = ?result.failed_step_index,
        "pipeline finished"
    );
    Ok(ExitCode::from(
        u8::try_from(result.process_exit_code()).unwrap_or(1),
    ))
}

fn show(config: &TickjobConfig, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let executable = jobs::executable(config)?;
    let definitions = jobs::job_definitions(config, &executable, config_path)?;
    let now = Local::now();
    for definition in &definitions {
        println!("{}", report::describe(definition, &now, 3));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_logging_command_has_a_target() {
        let daily = Command::Run {
            pipeline: PipelineKind::Daily,
        };
        let realtime = Command::Run {
            pipeline: PipelineKind::Realtime,
        };
        assert_eq!(
            daily.log_target(),
            Some(("daily_pipeline", LogTarget::FileOnly))
        );
        assert_eq!(
            realtime.log_target(),
            Some(("realtime_monitor", LogTarget::ConsoleAndFile))
        );
        assert_eq!(
            Command::Register { dry_run: true }.log_target(),
            Some(("register", LogTarget::ConsoleAndFile))
        );
        assert_eq!(Command::Show.log_target(), None);
    }

    #[test]
    fn bare_invocation_registers() {
        let cli = Cli::try_parse_from(["tickjob"]).unwrap();
        assert!(cli.command.is_none());
        let cli = Cli::try_parse_from(["tickjob", "run", "daily"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Run {
                pipeline: PipelineKind::Daily
            })
        ));
    }
}
