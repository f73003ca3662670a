//! The two scheduled job definitions this orchestrator maintains.
//!
//! Each job's action re-invokes this binary (`tickjob run daily` /
//! `tickjob run realtime`), so the pipelines are always built from the
//! configuration current at fire time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tickjob_core::TickjobConfig;
use tickjob_scheduler::types::{
    JobAction, JobName, RetrySettings, ScheduledJobDefinition, Trigger, Visibility,
};

/// `<prefix>_Daily_<pipeline>`
pub fn daily_job_name(config: &TickjobConfig) -> String {
    let o = &config.orchestrator;
    format!("{}_Daily_{}", o.job_prefix, o.daily_pipeline_name)
}

/// `<prefix>_Realtime_<monitor>`
pub fn realtime_job_name(config: &TickjobConfig) -> String {
    let o = &config.orchestrator;
    format!("{}_Realtime_{}", o.job_prefix, o.realtime_monitor_name)
}

/// The binary the jobs should launch: the configured override, else the
/// running executable.
pub fn executable(config: &TickjobConfig) -> anyhow::Result<PathBuf> {
    match &config.orchestrator.executable {
        Some(path) => Ok(path.clone()),
        None => std::env::current_exe().context("locating the tickjob executable"),
    }
}

/// Build both definitions. `config_path`, when given, is forwarded to the
/// jobs so they load the same file.
pub fn job_definitions(
    config: &TickjobConfig,
    executable: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<Vec<ScheduledJobDefinition>> {
    let schedule = &config.schedule;
    let working_dir = std::env::current_dir()
        .context("resolving the working directory")?
        .join(&config.programs.working_dir);
    let retry = retry_settings(config);

    let action = |pipeline: &str| {
        let mut action = JobAction::new(executable).working_dir(&working_dir);
        if let Some(path) = config_path {
            action = action.arg("--config").arg(path.to_string_lossy());
        }
        action.arg("run").arg(pipeline)
    };

    let daily = ScheduledJobDefinition {
        name: JobName::new(daily_job_name(config))?,
        action: action("daily"),
        trigger: Trigger::Daily {
            at: schedule.daily_time()?,
        },
        retry: retry.clone(),
        visibility: Visibility::Hidden,
        description: format!(
            "{}: market-cap universe, then trading signals (unattended)",
            config.orchestrator.daily_pipeline_name
        ),
        display_name: None,
    };

    let realtime = ScheduledJobDefinition {
        name: JobName::new(realtime_job_name(config))?,
        action: action("realtime"),
        trigger: Trigger::Weekly {
            days: schedule.realtime_weekdays()?.into_iter().collect(),
            at: schedule.realtime_time()?,
        },
        retry,
        visibility: Visibility::Attended,
        description: format!(
            "{}: realtime price monitor, polling every {}s (stop with Ctrl+C)",
            config.orchestrator.realtime_monitor_name, config.programs.poll_interval_secs
        ),
        display_name: None,
    };

    Ok(vec![daily, realtime])
}

fn retry_settings(config: &TickjobConfig) -> RetrySettings {
    let r = &config.retry;
    RetrySettings {
        allow_start_on_battery: r.allow_start_on_battery,
        continue_on_battery_saver: r.continue_on_battery_saver,
        start_when_available: r.start_when_available,
        max_restarts: r.max_restarts,
        restart_interval: Duration::from_secs(r.restart_interval_secs),
    }
}
