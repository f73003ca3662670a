//! The two concrete pipelines, built from configuration.

use tickjob_core::{Result, TickjobConfig};
use tickjob_runner::surface::ConsoleSurface;
use tickjob_runner::{ExecutionMode, Pipeline, PipelineStep};

pub const UNIVERSE_ARTIFACT: &str = "output/marketcap_universe.xlsx";
pub const SIGNALS_ARTIFACT: &str = "output/trading_signals_s1.xlsx";
pub const ALERTS_ARTIFACT: &str = "alert_history.json";

/// Market-cap universe, then signals derived from it. Unattended.
pub fn daily(config: &TickjobConfig) -> Result<Pipeline> {
    let (appkey, secret) = config.credentials.require()?;
    let programs = &config.programs;

    let tracker = script_step(config, "marketcap-tracker", &programs.market_cap_tracker, UNIVERSE_ARTIFACT)
        .args(["--appkey", appkey, "--secret", secret]);
    let signals = script_step(config, "signal-system", &programs.signal_system, SIGNALS_ARTIFACT)
        .args(["--appkey", appkey, "--secret", secret])
        .arg("--alert-threshold")
        .arg(programs.alert_threshold.to_string());

    Ok(Pipeline {
        name: config.orchestrator.daily_pipeline_name.clone(),
        mode: ExecutionMode::Unattended,
        steps: vec![with_force(config, tracker), with_force(config, signals)],
    })
}

/// One long-running polling monitor in a foreground console. It does not
/// exit on its own; the operator stops it with Ctrl+C.
pub fn realtime(config: &TickjobConfig) -> Result<Pipeline> {
    let (appkey, secret) = config.credentials.require()?;
    let programs = &config.programs;

    let monitor = script_step(config, "realtime-monitor", &programs.realtime_monitor, ALERTS_ARTIFACT)
        .args(["--appkey", appkey, "--secret", secret])
        .arg("--interval")
        .arg(programs.poll_interval_secs.to_string());

    let console = &config.console;
    Ok(Pipeline {
        name: config.orchestrator.realtime_monitor_name.clone(),
        mode: ExecutionMode::Attended {
            surface: ConsoleSurface {
                title: console.title.clone(),
                columns: console.columns,
                lines: console.lines,
            },
        },
        steps: vec![with_force(config, monitor)],
    })
}

fn script_step(config: &TickjobConfig, name: &str, script: &str, artifact: &str) -> PipelineStep {
    PipelineStep::new(name, &config.programs.interpreter, artifact)
        .arg(script)
        .working_dir(&config.programs.working_dir)
}

fn with_force(config: &TickjobConfig, step: PipelineStep) -> PipelineStep {
    if config.programs.force {
        step.arg("--force")
    } else {
        step
    }
}
