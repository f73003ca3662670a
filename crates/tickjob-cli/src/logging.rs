//! Subscriber setup: console and/or a daily-rolling log file.

use anyhow::Context;
use tickjob_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Registration and attended runs: someone is watching the console.
    ConsoleAndFile,
    /// Unattended runs: there is no console to write to.
    FileOnly,
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// The returned guard flushes the file writer on drop; keep it alive until
/// the process exits.
pub fn init(config: &LoggingConfig, file_prefix: &str, target: LogTarget) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("creating log directory {}", config.dir.display()))?;

    let appender = tracing_appender::rolling::daily(&config.dir, format!("{file_prefix}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let console_layer =
        (target == LogTarget::ConsoleAndFile).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
