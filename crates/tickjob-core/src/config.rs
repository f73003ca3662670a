use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Weekday};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "tickjob.toml";
pub const CONFIG_ENV_VAR: &str = "TICKJOB_CONFIG";
pub const ENV_PREFIX: &str = "TICKJOB_";

pub const DEFAULT_JOB_PREFIX: &str = "S1";
pub const DEFAULT_DAILY_AT: &str = "20:15";
pub const DEFAULT_REALTIME_AT: &str = "08:00";
pub const DEFAULT_MAX_RESTARTS: u32 = 3;
pub const DEFAULT_RESTART_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_ALERT_THRESHOLD: f64 = 10.0;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

/// Top-level config (tickjob.toml + TICKJOB_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickjobConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub programs: ProgramsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Naming and placement of the registered jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Leading segment of every job name, e.g. `S1` → `S1_Daily_SignalPipeline`.
    pub job_prefix: String,
    /// Scheduler folder the jobs live in.
    pub folder: String,
    pub daily_pipeline_name: String,
    pub realtime_monitor_name: String,
    /// Binary the host scheduler launches. Defaults to the running executable.
    pub executable: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            folder: "\\".to_string(),
            daily_pipeline_name: "SignalPipeline".to_string(),
            realtime_monitor_name: "Monitor".to_string(),
            executable: None,
        }
    }
}

/// Trigger times. All values are local wall-clock, `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub daily_at: String,
    pub realtime_at: String,
    pub realtime_days: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: DEFAULT_DAILY_AT.to_string(),
            realtime_at: DEFAULT_REALTIME_AT.to_string(),
            realtime_days: ["mon", "tue", "wed", "thu", "fri"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        parse_clock("schedule.daily_at", &self.daily_at)
    }

    pub fn realtime_time(&self) -> Result<NaiveTime> {
        parse_clock("schedule.realtime_at", &self.realtime_at)
    }

    /// Parse `realtime_days`. Accepts `mon`, `Monday`, `MON`, …
    pub fn realtime_weekdays(&self) -> Result<Vec<Weekday>> {
        if self.realtime_days.is_empty() {
            return Err(CoreError::Config(
                "schedule.realtime_days must name at least one weekday".to_string(),
            ));
        }
        self.realtime_days
            .iter()
            .map(|d| {
                d.trim().parse::<Weekday>().map_err(|_| {
                    CoreError::Config(format!("schedule.realtime_days: unknown weekday {d:?}"))
                })
            })
            .collect()
    }
}

fn parse_clock(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| CoreError::Config(format!("{key}: expected HH:MM, got {value:?} ({e})")))
}

/// Host-side power and restart policy applied to every registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub allow_start_on_battery: bool,
    pub continue_on_battery_saver: bool,
    pub start_when_available: bool,
    pub max_restarts: u32,
    pub restart_interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            allow_start_on_battery: true,
            continue_on_battery_saver: true,
            start_when_available: true,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_interval_secs: DEFAULT_RESTART_INTERVAL_SECS,
        }
    }
}

/// Locations and arguments of the external programs the pipelines launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramsConfig {
    pub interpreter: String,
    pub working_dir: PathBuf,
    pub market_cap_tracker: String,
    pub signal_system: String,
    pub realtime_monitor: String,
    /// Alert threshold in percent, forwarded as `--alert-threshold`.
    pub alert_threshold: f64,
    /// Polling tick of the realtime monitor, forwarded as `--interval`.
    pub poll_interval_secs: u64,
    /// Pass `--force` so the programs skip their own trading-day checks.
    pub force: bool,
}

impl Default for ProgramsConfig {
    fn default() -> Self {
        Self {
            interpreter: "python".to_string(),
            working_dir: PathBuf::from("."),
            market_cap_tracker: "Daily_MarketCap_Tracker.py".to_string(),
            signal_system: "Trading_Signal_System_S1.py".to_string(),
            realtime_monitor: "Real_Time_Monitor_S1.py".to_string(),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            force: false,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub appkey: Option<String>,
    pub secret: Option<String>,
}

impl CredentialsConfig {
    /// Both values, or a config error naming the first missing one.
    pub fn require(&self) -> Result<(&str, &str)> {
        let appkey = self
            .appkey
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CoreError::Config("credentials.appkey is not set".to_string()))?;
        let secret = self
            .secret
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CoreError::Config("credentials.secret is not set".to_string()))?;
        Ok((appkey, secret))
    }
}

// Never print the secrets, even at debug level.
impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_struct("CredentialsConfig")
            .field("appkey", &mask(&self.appkey))
            .field("secret", &mask(&self.secret))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "info".to_string(),
        }
    }
}

/// Size and title of the foreground console used by attended runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub columns: u16,
    pub lines: u16,
    pub title: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            columns: 120,
            lines: 40,
            title: "Realtime Monitor".to_string(),
        }
    }
}

impl TickjobConfig {
    /// Load config from defaults, a TOML file and TICKJOB_* env overrides.
    ///
    /// File lookup order:
    ///   1. Explicit path argument
    ///   2. `TICKJOB_CONFIG`
    ///   3. `./tickjob.toml`
    ///
    /// A missing file is fine; the defaults and environment still apply.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        tracing::debug!(path = %path.display(), "loading configuration");

        let config: TickjobConfig = Figment::from(Serialized::defaults(TickjobConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce an unusable job definition.
    pub fn validate(&self) -> Result<()> {
        self.schedule.daily_time()?;
        self.schedule.realtime_time()?;
        self.schedule.realtime_weekdays()?;

        if self.orchestrator.job_prefix.trim().is_empty() {
            return Err(CoreError::Config(
                "orchestrator.job_prefix must not be empty".to_string(),
            ));
        }
        if self.programs.poll_interval_secs == 0 {
            return Err(CoreError::Config(
                "programs.poll_interval_secs must be positive".to_string(),
            ));
        }
        if !self.programs.alert_threshold.is_finite() || self.programs.alert_threshold < 0.0 {
            return Err(CoreError::Config(format!(
                "programs.alert_threshold must be a non-negative number, got {}",
                self.programs.alert_threshold
            )));
        }
        Ok(())
    }
}
