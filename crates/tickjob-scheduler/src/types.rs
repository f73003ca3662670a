use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

// ---------------------------------------------------------------------------
// JobName
// ---------------------------------------------------------------------------

/// Name of a job, unique within the host scheduler folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobName(String);

impl JobName {
    /// Validate and wrap `name`. Path separators are rejected because the host
    /// treats them as folder boundaries.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchedulerError::InvalidDefinition(
                "job name must not be empty".to_string(),
            ));
        }
        if name.contains(['\\', '/', '"']) {
            return Err(SchedulerError::InvalidDefinition(format!(
                "job name {name:?} contains a reserved character"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WeekdaySet
// ---------------------------------------------------------------------------

/// A set of weekdays stored as a bitmask (bit 0 = Monday … bit 6 = Sunday).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Weekday>", from = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    /// Monday through Friday.
    pub fn weekdays() -> Self {
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .collect()
    }

    pub fn all() -> Self {
        WeekdaySet(0b111_1111)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        let mut day = Weekday::Mon;
        (0..7).filter_map(move |_| {
            let current = day;
            day = day.succ();
            self.contains(current).then_some(current)
        })
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Declarative time-based firing rule. `at` is local wall-clock time; no
/// timezone conversion is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once every calendar day at `at`.
    Daily { at: NaiveTime },

    /// Fire on every date whose weekday is in `days`, at `at`.
    Weekly { days: WeekdaySet, at: NaiveTime },
}

impl Trigger {
    pub fn at(&self) -> NaiveTime {
        match self {
            Trigger::Daily { at } | Trigger::Weekly { at, .. } => *at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Trigger::Weekly { days, .. } if days.is_empty() => Err(
                SchedulerError::InvalidDefinition("weekly trigger has no weekdays".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Daily { at } => write!(f, "daily at {}", at.format("%H:%M")),
            Trigger::Weekly { days, at } => {
                write!(f, "weekly on {days} at {}", at.format("%H:%M"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RetrySettings
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_RESTARTS: u32 = 3;
pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(60);

/// Power/availability overrides and the bounded auto-restart policy the host
/// applies to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// The job may start while the host runs on battery.
    pub allow_start_on_battery: bool,
    /// A running job is not stopped when the host enters battery saver.
    pub continue_on_battery_saver: bool,
    /// A trigger missed while the host was unavailable fires once it is back.
    pub start_when_available: bool,
    /// Relaunches allowed after a failed run, before the next trigger.
    pub max_restarts: u32,
    /// Wait between relaunches.
    pub restart_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            allow_start_on_battery: true,
            continue_on_battery_saver: true,
            start_when_available: true,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_interval: DEFAULT_RESTART_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility / JobAction / ScheduledJobDefinition
// ---------------------------------------------------------------------------

/// Whether the job runs with an operator-visible console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// No interactive surface; runs whether or not a user is logged on.
    Hidden,
    /// Foreground console in the logged-on user's session.
    Attended,
}

impl Visibility {
    pub fn is_hidden(self) -> bool {
        matches!(self, Visibility::Hidden)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Hidden => write!(f, "hidden"),
            Visibility::Attended => write!(f, "attended"),
        }
    }
}

/// The process the host launches when the job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAction {
    pub program: PathBuf,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl JobAction {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments joined into a single command-line string, quoting any
    /// argument that contains whitespace.
    pub fn command_line(&self) -> String {
        self.arguments
            .iter()
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("\"{a}\"")
                } else {
                    a.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything the host needs to register one job. Replaced wholesale by the
/// next orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJobDefinition {
    pub name: JobName,
    pub action: JobAction,
    pub trigger: Trigger,
    pub retry: RetrySettings,
    pub visibility: Visibility,
    pub description: String,
    /// Label shown by the host's UI, if different from `name`.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ScheduledJobDefinition {
    pub fn validate(&self) -> Result<()> {
        self.trigger.validate()?;
        if self.action.program.as_os_str().is_empty() {
            return Err(SchedulerError::InvalidDefinition(format!(
                "job {} has no executable",
                self.name
            )));
        }
        Ok(())
    }

    /// True when the definition carries visibility attributes beyond the host
    /// defaults (a display label or the hidden flag).
    pub fn has_visibility_attributes(&self) -> bool {
        self.display_name.is_some() || self.visibility.is_hidden()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_name_rejects_separators() {
        assert!(JobName::new("S1_Daily_SignalPipeline").is_ok());
        assert!(JobName::new("a\\b").is_err());
        assert!(JobName::new("a/b").is_err());
        assert!(JobName::new("   ").is_err());
    }

    #[test]
    fn weekday_set_membership() {
        let set = WeekdaySet::weekdays();
        assert_eq!(set.len(), 5);
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Fri));
        assert!(!set.contains(Weekday::Sat));
        assert!(!set.contains(Weekday::Sun));
    }

    #[test]
    fn weekday_set_iterates_monday_first() {
        let set: WeekdaySet = [Weekday::Sun, Weekday::Wed, Weekday::Mon].into_iter().collect();
        let days: Vec<Weekday> = set.iter().collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
        assert_eq!(set.to_string(), "Mon,Wed,Sun");
    }

    #[test]
    fn weekly_trigger_without_days_is_invalid() {
        let trigger = Trigger::Weekly {
            days: WeekdaySet::EMPTY,
            at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        assert!(trigger.validate().is_err());
    }

    #[test]
    fn trigger_serializes_with_kind_tag() {
        let trigger = Trigger::Weekly {
            days: WeekdaySet::weekdays(),
            at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains(r#""kind":"weekly""#));
        let back: Trigger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trigger);
    }

    #[test]
    fn command_line_quotes_whitespace() {
        let action = JobAction::new("tickjob.exe")
            .arg("run")
            .arg("daily")
            .arg("--config")
            .arg("C:\\Program Files\\tickjob.toml");
        assert_eq!(
            action.command_line(),
            "run daily --config \"C:\\Program Files\\tickjob.toml\""
        );
    }

    #[test]
    fn retry_defaults() {
        let retry = RetrySettings::default();
        assert_eq!(retry.max_restarts, 3);
        assert_eq!(retry.restart_interval, Duration::from_secs(60));
        assert!(retry.start_when_available);
    }
}
