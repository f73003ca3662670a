//! Human-readable status lines.

use chrono::{DateTime, TimeZone};
use tickjob_scheduler::registrar::{DeletionStatus, JobOutcome, PhaseStatus, RegistrationReport};
use tickjob_scheduler::schedule::upcoming_fires;
use tickjob_scheduler::types::ScheduledJobDefinition;

/// One line per action taken on a job: deleted / not found / created /
/// mutated / failed.
pub fn status_lines(outcome: &JobOutcome) -> Vec<String> {
    let name = &outcome.name;
    let mut lines = Vec::new();

    match &outcome.deletion {
        DeletionStatus::Deleted => lines.push(format!("[{name}] deleted")),
        DeletionStatus::NotFound => lines.push(format!("[{name}] not found")),
        DeletionStatus::Failed(reason) => lines.push(format!("[{name}] delete failed: {reason}")),
        DeletionStatus::Skipped => {}
    }
    match &outcome.creation {
        PhaseStatus::Done => lines.push(format!("[{name}] created")),
        PhaseStatus::Failed(reason) => lines.push(format!("[{name}] failed: {reason}")),
        PhaseStatus::Skipped => {}
    }
    match &outcome.mutation {
        PhaseStatus::Done => lines.push(format!("[{name}] mutated")),
        PhaseStatus::Failed(reason) => lines.push(format!("[{name}] failed: {reason}")),
        PhaseStatus::Skipped => {}
    }
    lines
}

pub fn print_registration(report: &RegistrationReport) {
    for outcome in &report.outcomes {
        for line in status_lines(outcome) {
            println!("{line}");
        }
    }
    println!("{report}");
}

/// Summary of a definition with its next fire times after `now`.
pub fn describe<Tz>(definition: &ScheduledJobDefinition, now: &DateTime<Tz>, count: usize) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = format!(
        "{}\n  {}\n  trigger:  {}\n  mode:     {}\n  restarts: {} every {}s\n  command:  {} {}\n",
        definition.name,
        definition.description,
        definition.trigger,
        definition.visibility,
        definition.retry.max_restarts,
        definition.retry.restart_interval.as_secs(),
        definition.action.program.display(),
        definition.action.command_line(),
    );
    for fire in upcoming_fires(&definition.trigger, now, count) {
        out.push_str(&format!("  next:     {}\n", fire.format("%a %Y-%m-%d %H:%M")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveTime};
    use tickjob_scheduler::types::{JobAction, JobName, RetrySettings, Trigger, Visibility, WeekdaySet};

    fn outcome(deletion: DeletionStatus, creation: PhaseStatus, mutation: PhaseStatus) -> JobOutcome {
        JobOutcome {
            name: JobName::new("S1_Daily_SignalPipeline").unwrap(),
            deletion,
            creation,
            mutation,
        }
    }

    #[test]
    fn fresh_job_lines() {
        let lines = status_lines(&outcome(
            DeletionStatus::NotFound,
            PhaseStatus::Done,
            PhaseStatus::Skipped,
        ));
        assert_eq!(
            lines,
            [
                "[S1_Daily_SignalPipeline] not found",
                "[S1_Daily_SignalPipeline] created"
            ]
        );
    }

    #[test]
    fn replaced_and_mutated_lines() {
        let lines = status_lines(&outcome(
            DeletionStatus::Deleted,
            PhaseStatus::Done,
            PhaseStatus::Done,
        ));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "[S1_Daily_SignalPipeline] mutated");
    }

    #[test]
    fn failure_line_carries_reason() {
        let lines = status_lines(&outcome(
            DeletionStatus::NotFound,
            PhaseStatus::Failed("access denied".to_string()),
            PhaseStatus::Skipped,
        ));
        assert_eq!(lines[1], "[S1_Daily_SignalPipeline] failed: access denied");
    }

    #[test]
    fn describe_lists_weekday_fires_only() {
        let def = ScheduledJobDefinition {
            name: JobName::new("S1_Realtime_Monitor").unwrap(),
            action: JobAction::new("tickjob").arg("run").arg("realtime"),
            trigger: Trigger::Weekly {
                days: WeekdaySet::weekdays(),
                at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            },
            retry: RetrySettings::default(),
            visibility: Visibility::Attended,
            description: "monitor".to_string(),
            display_name: None,
        };
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        // Friday 2025-11-07 09:00
        let now = tz.with_ymd_and_hms(2025, 11, 7, 9, 0, 0).unwrap();

        let text = describe(&def, &now, 3);
        assert!(text.contains("next:     Mon 2025-11-10 08:00"));
        assert!(text.contains("next:     Wed 2025-11-12 08:00"));
        assert!(!text.contains("Sat"));
        assert!(!text.contains("Sun"));
        assert!(text.contains("command:  tickjob run realtime"));
    }
}
