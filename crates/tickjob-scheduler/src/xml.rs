//! Task Scheduler 1.2 XML for a [`ScheduledJobDefinition`].
//!
//! `schtasks /Create /XML` imports this document. Every attribute of the
//! definition fits in it, visibility included, so the Windows host needs no
//! post-create mutate phase.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{NaiveDate, Weekday};

use crate::types::{ScheduledJobDefinition, Trigger, Visibility};

const TASK_NAMESPACE: &str = "http://schemas.microsoft.com/windows/2004/02/mit/task";

/// Render the task document. `start` is the first date the trigger is active
/// (the host needs a concrete start boundary).
pub fn render_task_xml(
    definition: &ScheduledJobDefinition,
    path: &str,
    hidden: bool,
    start: NaiveDate,
) -> String {
    let mut xml = String::with_capacity(2048);
    let retry = &definition.retry;

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-16\"?>\n");
    let _ = writeln!(xml, "<Task version=\"1.2\" xmlns=\"{TASK_NAMESPACE}\">");

    xml.push_str("  <RegistrationInfo>\n");
    let _ = writeln!(xml, "    <URI>{}</URI>", escape(path));
    if let Some(display_name) = &definition.display_name {
        let _ = writeln!(xml, "    <Source>{}</Source>", escape(display_name));
    }
    let _ = writeln!(
        xml,
        "    <Description>{}</Description>",
        escape(&definition.description)
    );
    xml.push_str("  </RegistrationInfo>\n");

    xml.push_str("  <Triggers>\n    <CalendarTrigger>\n");
    let _ = writeln!(
        xml,
        "      <StartBoundary>{}</StartBoundary>",
        start.and_time(definition.trigger.at()).format("%Y-%m-%dT%H:%M:%S")
    );
    xml.push_str("      <Enabled>true</Enabled>\n");
    match &definition.trigger {
        Trigger::Daily { .. } => {
            xml.push_str("      <ScheduleByDay>\n        <DaysInterval>1</DaysInterval>\n      </ScheduleByDay>\n");
        }
        Trigger::Weekly { days, .. } => {
            xml.push_str("      <ScheduleByWeek>\n        <DaysOfWeek>\n");
            for day in days.iter() {
                let _ = writeln!(xml, "          <{} />", day_element(day));
            }
            xml.push_str("        </DaysOfWeek>\n        <WeeksInterval>1</WeeksInterval>\n      </ScheduleByWeek>\n");
        }
    }
    xml.push_str("    </CalendarTrigger>\n  </Triggers>\n");

    // Attended jobs need the logged-on user's desktop; hidden ones run in
    // their own logon session whether or not anyone is logged on.
    let logon_type = match definition.visibility {
        Visibility::Attended => "InteractiveToken",
        Visibility::Hidden => "S4U",
    };
    xml.push_str("  <Principals>\n    <Principal id=\"Author\">\n");
    let _ = writeln!(xml, "      <LogonType>{logon_type}</LogonType>");
    xml.push_str("      <RunLevel>LeastPrivilege</RunLevel>\n    </Principal>\n  </Principals>\n");

    xml.push_str("  <Settings>\n");
    xml.push_str("    <MultipleInstancesPolicy>IgnoreNew</MultipleInstancesPolicy>\n");
    let _ = writeln!(
        xml,
        "    <DisallowStartIfOnBatteries>{}</DisallowStartIfOnBatteries>",
        !retry.allow_start_on_battery
    );
    let _ = writeln!(
        xml,
        "    <StopIfGoingOnBatteries>{}</StopIfGoingOnBatteries>",
        !retry.continue_on_battery_saver
    );
    let _ = writeln!(
        xml,
        "    <StartWhenAvailable>{}</StartWhenAvailable>",
        retry.start_when_available
    );
    let _ = writeln!(xml, "    <Hidden>{hidden}</Hidden>");
    // PT0S: no execution time limit. Steps have no timeout either.
    xml.push_str("    <ExecutionTimeLimit>PT0S</ExecutionTimeLimit>\n");
    if retry.max_restarts > 0 {
        xml.push_str("    <RestartOnFailure>\n");
        let _ = writeln!(
            xml,
            "      <Interval>{}</Interval>",
            iso_duration(retry.restart_interval)
        );
        let _ = writeln!(xml, "      <Count>{}</Count>", retry.max_restarts);
        xml.push_str("    </RestartOnFailure>\n");
    }
    xml.push_str("    <Enabled>true</Enabled>\n  </Settings>\n");

    let action = &definition.action;
    xml.push_str("  <Actions Context=\"Author\">\n    <Exec>\n");
    let _ = writeln!(
        xml,
        "      <Command>{}</Command>",
        escape(&action.program.to_string_lossy())
    );
    if !action.arguments.is_empty() {
        let _ = writeln!(
            xml,
            "      <Arguments>{}</Arguments>",
            escape(&action.command_line())
        );
    }
    if let Some(dir) = &action.working_dir {
        let _ = writeln!(
            xml,
            "      <WorkingDirectory>{}</WorkingDirectory>",
            escape(&dir.to_string_lossy())
        );
    }
    xml.push_str("    </Exec>\n  </Actions>\n</Task>\n");
    xml
}

/// UTF-16LE with a byte-order mark, matching the declared encoding.
pub fn encode_utf16_le(xml: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + xml.len() * 2);
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    for unit in xml.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// ISO-8601 duration in the largest whole unit, e.g. `PT1M`, `PT90S`.
pub fn iso_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("PT{}H", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("PT{}M", secs / 60)
    } else {
        format!("PT{secs}S")
    }
}

fn day_element(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobAction, JobName, RetrySettings, WeekdaySet};
    use chrono::NaiveTime;

    fn definition(trigger: Trigger, visibility: Visibility) -> ScheduledJobDefinition {
        ScheduledJobDefinition {
            name: JobName::new("S1_Daily_SignalPipeline").unwrap(),
            action: JobAction::new("C:\\tickjob\\tickjob.exe")
                .arg("run")
                .arg("daily")
                .working_dir("C:\\tickjob"),
            trigger,
            retry: RetrySettings::default(),
            visibility,
            description: "Signals & universe <daily>".to_string(),
            display_name: None,
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    #[test]
    fn daily_hidden_task() {
        let def = definition(
            Trigger::Daily {
                at: NaiveTime::from_hms_opt(20, 15, 0).unwrap(),
            },
            Visibility::Hidden,
        );
        let xml = render_task_xml(&def, "\\S1_Daily_SignalPipeline", true, start());

        assert!(xml.contains("<StartBoundary>2025-11-03T20:15:00</StartBoundary>"));
        assert!(xml.contains("<DaysInterval>1</DaysInterval>"));
        assert!(xml.contains("<Hidden>true</Hidden>"));
        assert!(xml.contains("<LogonType>S4U</LogonType>"));
        assert!(xml.contains("<Interval>PT1M</Interval>"));
        assert!(xml.contains("<Count>3</Count>"));
        assert!(xml.contains("<StartWhenAvailable>true</StartWhenAvailable>"));
        assert!(xml.contains("<DisallowStartIfOnBatteries>false</DisallowStartIfOnBatteries>"));
        assert!(xml.contains("<Arguments>run daily</Arguments>"));
        assert!(xml.contains("Signals &amp; universe &lt;daily&gt;"));
    }

    #[test]
    fn weekly_attended_task_lists_only_its_days() {
        let def = definition(
            Trigger::Weekly {
                days: WeekdaySet::weekdays(),
                at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            },
            Visibility::Attended,
        );
        let xml = render_task_xml(&def, "\\S1_Realtime_Monitor", false, start());

        assert!(xml.contains("<Monday />"));
        assert!(xml.contains("<Friday />"));
        assert!(!xml.contains("<Saturday />"));
        assert!(!xml.contains("<Sunday />"));
        assert!(xml.contains("<Hidden>false</Hidden>"));
        assert!(xml.contains("<LogonType>InteractiveToken</LogonType>"));
    }

    #[test]
    fn zero_restarts_omits_restart_block() {
        let mut def = definition(
            Trigger::Daily {
                at: NaiveTime::from_hms_opt(20, 15, 0).unwrap(),
            },
            Visibility::Hidden,
        );
        def.retry.max_restarts = 0;
        let xml = render_task_xml(&def, "\\x", true, start());
        assert!(!xml.contains("RestartOnFailure"));
    }

    #[test]
    fn iso_durations() {
        assert_eq!(iso_duration(Duration::from_secs(60)), "PT1M");
        assert_eq!(iso_duration(Duration::from_secs(90)), "PT90S");
        assert_eq!(iso_duration(Duration::from_secs(7200)), "PT2H");
        assert_eq!(iso_duration(Duration::ZERO), "PT0S");
    }

    #[test]
    fn utf16_has_bom() {
        let bytes = encode_utf16_le("<a/>");
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(bytes.len(), 2 + 4 * 2);
        assert_eq!(&bytes[2..4], &[b'<', 0]);
    }
}
