use chrono::{DateTime, Datelike, Days, TimeZone};

use crate::types::Trigger;

/// Days searched ahead of `after`. A week plus slack for local times that
/// fall into a DST gap on the first matching day.
const SEARCH_DAYS: u64 = 14;

/// Compute the next local fire time for `trigger` strictly *after* `after`.
///
/// The host scheduler does this for real; the orchestrator only uses it for
/// reporting and tests. Local times that do not exist (spring-forward gap) are
/// skipped to the next matching day; ambiguous ones resolve to the earliest
/// instant. Returns `None` for a weekly trigger with an empty weekday set.
pub fn next_fire<Tz: TimeZone>(trigger: &Trigger, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = after.timezone();
    let today = after.date_naive();
    let at = trigger.at();

    for offset in 0..=SEARCH_DAYS {
        let date = today.checked_add_days(Days::new(offset))?;

        if let Trigger::Weekly { days, .. } = trigger {
            if !days.contains(date.weekday()) {
                continue;
            }
        }

        let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() else {
            continue;
        };
        if candidate > *after {
            return Some(candidate);
        }
    }
    None
}

/// The next `count` fire times after `after`, in order.
pub fn upcoming_fires<Tz: TimeZone>(
    trigger: &Trigger,
    after: &DateTime<Tz>,
    count: usize,
) -> Vec<DateTime<Tz>> {
    let mut fires = Vec::with_capacity(count);
    let mut cursor = after.clone();
    while fires.len() < count {
        match next_fire(trigger, &cursor) {
            Some(next) => {
                cursor = next.clone();
                fires.push(next);
            }
            None => break,
        }
    }
    fires
}
