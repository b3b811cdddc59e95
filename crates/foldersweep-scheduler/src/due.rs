//! Next-due-time computation.
//!
//! Before the first run the schedule targets the configured time of day
//! (today if still ahead, otherwise tomorrow). After that it is
//! `last_run_at + interval_days`, never clamped to now: a device that was off
//! for several intervals fires once, immediately.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

use foldersweep_core::{ScheduleConfig, TimeOfDay};

/// Compute when the next run is due, relative to `now` in `now`'s time zone.
pub fn next_due_at<Tz: TimeZone>(schedule: &ScheduleConfig, now: &DateTime<Tz>) -> DateTime<Utc> {
    if let Some(last) = schedule.last_run_at {
        return last + Duration::days(i64::from(schedule.interval_days.max(1)));
    }

    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let today = now.date_naive();

    let candidate = at_local(&tz, today, schedule.time_of_day);
    if candidate > now_utc {
        return candidate;
    }
    let tomorrow = today.succ_opt().unwrap_or(today);
    at_local(&tz, tomorrow, schedule.time_of_day)
}

/// True if `due` passed more than `tolerance` ago.
pub fn is_overdue(due: DateTime<Utc>, now: DateTime<Utc>, tolerance: std::time::Duration) -> bool {
    let tolerance = Duration::from_std(tolerance).unwrap_or_else(|_| Duration::zero());
    now - due > tolerance
}

/// Resolve a wall-clock time on `date` in `tz`.
/// A time skipped by a DST jump moves forward one hour; an ambiguous time
/// takes the earlier instant.
fn at_local<Tz: TimeZone>(tz: &Tz, date: NaiveDate, tod: TimeOfDay) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(tod.hour, tod.minute, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}
