use cadence_core::types::Frequency;
use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc};

/// Next occurrence of a recurring reminder after `now`.
///
/// The period is added to today's local date and the result pinned to
/// `hour:00` local, so a reminder that fired late still lands on the fixed
/// hour next period. Unknown frequencies behave like `daily`. Monthly
/// reminders on the 29th-31st clamp to the last day of shorter months.
pub fn next_occurrence(
    frequency: &Frequency,
    now: DateTime<Utc>,
    offset: FixedOffset,
    hour: u32,
) -> DateTime<Utc> {
    let today = now.with_timezone(&offset).date_naive();
    let date = match frequency {
        Frequency::Weekly => today + Duration::days(7),
        Frequency::Monthly => today
            .checked_add_months(Months::new(1))
            .unwrap_or(today + Duration::days(31)),
        Frequency::Daily | Frequency::Other(_) => today + Duration::days(1),
    };
    at_local_hour(date, offset, hour)
}

/// First reminder for a new habit: `hour:00` local on the next calendar day.
pub fn first_occurrence(now: DateTime<Utc>, offset: FixedOffset, hour: u32) -> DateTime<Utc> {
    next_occurrence(&Frequency::Daily, now, offset, hour)
}

fn at_local_hour(date: NaiveDate, offset: FixedOffset, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let local = date.and_time(time);
    // A fixed offset never produces gaps or folds.
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}
