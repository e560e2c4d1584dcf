//! Calendar domain logic for the mood tracker.
//!
//! All date-range computations take "today" as an explicit parameter so
//! they stay pure and deterministic under test; only the edge helpers
//! (`now`, `today`) read the wall clock.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
};

/// Timestamp layout used everywhere a date hits SQLite or the wire.
/// Fixed width and a single shared offset keep the stored strings in
/// chronological order under plain string comparison.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// The app's reference time zone, UTC+05:45.
pub fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 45 * 60).expect("offset is in range")
}

/// Current instant in the reference time zone, truncated to whole
/// seconds to match the stored timestamp precision.
pub fn now() -> DateTime<FixedOffset> {
    Utc::now()
        .with_timezone(&reference_offset())
        .with_nanosecond(0)
        .expect("zero nanoseconds is valid")
}

/// Current calendar date in the reference time zone.
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Monday through Sunday of the ISO week containing `today`.
pub fn week_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// First day of the current month through `today` (month to date).
pub fn month_to_date(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).expect("day 1 exists in every month");
    (first, today)
}

/// Midnight at the start of `date` in the reference time zone.
pub fn day_start(date: NaiveDate) -> DateTime<FixedOffset> {
    reference_offset()
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .expect("fixed offsets are unambiguous")
}

/// Last representable second of `date` in the reference time zone.
pub fn day_end(date: NaiveDate) -> DateTime<FixedOffset> {
    let end = date
        .and_hms_opt(23, 59, 59)
        .expect("23:59:59 exists on every day");
    reference_offset()
        .from_local_datetime(&end)
        .single()
        .expect("fixed offsets are unambiguous")
}

pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
}
