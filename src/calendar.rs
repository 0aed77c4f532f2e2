//! Calendar-day helpers. Every day boundary in the service is UTC.

use anyhow::Context;
use time::{macros::format_description, Date, Duration, OffsetDateTime, Time, UtcOffset};

pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

/// UTC calendar day a timestamp falls on.
pub fn day_of(ts: OffsetDateTime) -> Date {
    ts.to_offset(UtcOffset::UTC).date()
}

/// Half-open `[start, end)` bounds of a UTC calendar day.
pub fn day_bounds(day: Date) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_utc();
    (start, start + Duration::DAY)
}

pub fn format_date(day: Date) -> anyhow::Result<String> {
    day.format(format_description!("[year]-[month]-[day]"))
        .context("format date")
}

pub fn parse_date(text: &str) -> anyhow::Result<Date> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date {text:?}, expected YYYY-MM-DD"))
}

/// Time left from `now` until the next `hour:00` UTC. An exact hit rolls over
/// to the following day so a scheduler never fires twice for one slot.
pub fn until_next_hour(now: OffsetDateTime, hour: u8) -> anyhow::Result<std::time::Duration> {
    let now = now.to_offset(UtcOffset::UTC);
    let slot = Time::from_hms(hour, 0, 0).context("scheduler hour out of range")?;
    let mut next = now.replace_time(slot);
    if next <= now {
        next += Duration::DAY;
    }
    std::time::Duration::try_from(next - now).context("negative scheduler delay")
}

/// `serde(serialize_with)` helper rendering a [`Date`] as `YYYY-MM-DD`.
pub fn serialize_date<S: serde::Serializer>(day: &Date, s: S) -> Result<S::Ok, S::Error> {
    let text = format_date(*day).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&text)
}
