use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\s*(s|secs?|seconds?|m|mins?|minutes?|h|hrs?|hours?|d|days?|w|weeks?)\s+ago$")
            .expect("static regex is valid")
    })
}

/// Turns a provider display date ("3 hours ago", "Oct 18, 2026") into an approximate
/// timestamp relative to `now`. Unknown formats and out-of-range counts yield `None`.
///
/// Date-only values resolve to the last second of that day, capped at `now`, so a story
/// dated yesterday still falls inside a 24 hour window.
pub fn parse_published(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = relative_re().captures(&s) {
        let n: i64 = caps[1].parse().ok()?;
        let unit = &caps[2];
        let delta = match unit.chars().next()? {
            's' => Duration::try_seconds(n)?,
            'm' => Duration::try_minutes(n)?,
            'h' => Duration::try_hours(n)?,
            'd' => Duration::try_days(n)?,
            'w' => Duration::try_weeks(n)?,
            _ => return None,
        };
        return now.checked_sub_signed(delta);
    }

    match s.as_str() {
        "just now" => return Some(now),
        "yesterday" => return now.checked_sub_signed(Duration::try_days(1)?),
        _ => {}
    }

    for fmt in ["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), fmt) {
            return date.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc().min(now));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_relative_dates() {
        assert_eq!(
            parse_published("3 hours ago", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap())
        );
        assert_eq!(
            parse_published("45 mins ago", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 11, 15, 0).unwrap())
        );
        assert_eq!(
            parse_published("1 day ago", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap())
        );
        assert_eq!(
            parse_published("2 weeks ago", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 5, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn absolute_dates_resolve_to_end_of_day() {
        assert_eq!(
            parse_published("Oct 18, 2026", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 59).unwrap())
        );
        assert_eq!(
            parse_published("2026-10-17", now()),
            Some(Utc.with_ymd_and_hms(2026, 10, 17, 23, 59, 59).unwrap())
        );
        // Today never lands in the future.
        assert_eq!(parse_published("Oct 19, 2026", now()), Some(now()));
    }

    #[test]
    fn oversized_relative_counts_are_none() {
        assert_eq!(parse_published("99999999999999 hours ago", now()), None);
        assert_eq!(parse_published("9999999999999999 weeks ago", now()), None);
        assert_eq!(parse_published("99999999999999999999 days ago", now()), None);
    }

    #[test]
    fn unknown_formats_are_none() {
        assert_eq!(parse_published("", now()), None);
        assert_eq!(parse_published("sometime last month", now()), None);
    }
}
