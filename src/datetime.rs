//! Date parsing and arithmetic for the `$diff` and `$nthDayAfter` clauses.
//!
//! Parsing is contractually "ISO-8601 with lenient extensions" per
//! `spec.md` §4.6: a bare `2026-06-15` date, a full RFC3339 timestamp, or a
//! millisecond epoch number must all parse. Unparsable input is never an
//! error here — callers turn a `None` into a `false` node, per the
//! reference resolution/date-parsing error kinds in `spec.md` §7.

use crate::value::Value;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};

/// The unit a `$diff` clause measures its difference in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl DiffUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "days" => Some(DiffUnit::Days),
            "weeks" => Some(DiffUnit::Weeks),
            "months" => Some(DiffUnit::Months),
            "years" => Some(DiffUnit::Years),
            _ => None,
        }
    }
}

/// Parses a `Value` into a date per `spec.md` §4.6: a string through the
/// lenient ISO-8601 parser, a number as milliseconds since epoch, anything
/// else (including an unparsable string) yields `None`.
pub fn parse_date(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => {
            let millis = n.as_f64() as i64;
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.with_timezone(&FixedOffset::east_opt(0).unwrap()))
        }
        _ => None,
    }
}

/// Lenient ISO-8601 parsing: full RFC3339 timestamps, and bare
/// `YYYY-MM-DD` dates (assumed midnight UTC).
fn parse_date_str(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return FixedOffset::east_opt(0)
            .unwrap()
            .from_local_datetime(&naive)
            .single();
    }
    None
}

/// Computes `to - from` in the requested unit, per `spec.md` §4.6:
/// `days = floor((to-from)/86_400_000)`, `weeks = floor(days/7)`,
/// `months`/`years` from calendar year/month fields. Signed.
pub fn diff(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>, unit: DiffUnit) -> i64 {
    match unit {
        DiffUnit::Days => to
            .signed_duration_since(*from)
            .num_milliseconds()
            .div_euclid(86_400_000),
        DiffUnit::Weeks => {
            let days = to
                .signed_duration_since(*from)
                .num_milliseconds()
                .div_euclid(86_400_000);
            days.div_euclid(7)
        }
        DiffUnit::Months => {
            let years = (to.year() - from.year()) as i64;
            let months = to.month() as i64 - from.month() as i64;
            years * 12 + months
        }
        DiffUnit::Years => (to.year() - from.year()) as i64,
    }
}

/// The three-letter English weekday abbreviation chrono reports, matching
/// `spec.md`'s `meta.dayOfWeek` vocabulary.
pub fn weekday_abbrev(weekday: chrono::Weekday) -> &'static str {
    match weekday {
        chrono::Weekday::Mon => "Mon",
        chrono::Weekday::Tue => "Tue",
        chrono::Weekday::Wed => "Wed",
        chrono::Weekday::Thu => "Thu",
        chrono::Weekday::Fri => "Fri",
        chrono::Weekday::Sat => "Sat",
        chrono::Weekday::Sun => "Sun",
    }
}

/// Parses a weekday from either a three-letter abbreviation or an integer
/// 0-6 (Sunday-based, as `spec.md` §4.3 specifies for `$nthDayAfter.day`).
pub fn parse_weekday(value: &Value) -> Option<chrono::Weekday> {
    match value {
        Value::String(s) => match s.as_str() {
            "Sun" => Some(chrono::Weekday::Sun),
            "Mon" => Some(chrono::Weekday::Mon),
            "Tue" => Some(chrono::Weekday::Tue),
            "Wed" => Some(chrono::Weekday::Wed),
            "Thu" => Some(chrono::Weekday::Thu),
            "Fri" => Some(chrono::Weekday::Fri),
            "Sat" => Some(chrono::Weekday::Sat),
            _ => None,
        },
        Value::Number(n) => {
            let f = n.as_f64();
            if f.fract() != 0.0 {
                return None;
            }
            weekday_from_index(f as i64)
        }
        _ => None,
    }
}

fn weekday_from_index(i: i64) -> Option<chrono::Weekday> {
    match i {
        0 => Some(chrono::Weekday::Sun),
        1 => Some(chrono::Weekday::Mon),
        2 => Some(chrono::Weekday::Tue),
        3 => Some(chrono::Weekday::Wed),
        4 => Some(chrono::Weekday::Thu),
        5 => Some(chrono::Weekday::Fri),
        6 => Some(chrono::Weekday::Sat),
        _ => None,
    }
}

/// Finds the `nth` occurrence of `weekday` strictly after `from` — `nth=1`
/// is the first such occurrence even when `from` itself falls on
/// `weekday` (spec.md §9: "strictly after" resolves the open question).
///
/// Computed directly from the weekday offset rather than walking day by
/// day, so an attacker-controlled `nth` (bounded only to a positive
/// integer by the validator) can't turn this into an unbounded loop.
pub fn nth_weekday_after(
    from: &DateTime<FixedOffset>,
    weekday: chrono::Weekday,
    nth: u32,
) -> NaiveDate {
    let date = from.date_naive();
    let current = date.weekday().num_days_from_sunday() as i64;
    let target = weekday.num_days_from_sunday() as i64;
    let mut days_to_first = target - current;
    if days_to_first <= 0 {
        days_to_first += 7;
    }
    let total_days = days_to_first + (nth as i64 - 1) * 7;
    date + chrono::Duration::days(total_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_bare() {
        let d = parse_date(&Value::string("2026-06-15")).unwrap();
        assert_eq!(d.year(), 2026);
        assert_eq!(d.month(), 6);
        assert_eq!(d.day(), 15);
    }

    #[test]
    fn test_parse_date_rfc3339() {
        let d = parse_date(&Value::string("2026-06-15T10:00:00Z")).unwrap();
        assert_eq!(d.hour(), 10);
    }

    use chrono::Timelike;

    #[test]
    fn test_parse_date_unparsable() {
        assert!(parse_date(&Value::string("not a date")).is_none());
        assert!(parse_date(&Value::null()).is_none());
    }

    #[test]
    fn test_diff_days_negative_when_from_after_to() {
        let from = parse_date(&Value::string("2026-02-08")).unwrap();
        let to = parse_date(&Value::string("2026-02-01")).unwrap();
        assert_eq!(diff(&from, &to, DiffUnit::Days), -7);
    }

    #[test]
    fn test_diff_months() {
        let from = parse_date(&Value::string("2026-02-01")).unwrap();
        let to = parse_date(&Value::string("2026-05-01")).unwrap();
        assert_eq!(diff(&from, &to, DiffUnit::Months), 3);
    }

    #[test]
    fn test_nth_weekday_after_strictly_after() {
        // 2026-07-31 is a Friday.
        let from = parse_date(&Value::string("2026-07-31")).unwrap();
        assert_eq!(from.weekday(), chrono::Weekday::Fri);
        // nth=1 Friday strictly after a Friday should be the following week.
        let result = nth_weekday_after(&from, chrono::Weekday::Fri, 1);
        assert_eq!(result, NaiveDate::from_ymd_opt(2026, 8, 7).unwrap());
    }

    #[test]
    fn test_nth_weekday_after_different_weekday() {
        // 2026-07-31 is a Friday; the next Monday is 2026-08-03.
        let from = parse_date(&Value::string("2026-07-31")).unwrap();
        let result = nth_weekday_after(&from, chrono::Weekday::Mon, 1);
        assert_eq!(result, NaiveDate::from_ymd_opt(2026, 8, 3).unwrap());
    }

    #[test]
    fn test_parse_weekday_rejects_fractional_index() {
        assert!(parse_weekday(&Value::float(2.9)).is_none());
        assert_eq!(
            parse_weekday(&Value::float(2.0)),
            Some(chrono::Weekday::Tue)
        );
    }

    #[test]
    fn test_nth_weekday_after_large_nth_resolves_without_looping() {
        // A large `nth` must resolve in constant time, not walk day by day.
        let from = parse_date(&Value::string("2026-07-31")).unwrap();
        let result = nth_weekday_after(&from, chrono::Weekday::Fri, 1_000_000);
        assert_eq!(result.weekday(), chrono::Weekday::Fri);
        assert!(result > from.date_naive());
    }
}
