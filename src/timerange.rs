//! Symbolic time range resolution
//!
//! Maps the `time_range` token stored in a widget config to a concrete
//! `[start, end)` interval anchored at "now". Month-based ranges use
//! calendar-month arithmetic to match billing-cycle semantics, never fixed
//! 30-day blocks.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Symbolic time range token from a widget's query config.
///
/// Unrecognized tokens deserialize to `Unknown` and resolve like
/// `last_6_months`; stored configs must keep working across versions.
/// The raw token is not retained: re-serializing a config that held an
/// unrecognized value writes `"Unknown"` in its place. Lossy on purpose;
/// the token carries no information the resolver would use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "last_6_months")]
    Last6Months,
    #[serde(rename = "last_3_months")]
    Last3Months,
    #[serde(rename = "last_12_months", alias = "last_year")]
    Last12Months,
    #[serde(rename = "this_year")]
    ThisYear,
    #[serde(rename = "this_month")]
    ThisMonth,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "all_time")]
    AllTime,
    #[serde(other)]
    Unknown,
}

impl TimeRange {
    /// Resolve the token into a concrete `(start, end)` pair with `end = now`.
    pub fn resolve(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            TimeRange::Last6Months => months_back(now, 6),
            TimeRange::Last3Months => months_back(now, 3),
            TimeRange::Last12Months => months_back(now, 12),
            TimeRange::ThisYear => start_of_day(first_of_year(now.date_naive())),
            TimeRange::ThisMonth => start_of_day(month_start(now.date_naive())),
            TimeRange::Last30Days => now - chrono::Duration::days(30),
            TimeRange::Last7Days => now - chrono::Duration::days(7),
            TimeRange::AllTime => epoch_floor(),
            TimeRange::Unknown => {
                warn!("unrecognized time range token, defaulting to last_6_months");
                months_back(now, 6)
            }
        };

        (start, now)
    }
}

/// Fixed floor for `all_time` queries. The ledger predates nothing earlier.
fn epoch_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn months_back(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months)).unwrap_or(now)
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Every calendar-month start whose first day lies in
/// `[start.with_day(1), end]`, in ascending order. The month containing
/// `start` is always included, even when `start` is mid-month.
pub fn enumerate_months(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut months = Vec::new();
    let mut current = start_of_day(month_start(start.date_naive()));

    while current <= end {
        months.push(current);
        current = match current.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    months
}

/// Exclusive end of the calendar month beginning at `month`.
pub fn next_month(month: DateTime<Utc>) -> DateTime<Utc> {
    month.checked_add_months(Months::new(1)).unwrap_or(month)
}

/// Display label for a month bucket, e.g. `"Mar 2025"`.
pub fn month_label(month: DateTime<Utc>) -> String {
    month.format("%b %Y").to_string()
}

/// Display label for a day bucket, e.g. `"2025-03-14"`.
pub fn day_label(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn test_calendar_month_subtraction() {
        let now = fixed_now();

        let (start, end) = TimeRange::Last6Months.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 14, 15, 9, 26).unwrap());
        assert_eq!(end, now);

        let (start, _) = TimeRange::Last3Months.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 14, 15, 9, 26).unwrap());

        let (start, _) = TimeRange::Last12Months.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap());
    }

    #[test]
    fn test_month_subtraction_clamps_short_months() {
        // Mar 31 minus one calendar month clamps to Feb 28.
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        let start = months_back(now, 1);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_this_year_and_this_month_start_at_midnight() {
        let now = fixed_now();

        let (start, _) = TimeRange::ThisYear.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let (start, _) = TimeRange::ThisMonth.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_day_based_ranges() {
        let now = fixed_now();

        let (start, _) = TimeRange::Last30Days.resolve(now);
        assert_eq!(start, now - chrono::Duration::days(30));

        let (start, _) = TimeRange::Last7Days.resolve(now);
        assert_eq!(start, now - chrono::Duration::days(7));
    }

    #[test]
    fn test_all_time_floor() {
        let (start, _) = TimeRange::AllTime.resolve(fixed_now());
        assert_eq!(start, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_start_never_exceeds_now() {
        let now = fixed_now();
        let ranges = [
            TimeRange::Last6Months,
            TimeRange::Last3Months,
            TimeRange::Last12Months,
            TimeRange::ThisYear,
            TimeRange::ThisMonth,
            TimeRange::Last30Days,
            TimeRange::Last7Days,
            TimeRange::AllTime,
            TimeRange::Unknown,
        ];
        for range in ranges {
            let (start, end) = range.resolve(now);
            assert!(start <= now, "{:?} produced start after now", range);
            assert_eq!(end, now);
        }
    }

    #[test]
    fn test_unknown_token_falls_back_to_six_months() {
        let token: TimeRange = serde_json::from_str("\"next_fortnight\"").unwrap();
        assert_eq!(token, TimeRange::Unknown);

        let now = fixed_now();
        let (start, _) = token.resolve(now);
        assert_eq!(start, months_back(now, 6));
    }

    #[test]
    fn test_last_year_alias() {
        let token: TimeRange = serde_json::from_str("\"last_year\"").unwrap();
        assert_eq!(token, TimeRange::Last12Months);
    }

    #[test]
    fn test_enumerate_months_includes_partial_first_month() {
        let start = Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 3, 8, 0, 0).unwrap();

        let months = enumerate_months(start, end);
        let labels: Vec<String> = months.iter().map(|m| month_label(*m)).collect();
        assert_eq!(labels, vec!["Nov 2024", "Dec 2024", "Jan 2025", "Feb 2025"]);
    }

    #[test]
    fn test_enumerate_months_single_month() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(enumerate_months(start, end).len(), 1);
    }

    #[test]
    fn test_next_month_is_exclusive_bound() {
        let month = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next_month(month),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
        );
    }
}
