/// Display formatting for timestamps, dates, money and hours

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Short relative label for activity feeds
///
/// | age             | label          |
/// |-----------------|----------------|
/// | < 1 minute      | `just now`     |
/// | < 1 hour        | `12m ago`      |
/// | < 1 day         | `5h ago`       |
/// | < 7 days        | `3d ago`       |
/// | same year       | `Mar 4`        |
/// | older           | `Mar 4, 2024`  |
///
/// Timestamps in the future read `just now`.
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();

    if seconds < MINUTE {
        "just now".to_string()
    } else if seconds < HOUR {
        format!("{}m ago", seconds / MINUTE)
    } else if seconds < DAY {
        format!("{}h ago", seconds / HOUR)
    } else if seconds < WEEK {
        format!("{}d ago", seconds / DAY)
    } else if then.year() == now.year() {
        then.format("%b %-d").to_string()
    } else {
        format_date(then.date_naive())
    }
}

/// `Mar 4, 2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `$1,234.50`, negatives as `-$1,234.50`
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };

    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    format!("{sign}${}.{cents}", group_thousands(whole))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `7.5h`, `8h`
pub fn format_hours(hours: Decimal) -> String {
    let rounded = hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{}h", rounded.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn ago(seconds: i64) -> String {
        format_relative(now() - Duration::seconds(seconds), now())
    }

    #[test]
    fn test_minute_boundary() {
        assert_eq!(ago(0), "just now");
        assert_eq!(ago(59), "just now");
        assert_eq!(ago(60), "1m ago");
    }

    #[test]
    fn test_hour_boundary() {
        assert_eq!(ago(3599), "59m ago");
        assert_eq!(ago(3600), "1h ago");
    }

    #[test]
    fn test_day_boundary() {
        assert_eq!(ago(86_399), "23h ago");
        assert_eq!(ago(86_400), "1d ago");
    }

    #[test]
    fn test_week_boundary() {
        assert_eq!(ago(7 * 86_400 - 1), "6d ago");
        assert_eq!(ago(7 * 86_400), "Jun 8");
    }

    #[test]
    fn test_year_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap();
        let same_year = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        let last_year = Utc.with_ymd_and_hms(2024, 12, 31, 9, 0, 0).unwrap();

        assert_eq!(format_relative(same_year, now), "Jan 2");
        assert_eq!(format_relative(last_year, now), "Dec 31, 2024");
    }

    #[test]
    fn test_future_is_just_now() {
        assert_eq!(format_relative(now() + Duration::hours(3), now()), "just now");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(format_date(date), "Mar 4, 2024");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency("1234.5".parse().unwrap()), "$1,234.50");
        assert_eq!(format_currency("0".parse().unwrap()), "$0.00");
        assert_eq!(format_currency("999".parse().unwrap()), "$999.00");
        assert_eq!(format_currency("1000000".parse().unwrap()), "$1,000,000.00");
        assert_eq!(format_currency("-1234.5".parse().unwrap()), "-$1,234.50");
        assert_eq!(format_currency("12.345".parse().unwrap()), "$12.35");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours("7.50".parse().unwrap()), "7.5h");
        assert_eq!(format_hours("8.00".parse().unwrap()), "8h");
        assert_eq!(format_hours("0.25".parse().unwrap()), "0.25h");
    }
}
