use chrono::{Local, NaiveDate, NaiveDateTime};
use lazy_regex::regex_captures;
use rand::Rng;
use std::time::Duration;
use url::Url;

/// Absolute date layouts, tried in order.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%B %d, %Y", "%d %B %Y", "%m/%d/%Y", "%d/%m/%Y"];

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Resolves `reference` against `base`. Absolute references come back as-is.
pub fn resolve_url(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    base.join(reference).ok()
}

pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    parse_date_at(text, Local::now().naive_local())
}

/// Parses an absolute date (midnight) or an `"<N> <unit> ago"` expression
/// relative to `now`. Anything else is `None`.
pub fn parse_date_at(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return date.and_hms_opt(0, 0, 0);
    }

    let (_, amount, unit) =
        regex_captures!(r"(?i)(\d+)\s+(day|hour|week|month|year)s?\s+ago", text)?;
    let amount: u64 = amount.parse().ok()?;
    let unit_secs = match unit.to_ascii_lowercase().as_str() {
        "hour" => HOUR,
        "day" => DAY,
        "week" => 7 * DAY,
        "month" => 30 * DAY,
        "year" => 365 * DAY,
        _ => return None,
    };
    let ago = std::time::Duration::from_secs(amount.checked_mul(unit_secs)?);
    now.checked_sub_signed(chrono::Duration::from_std(ago).ok()?)
}

/// Keeps at most `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A random duration in `[min, max]`.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_absolute_formats() {
        let now = reference_now();
        assert_eq!(parse_date_at("2024-01-15", now), Some(midnight(2024, 1, 15)));
        assert_eq!(
            parse_date_at("January 15, 2024", now),
            Some(midnight(2024, 1, 15))
        );
        assert_eq!(
            parse_date_at("15 January 2024", now),
            Some(midnight(2024, 1, 15))
        );
        assert_eq!(parse_date_at("01/15/2024", now), Some(midnight(2024, 1, 15)));
        // Not a valid month/day order, falls through to day/month.
        assert_eq!(parse_date_at("15/01/2024", now), Some(midnight(2024, 1, 15)));
        // Ambiguous: month/day wins.
        assert_eq!(parse_date_at("02/03/2024", now), Some(midnight(2024, 2, 3)));
    }

    #[test]
    fn test_relative_formats() {
        let now = reference_now();
        assert_eq!(
            parse_date_at("3 days ago", now),
            Some(now - chrono::Duration::days(3))
        );
        assert_eq!(
            parse_date_at("Posted 1 Hour Ago", now),
            Some(now - chrono::Duration::hours(1))
        );
        assert_eq!(
            parse_date_at("2 weeks ago", now),
            Some(now - chrono::Duration::weeks(2))
        );
        assert_eq!(
            parse_date_at("1 month ago", now),
            Some(now - chrono::Duration::days(30))
        );
        assert_eq!(
            parse_date_at("2 years ago", now),
            Some(now - chrono::Duration::days(730))
        );
    }

    #[test]
    fn test_unparseable_is_none() {
        let now = reference_now();
        assert_eq!(parse_date_at("not a date", now), None);
        assert_eq!(parse_date_at("", now), None);
        assert_eq!(parse_date_at("2024-13-45", now), None);
        assert_eq!(parse_date_at("99999999999999999999 days ago", now), None);
        assert_eq!(parse_date_at("18446744073709551615 years ago", now), None);
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/jobs/9").unwrap();
        assert_eq!(
            resolve_url(&base, "/apply/42").map(String::from),
            Some("https://example.com/apply/42".to_string())
        );
        assert_eq!(
            resolve_url(&base, "10").map(String::from),
            Some("https://example.com/jobs/10".to_string())
        );
        assert_eq!(
            resolve_url(&base, "https://other.org/x").map(String::from),
            Some("https://other.org/x".to_string())
        );
        assert_eq!(resolve_url(&base, "  "), None);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let (min, max) = (Duration::from_millis(2), Duration::from_millis(5));
        for _ in 0..100 {
            let d = jitter(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(jitter(max, min), max);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
