// Utility helpers for parsing and formatting.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Date layouts accepted when reading the log, month-first.
const DATE_FORMATS: [&str; 5] = ["%m/%d/%Y", "%Y-%m-%d", "%m/%d/%y", "%Y/%m/%d", "%m-%d-%Y"];

/// Date layouts accepted for a new entry, tried in this order.
pub const ENTRY_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Parse a duration cell into `f64`.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters (`nan`, `inf`, `12 min`).
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a week identifier such as `W30`, `30` or `#30`.
///
/// Every non-digit is dropped before parsing, so `W 3 0` also reads as 30.
pub fn parse_week_safe(s: Option<&str>) -> Option<u32> {
    let digits: String = s?.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok()
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Timestamps exported with a time component; the time is discarded.
    for fmt in DATE_FORMATS {
        for time in ["%H:%M", "%H:%M:%S"] {
            let layout = format!("{} {}", fmt, time);
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, &layout) {
                return Some(dt.date());
            }
        }
    }
    None
}

/// Parse a date supplied with a new entry.
pub fn parse_entry_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ENTRY_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Serialize a stored number: plain integer when whole, otherwise two
/// decimals with trailing zeros and point stripped (`3.50` -> `3.5`).
pub fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }
    let s = format!("{:.2}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Render a duration for the report tables.
pub fn format_minutes(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => {
            if (v - v.round()).abs() < 1e-6 {
                format!("{} min", v.round() as i64)
            } else {
                format!("{:.1} min", v)
            }
        }
        _ => "0 min".to_string(),
    }
}

/// Greedy word wrap. Words are never split, so a single long word may
/// exceed `width` on its own line.
pub fn wrap_label(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if candidate_len <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Title-case a header: every letter that follows a non-letter is upper
/// case, every other letter lower case.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 records loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64_safe() {
        assert_eq!(parse_f64_safe(Some(" 12.5 ")), Some(12.5));
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(Some("nan")), None);
        assert_eq!(parse_f64_safe(Some("12 min")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn test_parse_week_safe() {
        assert_eq!(parse_week_safe(Some("W30")), Some(30));
        assert_eq!(parse_week_safe(Some(" 7 ")), Some(7));
        assert_eq!(parse_week_safe(Some("week")), None);
        assert_eq!(parse_week_safe(Some("")), None);
    }

    #[test]
    fn test_parse_date_safe_month_first() {
        let d = parse_date_safe(Some("07/03/2024")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        let d = parse_date_safe(Some("2024-07-15")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        let d = parse_date_safe(Some("07/15/2024 08:30")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        assert_eq!(parse_date_safe(Some("31/31/2024")), None);
        assert_eq!(parse_date_safe(Some("soon")), None);
    }

    #[test]
    fn test_parse_entry_date_order() {
        // Day-first is tried before month-first for entries.
        let d = parse_entry_date("03/07/2024").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        let d = parse_entry_date("12/31/2024").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(parse_entry_date("July 4th").is_none());
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(3.0), "3");
        assert_eq!(format_decimal(3.5), "3.5");
        assert_eq!(format_decimal(1.234), "1.23");
        assert_eq!(format_decimal(2.999), "3");
        assert_eq!(format_decimal(1e19), "10000000000000000000");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(Some(40.0)), "40 min");
        assert_eq!(format_minutes(Some(12.25)), "12.2 min");
        assert_eq!(format_minutes(Some(f64::NAN)), "0 min");
        assert_eq!(format_minutes(None), "0 min");
    }

    #[test]
    fn test_wrap_label() {
        assert_eq!(
            wrap_label("printer on second floor jammed again", 14),
            vec!["printer on", "second floor", "jammed again"]
        );
        assert_eq!(wrap_label("supercalifragilistic", 5), vec!["supercalifragilistic"]);
        assert!(wrap_label("   ", 10).is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("PROBLEM DESCRIPTION/SOLUTION"), "Problem Description/Solution");
        assert_eq!(title_case("event problem"), "Event Problem");
    }
}
