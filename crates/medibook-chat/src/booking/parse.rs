//! Date and time-of-day parsing for the booking dialogue.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate, NaiveTime};
use regex::Regex;

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})([/-])(\d{1,2})([/-])(\d{1,4})$").unwrap());

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?$").unwrap());

static TIME_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(a\.?m\.?|p\.?m\.?|hrs|hr|h)$").unwrap());

/// Relative date words and their offset in days.
const RELATIVE_DAYS: &[(&str, u64)] = &[
    ("today", 0),
    ("hoy", 0),
    ("tomorrow", 1),
    ("mañana", 1),
    ("manana", 1),
    ("day after tomorrow", 2),
    ("the day after tomorrow", 2),
    ("pasado mañana", 2),
    ("pasado manana", 2),
];

/// Parse a calendar date relative to `today`.
///
/// Accepts relative words, ISO `YYYY-MM-DD`, and `DD/MM/YYYY` or `DD-MM-YYYY`
/// with a 2- or 4-digit year. Past dates parse; see [`is_valid_date`].
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase();

    if let Some((_, offset)) = RELATIVE_DAYS.iter().find(|(word, _)| *word == lowered) {
        return today.checked_add_days(Days::new(*offset));
    }

    let caps = NUMERIC_DATE_RE.captures(&lowered)?;
    let separator = &caps[2];
    if separator != &caps[4] {
        return None;
    }
    let (first, second, third) = (&caps[1], &caps[3], &caps[5]);

    if first.len() == 4 {
        // ISO order is dash separated only.
        if separator != "-" {
            return None;
        }
        let year = first.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, second.parse().ok()?, third.parse().ok()?);
    }

    let year: i32 = match third.len() {
        2 => {
            let yy: i32 = third.parse().ok()?;
            if yy < 69 {
                2000 + yy
            } else {
                1900 + yy
            }
        }
        4 => third.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, second.parse().ok()?, first.parse().ok()?)
}

/// A date is bookable when it is today or later.
pub fn is_valid_date(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today
}

/// Parse a time of day.
///
/// Accepts `HH:MM` and a bare hour, with an optional trailing `am`, `pm`,
/// `h`, `hr` or `hrs`. A `pm` suffix moves hours 1-11 to the afternoon.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let compact: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let (body, afternoon) = match TIME_SUFFIX_RE.find(&compact) {
        Some(m) => (&compact[..m.start()], m.as_str().starts_with('p')),
        None => (compact.as_str(), false),
    };

    let caps = TIME_RE.captures(body)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if afternoon && (1..12).contains(&hour) {
        hour += 12;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}
