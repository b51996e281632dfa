//! `--since` phrase parsing.
//!
//! Accepts a practical subset of relative and absolute time phrases. Phrases
//! that leave the year or day open resolve to the most recent past match.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Phrases shown to the user when `--since` cannot be parsed.
pub const EXAMPLES: &str = "'2 hours ago', 'yesterday', '3 days ago', 'Jan 25 2pm'";

const SECOND: i64 = 1;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Resolve `expr` against `now`. Returns `None` for anything unrecognized.
pub fn parse_since(expr: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = expr
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    if text.is_empty() {
        return None;
    }
    match text.as_str() {
        "now" | "just now" => return Some(now),
        "today" => return Some(now.date().and_time(NaiveTime::MIN)),
        "yesterday" => return now.checked_sub_signed(Duration::days(1)),
        _ => {}
    }

    absolute(&text)
        .or_else(|| month_day(&text, now))
        .or_else(|| time_of_day(&text, now))
        .or_else(|| {
            let phrase = text.strip_suffix(" ago").unwrap_or(&text);
            now.checked_sub_signed(duration_phrase(phrase)?)
        })
}

fn absolute(text: &str) -> Option<NaiveDateTime> {
    const DATE_TIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dt%H:%M:%S",
        "%Y-%m-%dt%H:%M",
    ];
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// `jan 25`, `jan 25 2pm`, `january 25 14:30`, `jan 25 2025`.
fn month_day(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut tokens = text.split(' ');
    let month = month_number(tokens.next()?)?;
    let day: u32 = tokens
        .next()?
        .trim_end_matches(',')
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()?;
    let rest: Vec<&str> = tokens.collect();

    let (year, clock_tokens) = match rest.first() {
        Some(first) if first.len() == 4 && first.bytes().all(|b| b.is_ascii_digit()) => {
            (Some(first.parse::<i32>().ok()?), &rest[1..])
        }
        _ => (None, &rest[..]),
    };
    let time = if clock_tokens.is_empty() {
        NaiveTime::MIN
    } else {
        parse_clock(&clock_tokens.join(" "))?
    };

    match year {
        Some(year) => Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(time)),
        None => {
            let this_year = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_time(time);
            if this_year > now {
                Some(NaiveDate::from_ymd_opt(now.year() - 1, month, day)?.and_time(time))
            } else {
                Some(this_year)
            }
        }
    }
}

/// A bare clock time means its most recent occurrence.
fn time_of_day(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let today = now.date().and_time(parse_clock(text)?);
    if today > now {
        today.checked_sub_signed(Duration::days(1))
    } else {
        Some(today)
    }
}

/// `14:30`, `14:30:05`, `2pm`, `2 pm`, `2:30pm`, `noon`, `midnight`.
fn parse_clock(text: &str) -> Option<NaiveTime> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return Some(NaiveTime::MIN),
        _ => {}
    }
    let (body, pm) = if let Some(body) = compact.strip_suffix("am") {
        (body, Some(false))
    } else if let Some(body) = compact.strip_suffix("pm") {
        (body, Some(true))
    } else {
        (compact.as_str(), None)
    };
    if pm.is_none() && !body.contains(':') {
        return None;
    }

    let mut parts = body.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(raw) => raw.parse().ok()?,
        None => 0,
    };
    let second: u32 = match parts.next() {
        Some(raw) => raw.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }

    let hour = match pm {
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(true) => hour % 12 + 12,
        Some(false) => hour % 12,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// `2 hours`, `an hour`, `3 days`, or a compact form such as `90min`/`2h`.
fn duration_phrase(text: &str) -> Option<Duration> {
    if let Some((count, unit)) = text.split_once(' ') {
        let count: i64 = match count {
            "a" | "an" => 1,
            digits => digits.parse().ok()?,
        };
        return Duration::try_seconds(count.checked_mul(unit_seconds(unit)?)?);
    }
    let std_duration = humantime::parse_duration(text).ok()?;
    Duration::from_std(std_duration).ok()
}

fn unit_seconds(unit: &str) -> Option<i64> {
    let seconds = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => 7 * DAY,
        "mo" | "month" | "months" => 30 * DAY,
        "y" | "yr" | "yrs" | "year" | "years" => 365 * DAY,
        _ => return None,
    };
    Some(seconds)
}

/// Month number from a name or its three-letter prefix.
pub fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let name = name.trim_end_matches(['.', ',']).to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(&name))
        .map(|idx| idx as u32 + 1)
}
