//! Remote directory listings.
//!
//! Servers answer `LIST` with `ls -l` style lines:
//!
//! ```text
//! -rw-r--r--    1 tub     tub         327697 Jan 25 11:42 api.log
//! -rw-r--r--    1 tub     tub          10240 Mar  3  2024 api.log.3.gz
//! ```
//!
//! Recent files carry a time of day and no year; older files carry a year and
//! no time.
use super::remote::{RemoteError, RemoteStore};
use super::since::month_number;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub name: String,
    pub modified: Option<NaiveDateTime>,
}

/// Parse one `LIST` line. Returns `None` when the line has too few fields.
pub fn parse_list_line(line: &str, now: NaiveDateTime) -> Option<RemoteFileEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }
    let name = parts[8..].join(" ");
    let month = month_number(parts[5]).unwrap_or(1);
    let modified = parts[6]
        .parse::<u32>()
        .ok()
        .and_then(|day| modified_time(month, day, parts[7], now));
    Some(RemoteFileEntry { name, modified })
}

fn modified_time(month: u32, day: u32, time_or_year: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some((hour, minute)) = time_or_year.split_once(':') {
        let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;
        let this_year = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_time(time);
        // No year in the listing: a timestamp ahead of now belongs to last year.
        if this_year > now {
            return Some(NaiveDate::from_ymd_opt(now.year() - 1, month, day)?.and_time(time));
        }
        return Some(this_year);
    }
    let year: i32 = time_or_year.parse().ok()?;
    Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(NaiveTime::MIN))
}

/// List regular, non-hidden files in `dir`, sorted by name.
pub fn list_directory(
    remote: &mut dyn RemoteStore,
    dir: &str,
    now: NaiveDateTime,
) -> Result<Vec<RemoteFileEntry>, RemoteError> {
    remote.change_dir(dir)?;
    let mut entries: Vec<RemoteFileEntry> = remote
        .list()?
        .iter()
        .filter(|line| !line.starts_with('d'))
        .filter_map(|line| parse_list_line(line, now))
        .filter(|entry| !entry.name.starts_with('.'))
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Short age label: `3d ago`, `5h ago`, `12m ago`, `just now`.
pub fn format_time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let diff = now - then;
    if diff.num_days() > 0 {
        format!("{}d ago", diff.num_days())
    } else if diff.num_hours() > 0 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_minutes() > 0 {
        format!("{}m ago", diff.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn recent_entry_uses_current_year_when_in_the_past() {
        let now = at(2026, 10, 16, 12, 0);
        let entry = parse_list_line(
            "-rw-r--r--    1 tub     tub         327697 Jan 25 11:42 api.log",
            now,
        )
        .expect("entry");
        assert_eq!(entry.name, "api.log");
        assert_eq!(entry.modified, Some(at(2026, 1, 25, 11, 42)));
    }

    #[test]
    fn recent_entry_in_the_future_rolls_back_a_year() {
        let now = at(2026, 1, 10, 8, 0);
        let entry = parse_list_line(
            "-rw-r--r--    1 tub     tub         327697 Jan 25 11:42 api.log",
            now,
        )
        .expect("entry");
        assert_eq!(entry.modified, Some(at(2025, 1, 25, 11, 42)));
    }

    #[test]
    fn older_entry_has_year_and_midnight() {
        let now = at(2026, 10, 16, 12, 0);
        let entry = parse_list_line(
            "-rw-r--r--    1 tub     tub          10240 Mar  3  2024 api.log.3.gz",
            now,
        )
        .expect("entry");
        assert_eq!(entry.modified, Some(at(2024, 3, 3, 0, 0)));
    }

    #[test]
    fn names_with_spaces_survive() {
        let now = at(2026, 10, 16, 12, 0);
        let entry = parse_list_line(
            "-rw-r--r--    1 tub     tub            12 Oct 16 09:00 crontab backup.txt",
            now,
        )
        .expect("entry");
        assert_eq!(entry.name, "crontab backup.txt");
    }

    #[test]
    fn short_and_odd_lines() {
        let now = at(2026, 10, 16, 12, 0);
        assert_eq!(parse_list_line("total 24", now), None);
        let entry = parse_list_line("-rw-r--r-- 1 a b 1 Xyz 31 12:00 odd.txt", now).expect("entry");
        assert_eq!(entry.modified, Some(at(2026, 1, 31, 12, 0)));
        let entry = parse_list_line("-rw-r--r-- 1 a b 1 Feb 31 2024 bad.txt", now).expect("entry");
        assert_eq!(entry.modified, None);
    }

    #[test]
    fn time_ago_buckets() {
        let now = at(2026, 10, 16, 12, 0);
        assert_eq!(format_time_ago(at(2026, 10, 13, 11, 0), now), "3d ago");
        assert_eq!(format_time_ago(at(2026, 10, 16, 7, 30), now), "4h ago");
        assert_eq!(format_time_ago(at(2026, 10, 16, 11, 48), now), "12m ago");
        assert_eq!(format_time_ago(at(2026, 10, 16, 12, 0), now), "just now");
        assert_eq!(format_time_ago(at(2026, 10, 17, 12, 0), now), "just now");
    }
}
