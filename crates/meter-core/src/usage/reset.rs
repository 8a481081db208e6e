//! Reset-time parsing for a single quota section.
//!
//! The CLI prints either a relative phrase ("Resets in 5d 3h") or an absolute
//! one ("Resets 1am (Asia/Tokyo)", "Resets Jan 4, 2026, 12:59am"). Both are
//! resolved to an absolute instant plus a positive duration from `now`.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Match;

use super::patterns::UsagePatterns;
use super::quota::is_section_boundary;

/// Maximum number of lines scanned for a reset phrase after the percentage line
pub const RESET_SCAN_LINES: usize = 14;

/// Reset information extracted from one line
#[derive(Debug, Clone, PartialEq)]
pub struct ResetInfo {
    /// The matched line, trimmed
    pub text: String,
    pub resets_at: Option<DateTime<Utc>>,
    /// Seconds until `resets_at`, only when positive
    pub seconds: Option<i64>,
}

/// Find and parse the reset line belonging to the quota whose percentage is on
/// `lines[start]`.
///
/// The scan stops at the next section label so a quota without reset info
/// never picks up the following section's reset line.
pub fn find_reset(
    patterns: &UsagePatterns,
    lines: &[&str],
    start: usize,
    now: DateTime<Utc>,
) -> Option<ResetInfo> {
    let end = start.saturating_add(RESET_SCAN_LINES).min(lines.len());

    for (idx, line) in lines.iter().enumerate().take(end).skip(start) {
        if idx > start && is_section_boundary(line) {
            break;
        }
        let lower = line.to_lowercase();
        if lower.contains("reset") || lower.contains("renew") {
            return Some(parse_reset_line(patterns, line, now));
        }
    }
    None
}

/// Parse a single reset line, relative durations first, then absolute times
pub fn parse_reset_line(patterns: &UsagePatterns, line: &str, now: DateTime<Utc>) -> ResetInfo {
    let text = line.trim().to_string();

    let relative = relative_seconds(patterns, line);
    if relative > 0 {
        let resets_at = chrono::Duration::try_seconds(relative)
            .and_then(|delta| now.checked_add_signed(delta));
        return ResetInfo {
            text,
            resets_at,
            seconds: resets_at.map(|_| relative),
        };
    }

    let resets_at = parse_absolute(patterns, line, now);
    let seconds = resets_at
        .map(|at| (at - now).num_seconds())
        .filter(|secs| *secs > 0);

    ResetInfo {
        text,
        resets_at,
        seconds,
    }
}

/// Sum of day/hour/minute components, each matched independently
fn relative_seconds(patterns: &UsagePatterns, line: &str) -> i64 {
    let component = |re: &regex::Regex, unit: i64| -> i64 {
        re.captures(line)
            .and_then(|c| c[1].parse::<i64>().ok())
            .map(|n| n.saturating_mul(unit))
            .unwrap_or(0)
    };

    component(&patterns.days, 86_400)
        .saturating_add(component(&patterns.hours, 3_600))
        .saturating_add(component(&patterns.minutes, 60))
}

/// Resolve an absolute reset time in the zone named in parentheses, or local time
fn parse_absolute(patterns: &UsagePatterns, line: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let zone = patterns
        .timezone
        .captures(line)
        .and_then(|c| c[1].trim().parse::<Tz>().ok());

    match zone {
        Some(tz) => absolute_in(patterns, line, now, &tz),
        None => absolute_in(patterns, line, now, &Local),
    }
}

fn absolute_in<Z: TimeZone>(
    patterns: &UsagePatterns,
    line: &str,
    now: DateTime<Utc>,
    tz: &Z,
) -> Option<DateTime<Utc>> {
    let local_now = now.with_timezone(tz).naive_local();
    let today = local_now.date();

    // "Jan 4, 2026, 12:59am"
    if let Some(c) = patterns.full_date.captures(line) {
        let month = month_number(&c[1])?;
        let day: u32 = c[2].parse().ok()?;
        let year: i32 = c[3].parse().ok()?;
        let time = clock_time(&c[4], c.get(5), &c[6])?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return localize(tz, date.and_time(time));
    }

    // "Mar 3, 12am"
    if let Some(c) = patterns.month_day_time.captures(line) {
        let month = month_number(&c[1])?;
        let day: u32 = c[2].parse().ok()?;
        let time = clock_time(&c[3], c.get(4), &c[5])?;
        let date = upcoming_date(today, month, day)?;
        return localize(tz, date.and_time(time));
    }

    // "Mar 1" (midnight)
    if let Some(c) = patterns.month_day.captures(line) {
        if let (Some(month), Ok(day)) = (month_number(&c[1]), c[2].parse::<u32>()) {
            if let Some(date) = upcoming_date(today, month, day) {
                return localize(tz, date.and_time(NaiveTime::MIN));
            }
        }
    }

    // "5:59pm", "6am"
    if let Some(c) = patterns.time_only.captures(line) {
        let time = clock_time(&c[1], c.get(2), &c[3])?;
        let mut candidate = today.and_time(time);
        if candidate < local_now {
            candidate = today.succ_opt()?.and_time(time);
        }
        return localize(tz, candidate);
    }

    None
}

/// This year's date, or next year's when it already passed
fn upcoming_date(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

/// 12-hour clock to `NaiveTime`
fn clock_time(hour: &str, minute: Option<Match<'_>>, meridiem: &str) -> Option<NaiveTime> {
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = match minute {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if hour == 0 || hour > 12 {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("pm");
    if pm && hour != 12 {
        hour += 12;
    } else if !pm && hour == 12 {
        hour = 0;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Wall-clock time in `tz` to UTC; the earlier instant wins across DST folds
fn localize<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
