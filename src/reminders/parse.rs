//! Natural-language reminder parsing.
//!
//! A reminder command is split into a message and a time expression. The
//! time is searched for from the right: first after the last " at ", then
//! after the last " on ", then from the last " in " (kept, so "in 5 minutes"
//! still reads as relative), and finally the whole remainder is tried.
//!
//! Supported time expressions, all relative to a caller supplied "now":
//! clock times (`9`, `9:30`, `9 pm`, `9:30 p.m.`, `21:15`, `noon`,
//! `midnight`), relative offsets (`in 5 minutes`, `in an hour`,
//! `in two days`), day words (`today`, `tonight`, `tomorrow`,
//! `yesterday`), weekdays (`friday`, `next friday`, `last friday`) and
//! calendar dates (`march 5`, `5th of march`), optionally combined with a
//! clock time.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex::Regex;
use std::sync::LazyLock;

/// Trigger phrases, longest first.
const TRIGGERS: [&str; 7] = [
    "set a reminder for",
    "set a reminder to",
    "remind me to",
    "reminder for",
    "set reminder",
    "remind me",
    "remind",
];

/// Default hour for "tonight" without a clock time.
const TONIGHT_HOUR: u32 = 20;

#[allow(clippy::expect_used)]
static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^in\s+(a|an|\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?)$",
    )
    .expect("valid relative time regex")
});

#[allow(clippy::expect_used)]
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(?:o'clock)?\s*(a\.?m\.?|p\.?m\.?)?$")
        .expect("valid clock regex")
});

#[allow(clippy::expect_used)]
static DAY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(today|tonight|tomorrow|yesterday)\b").expect("valid day word regex")
});

#[allow(clippy::expect_used)]
static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(next|last|this)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid weekday regex")
});

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec";

#[allow(clippy::expect_used)]
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"
    ))
    .expect("valid month-day regex")
});

#[allow(clippy::expect_used)]
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})\b"
    ))
    .expect("valid day-month regex")
});

/// The reminder text following the longest matching trigger phrase.
pub fn reminder_text(command: &str) -> Option<&str> {
    let (_, rest) = TRIGGERS
        .iter()
        .find_map(|trigger| command.split_once(trigger))?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/// Split `text` into `(message, due)`.
///
/// When only the whole text parses as a time, the message is the whole text.
pub fn split_message_and_time(text: &str, now: NaiveDateTime) -> Option<(String, NaiveDateTime)> {
    for sep in [" at ", " on "] {
        if let Some((message, candidate)) = text.rsplit_once(sep)
            && let Some(due) = parse_when(candidate, now)
        {
            return Some((message.trim().to_owned(), due));
        }
    }
    if let Some((message, candidate)) = text.rsplit_once(" in ")
        && let Some(due) = parse_when(&format!("in {candidate}"), now)
    {
        return Some((message.trim().to_owned(), due));
    }
    parse_when(text, now).map(|due| (text.trim().to_owned(), due))
}

/// Parse a standalone time expression.
pub fn parse_when(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim().to_lowercase();
    let text = text.trim_end_matches(['!', '?', ',']).trim();
    if text.is_empty() {
        return None;
    }
    if let Some(offset) = parse_relative(text) {
        return now.checked_add_signed(offset);
    }

    let (day, rest) = extract_day(text, now.date());
    let rest = strip_connectives(&rest);
    let clock = if rest.is_empty() {
        None
    } else {
        Some(parse_clock(&rest)?)
    };

    match (day, clock) {
        (None, None) => None,
        (None, Some(clock)) => Some(now.date().and_time(clock.time)),
        (Some(day), None) => {
            let time = if day.tonight {
                NaiveTime::from_hms_opt(TONIGHT_HOUR, 0, 0)?
            } else {
                now.time()
            };
            Some(day.date.and_time(time))
        }
        (Some(day), Some(clock)) => {
            let mut time = clock.time;
            // "tonight at 9" means 21:00.
            if day.tonight && !clock.has_meridiem && time.hour() < 12 {
                time += Duration::hours(12);
            }
            Some(day.date.and_time(time))
        }
    }
}

fn parse_relative(text: &str) -> Option<Duration> {
    let caps = RELATIVE.captures(text)?;
    let amount: i64 = match &caps[1] {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    let unit = &caps[2];
    let offset = if unit.starts_with("sec") {
        Duration::try_seconds(amount)?
    } else if unit.starts_with("min") {
        Duration::try_minutes(amount)?
    } else if unit.starts_with('h') {
        Duration::try_hours(amount)?
    } else if unit.starts_with('d') {
        Duration::try_days(amount)?
    } else {
        Duration::try_weeks(amount)?
    };
    Some(offset)
}

struct DaySpec {
    date: NaiveDate,
    tonight: bool,
}

/// Find a day reference in `text`, returning it and the text with it removed.
fn extract_day(text: &str, today: NaiveDate) -> (Option<DaySpec>, String) {
    if let Some(m) = DAY_WORD.captures(text) {
        let (offset, tonight) = match &m[1] {
            "tomorrow" => (1, false),
            "yesterday" => (-1, false),
            "tonight" => (0, true),
            _ => (0, false),
        };
        let date = today + Duration::days(offset);
        return (Some(DaySpec { date, tonight }), remove_match(text, m.get(0)));
    }

    if let Some(m) = WEEKDAY.captures(text)
        && let Some(target) = weekday(&m[2])
    {
        let current = i64::from(today.weekday().num_days_from_monday());
        let wanted = i64::from(target.num_days_from_monday());
        let date = match m.get(1).map(|q| q.as_str()) {
            Some("last") => {
                let back = (current - wanted).rem_euclid(7);
                today - Duration::days(if back == 0 { 7 } else { back })
            }
            qualifier => {
                let ahead = (wanted - current).rem_euclid(7);
                let ahead = if ahead == 0 && qualifier == Some("next") {
                    7
                } else {
                    ahead
                };
                today + Duration::days(ahead)
            }
        };
        return (
            Some(DaySpec {
                date,
                tonight: false,
            }),
            remove_match(text, m.get(0)),
        );
    }

    let calendar = MONTH_DAY
        .captures(text)
        .and_then(|c| Some((month(&c[1])?, c[2].parse::<u32>().ok()?, c.get(0))))
        .or_else(|| {
            DAY_MONTH
                .captures(text)
                .and_then(|c| Some((month(&c[2])?, c[1].parse::<u32>().ok()?, c.get(0))))
        });
    if let Some((month, day, whole)) = calendar
        && let Some(date) = next_calendar_date(today, month, day)
    {
        return (
            Some(DaySpec {
                date,
                tonight: false,
            }),
            remove_match(text, whole),
        );
    }

    (None, text.to_owned())
}

/// `month`/`day` this year, or next year if it has already passed.
fn next_calendar_date(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

fn remove_match(text: &str, m: Option<regex::Match<'_>>) -> String {
    match m {
        Some(m) => format!("{} {}", &text[..m.start()], &text[m.end()..]),
        None => text.to_owned(),
    }
}

/// Drop glue words left around a removed day reference.
fn strip_connectives(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| !matches!(*w, "at" | "on" | "by" | "the" | "of"))
        .collect::<Vec<_>>()
        .join(" ")
}

struct Clock {
    time: NaiveTime,
    has_meridiem: bool,
}

fn parse_clock(text: &str) -> Option<Clock> {
    match text {
        "noon" | "midday" => {
            return Some(Clock {
                time: NaiveTime::from_hms_opt(12, 0, 0)?,
                has_meridiem: true,
            });
        }
        "midnight" => {
            return Some(Clock {
                time: NaiveTime::from_hms_opt(0, 0, 0)?,
                has_meridiem: true,
            });
        }
        _ => {}
    }

    let caps = CLOCK.captures(text)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let meridiem = caps.get(3).map(|m| m.as_str().starts_with('p'));

    if let Some(pm) = meridiem {
        if !(1..=12).contains(&hour) {
            return None;
        }
        hour %= 12;
        if pm {
            hour += 12;
        }
    }
    Some(Clock {
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        has_meridiem: meridiem.is_some(),
    })
}

fn weekday(name: &str) -> Option<Weekday> {
    name.parse().ok()
}

fn month(name: &str) -> Option<u32> {
    let index = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|prefix| name.starts_with(prefix))?;
    u32::try_from(index + 1).ok()
}
