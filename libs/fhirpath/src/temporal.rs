//! Partial date/dateTime values for comparison
//!
//! FHIR `date`, `dateTime` and `instant` values may be partial (`2024`,
//! `2024-03`). Two values are compared at the precision they share; when
//! they agree on it but one is more precise, the result is unknown.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum TemporalPrecision {
    Year,
    Month,
    Day,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Temporal {
    local: NaiveDateTime,
    /// Seconds east of UTC, when the value carries a zone
    offset: Option<i32>,
    precision: TemporalPrecision,
}

impl Temporal {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        let (date_part, rest) = match s.split_once('T') {
            Some((date, rest)) => (date, Some(rest)),
            None => (s, None),
        };

        let (date, date_precision) = parse_date(date_part)?;
        let Some(rest) = rest else {
            return Some(Self {
                local: NaiveDateTime::new(date, NaiveTime::MIN),
                offset: None,
                precision: date_precision,
            });
        };
        if date_precision != TemporalPrecision::Day {
            return None;
        }

        let (time_part, offset) = split_timezone(rest)?;
        let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M:%S"))
            .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M"))
            .ok()?;
        Some(Self {
            local: NaiveDateTime::new(date, time),
            offset,
            precision: TemporalPrecision::Time,
        })
    }

    /// Values without a zone are taken as UTC.
    fn instant(&self) -> Option<chrono::DateTime<Utc>> {
        let offset = FixedOffset::east_opt(self.offset.unwrap_or(0))?;
        offset
            .from_local_datetime(&self.local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn date_key(&self, precision: TemporalPrecision) -> (i32, u32, u32) {
        let date = self.local.date();
        match precision {
            TemporalPrecision::Year => (date.year(), 0, 0),
            TemporalPrecision::Month => (date.year(), date.month(), 0),
            _ => (date.year(), date.month(), date.day()),
        }
    }

    /// `None` when the order cannot be decided at the shared precision.
    pub(crate) fn compare(&self, other: &Self) -> Option<Ordering> {
        let shared = self.precision.min(other.precision);
        let ordering = if shared == TemporalPrecision::Time {
            self.instant()?.cmp(&other.instant()?)
        } else {
            self.date_key(shared).cmp(&other.date_key(shared))
        };
        if ordering == Ordering::Equal && self.precision != other.precision {
            return None;
        }
        Some(ordering)
    }
}

fn parse_date(s: &str) -> Option<(NaiveDate, TemporalPrecision)> {
    let all_digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    let parts: Vec<&str> = s.split('-').collect();
    if !parts.iter().all(|p| all_digits(p)) || parts[0].len() != 4 {
        return None;
    }
    let year: i32 = parts[0].parse().ok()?;
    match parts.as_slice() {
        [_] => Some((NaiveDate::from_ymd_opt(year, 1, 1)?, TemporalPrecision::Year)),
        [_, month] if month.len() == 2 => Some((
            NaiveDate::from_ymd_opt(year, month.parse().ok()?, 1)?,
            TemporalPrecision::Month,
        )),
        [_, month, day] if month.len() == 2 && day.len() == 2 => Some((
            NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?,
            TemporalPrecision::Day,
        )),
        _ => None,
    }
}

fn split_timezone(rest: &str) -> Option<(&str, Option<i32>)> {
    if let Some(time) = rest.strip_suffix('Z') {
        return Some((time, Some(0)));
    }
    let Some(pos) = rest.rfind(['+', '-']) else {
        return Some((rest, None));
    };
    let (time, tz) = rest.split_at(pos);
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = tz[1..].split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    // zones run from -12:00 to +14:00
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some((time, Some(sign * (hours * 3600 + minutes * 60))))
}
