//! Schedule evaluation.
//!
//! Expressions follow crontab conventions: five fields (`min hour dom mon
//! dow`), optionally prefixed with seconds and suffixed with a year, or one
//! of the `@hourly`/`@daily`/... macros. Day-of-week numbers run 0-7 with
//! both 0 and 7 meaning Sunday. When both day-of-month and day-of-week are
//! restricted, a day matching either one fires, as crontab does.
//! Evaluation happens in the job's timezone (UTC, a fixed offset or an IANA
//! zone name) and results are always UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use cronsentry_protocols::{Job, JobStatus, NextExpectPolicy};

/// Upper bound for a job's grace time (one week).
pub const MAX_GRACE_MINUTES: u32 = 10_080;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Schedule expression is empty")]
    Empty,

    #[error("Invalid schedule expression '{expr}': {reason}")]
    Invalid { expr: String, reason: String },

    #[error("Invalid timezone '{0}': expected UTC, an IANA zone or a fixed offset such as +02:00")]
    InvalidTimezone(String),

    #[error("Schedule '{0}' has no upcoming fire time")]
    NoUpcomingFire(String),

    #[error("Grace time must be between 0 and {max} minutes, got {value}")]
    InvalidGrace { value: i64, max: u32 },
}

/// Zone a schedule is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleZone {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

/// A parsed, validated schedule.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    /// One schedule, or two when day-of-month and day-of-week are both
    /// restricted; a fire of either counts.
    schedules: Vec<cron::Schedule>,
    zone: ScheduleZone,
}

impl CronSchedule {
    pub fn parse(expr: &str, timezone: Option<&str>) -> Result<Self, ScheduleError> {
        let zone = parse_timezone(timezone)?;
        let schedules = normalize(expr)?
            .iter()
            .map(|normalized| {
                cron::Schedule::from_str(normalized).map_err(|e| ScheduleError::Invalid {
                    expr: expr.trim().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            expr: expr.trim().to_string(),
            schedules,
            zone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    pub fn zone(&self) -> ScheduleZone {
        self.zone
    }

    /// First fire strictly after `reference`.
    pub fn next_fire_after(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        self.schedules
            .iter()
            .filter_map(|schedule| match self.zone {
                ScheduleZone::Utc => first_after(schedule, &reference),
                ScheduleZone::Fixed(offset) => {
                    first_after(schedule, &reference.with_timezone(&offset))
                }
                ScheduleZone::Named(tz) => first_after(schedule, &reference.with_timezone(&tz)),
            })
            .min()
            .ok_or_else(|| ScheduleError::NoUpcomingFire(self.expr.clone()))
    }
}

fn first_after<Z: TimeZone>(schedule: &cron::Schedule, reference: &DateTime<Z>) -> Option<DateTime<Utc>> {
    schedule
        .after(reference)
        .next()
        .map(|fire| fire.with_timezone(&Utc))
}

/// First fire of `expr` strictly after `reference`.
pub fn next_fire_after(
    expr: &str,
    timezone: Option<&str>,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    CronSchedule::parse(expr, timezone)?.next_fire_after(reference)
}

/// Next fire after `reference` plus the grace time.
pub fn next_expect(
    expr: &str,
    timezone: Option<&str>,
    grace_minutes: u32,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    Ok(next_fire_after(expr, timezone, reference)? + Duration::minutes(i64::from(grace_minutes)))
}

/// Whether a job expected at `next_expect` is overdue at `now`.
pub fn is_due(next_expect: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= next_expect
}

pub fn validate_grace(minutes: i64) -> Result<u32, ScheduleError> {
    u32::try_from(minutes)
        .ok()
        .filter(|m| *m <= MAX_GRACE_MINUTES)
        .ok_or(ScheduleError::InvalidGrace {
            value: minutes,
            max: MAX_GRACE_MINUTES,
        })
}

/// Accepts `None`, `UTC`, `+HH:MM` / `-HH:MM` or an IANA zone name such as
/// `Europe/Berlin`.
pub fn parse_timezone(timezone: Option<&str>) -> Result<ScheduleZone, ScheduleError> {
    let Some(raw) = timezone.map(str::trim).filter(|tz| !tz.is_empty()) else {
        return Ok(ScheduleZone::Utc);
    };
    if raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("etc/utc") || raw == "Z" {
        return Ok(ScheduleZone::Utc);
    }
    if raw.starts_with('+') || raw.starts_with('-') {
        return parse_fixed_offset(raw).map(ScheduleZone::Fixed);
    }
    Tz::from_str(raw)
        .map(ScheduleZone::Named)
        .map_err(|_| ScheduleError::InvalidTimezone(raw.to_string()))
}

fn parse_fixed_offset(raw: &str) -> Result<FixedOffset, ScheduleError> {
    let invalid = || ScheduleError::InvalidTimezone(raw.to_string());
    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };

    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Rewrite a crontab expression into the seconds-first form the `cron`
/// crate parses, with day-of-week spelled out by name.
///
/// The `cron` crate requires day-of-month and day-of-week to both match.
/// When both are restricted the expression is split in two, each with one
/// of the fields opened up, so that either day matches.
fn normalize(expr: &str) -> Result<Vec<String>, ScheduleError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ScheduleError::Empty);
    }
    if expr.starts_with('@') {
        return Ok(vec![expr.to_string()]);
    }

    let invalid = |reason: String| ScheduleError::Invalid {
        expr: expr.to_string(),
        reason,
    };

    let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
    match fields.len() {
        5 => fields.insert(0, "0".to_string()),
        6 | 7 => {}
        n => return Err(invalid(format!("expected 5, 6 or 7 fields, found {}", n))),
    }

    let either_day = !is_unrestricted(&fields[3]) && !is_unrestricted(&fields[5]);
    fields[5] = translate_day_of_week(&fields[5]).map_err(invalid)?;
    if either_day {
        let mut by_month_day = fields.clone();
        by_month_day[5] = "*".to_string();
        let mut by_week_day = fields;
        by_week_day[3] = "*".to_string();
        return Ok(vec![by_month_day.join(" "), by_week_day.join(" ")]);
    }
    Ok(vec![fields.join(" ")])
}

/// A day field starting with `*` (including steps like `*/2`) counts as
/// unrestricted for the either-day rule.
fn is_unrestricted(field: &str) -> bool {
    field.starts_with('*') || field == "?"
}

/// Expand a crontab day-of-week field (0 or 7 = Sunday) into day names.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: usize = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step '{}'", step))?;
                if step == 0 {
                    return Err("day-of-week step must be positive".to_string());
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if base == "*" {
            (0, 6)
        } else if let Some((a, b)) = base.split_once('-') {
            (parse_day(a)?, parse_day(b)?)
        } else {
            let day = parse_day(base)?;
            (day, if step.is_some() { 6 } else { day })
        };
        if start > end {
            return Err(format!("day-of-week range '{}' runs backwards", base));
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }

    if days.iter().all(|on| *on) {
        return Ok("*".to_string());
    }
    Ok(days
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .map(|(i, _)| DAY_NAMES[i])
        .collect::<Vec<_>>()
        .join(","))
}

fn parse_day(token: &str) -> Result<usize, String> {
    if let Ok(n) = token.parse::<usize>() {
        return if n <= 7 {
            Ok(n)
        } else {
            Err(format!("day-of-week {} out of range 0-7", n))
        };
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown day-of-week '{}'", token))
}

/// Reference used to recompute `next_expect` after a Missing job pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryBasis {
    /// Next fire after the ping itself.
    #[default]
    PingInstant,
    /// Next fire after the slot that was missed; may already be overdue.
    MissedFire,
}

impl RecoveryBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryBasis::PingInstant => "ping_instant",
            RecoveryBasis::MissedFire => "missed_fire",
        }
    }
}

impl fmt::Display for RecoveryBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown recovery basis: {0}")]
pub struct UnknownRecoveryBasis(pub String);

impl FromStr for RecoveryBasis {
    type Err = UnknownRecoveryBasis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping_instant" => Ok(RecoveryBasis::PingInstant),
            "missed_fire" => Ok(RecoveryBasis::MissedFire),
            other => Err(UnknownRecoveryBasis(other.to_string())),
        }
    }
}

/// Recomputes `next_expect` for pings, honouring the recovery basis.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleRecompute {
    basis: RecoveryBasis,
}

impl ScheduleRecompute {
    pub fn new(basis: RecoveryBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> RecoveryBasis {
        self.basis
    }

    /// Instant the next fire is searched from, for a ping at `now` on the
    /// job as currently stored.
    pub fn reference(&self, job: &Job, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.basis, job.status) {
            (RecoveryBasis::MissedFire, JobStatus::Missing) => job.nominal_fire(),
            _ => now,
        }
    }

    pub fn compute(&self, job: &Job, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        next_expect(
            &job.schedule,
            job.timezone.as_deref(),
            job.grace_minutes,
            self.reference(job, now),
        )
    }
}

impl NextExpectPolicy for ScheduleRecompute {
    fn next_expect(&self, job: &Job, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        self.compute(job, now).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
