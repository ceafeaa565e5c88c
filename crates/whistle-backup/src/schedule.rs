use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Timelike};

use crate::error::CronError;

/// Daily at 03:00 local time.
pub const BACKUP_SCHEDULE: &str = "0 3 * * *";

/// Five years of minutes; enough for `29 2` style expressions to find a leap day.
const SEARCH_LIMIT_MINUTES: i64 = 5 * 366 * 24 * 60;

/// Five-field cron expression: `minute hour day-of-month month day-of-week`.
///
/// Each field accepts `*`, a number, a range `a-b`, a step `*/n` or `a-b/n`,
/// and comma separated lists of those. Day-of-week is 0-7 with both 0 and 7
/// meaning Sunday. When both day fields are restricted a day matches if
/// either one does, as in classic cron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    /// False when the field started with `*`.
    restricted: bool,
}

impl FieldSet {
    fn single(value: u32) -> Self {
        Self { bits: 1u64 << value, restricted: true }
    }

    fn any(min: u32, max: u32) -> Self {
        let bits = (min..=max).fold(0u64, |acc, v| acc | (1u64 << v));
        Self { bits, restricted: false }
    }

    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let raw = expr.trim();
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut days_of_week = parse_field(parts[4], 0, 7)?;
        // 7 is an alias for Sunday.
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1u64 << 7)) | 1;
        }

        Ok(Self {
            minutes: parse_field(parts[0], 0, 59)?,
            hours: parse_field(parts[1], 0, 23)?,
            days_of_month: parse_field(parts[2], 1, 31)?,
            months: parse_field(parts[3], 1, 12)?,
            days_of_week,
            raw: parts.join(" "),
        })
    }

    /// The schedule used for database backups (`0 3 * * *`).
    pub fn daily_backup() -> Self {
        Self {
            minutes: FieldSet::single(0),
            hours: FieldSet::single(3),
            days_of_month: FieldSet::any(1, 31),
            months: FieldSet::any(1, 12),
            days_of_week: FieldSet::any(0, 6),
            raw: BACKUP_SCHEDULE.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the expression fires in the minute containing `at`.
    pub fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.minutes.contains(at.minute()) && self.hours.contains(at.hour()) && self.day_matches(at)
    }

    fn day_matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        if !self.months.contains(at.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(at.day());
        let dow = self.days_of_week.contains(at.weekday().num_days_from_sunday());
        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First fire time strictly after `after`, at whole-minute precision, in
    /// `after`'s timezone.
    ///
    /// Minutes are stepped on the instant, not on local fields, so the
    /// repeated hour of a DST fall-back is walked through once per offset.
    /// A local wall time at or before `after`'s never fires again, which
    /// keeps a slot inside the repeated hour from firing twice.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let zone = after.timezone();
        let floor = after.naive_local();
        let start = after.timestamp().div_euclid(60) * 60 + 60;
        let mut candidate = DateTime::from_timestamp(start, 0)?.with_timezone(&zone);
        let mut scanned = 0i64;

        while scanned < SEARCH_LIMIT_MINUTES {
            if candidate.naive_local() <= floor {
                candidate = candidate + TimeDelta::minutes(1);
                scanned += 1;
                continue;
            }
            if !self.hours.contains(candidate.hour()) || !self.day_matches(&candidate) {
                // Nothing can fire in this hour; jump to the next one.
                let skip = 60 - i64::from(candidate.minute());
                candidate = candidate + TimeDelta::minutes(skip);
                scanned += skip;
                continue;
            }
            if self.minutes.contains(candidate.minute()) {
                return Some(candidate);
            }
            candidate = candidate + TimeDelta::minutes(1);
            scanned += 1;
        }
        None
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_field(raw: &str, min: u32, max: u32) -> Result<FieldSet, CronError> {
    let invalid = |reason: String| CronError::InvalidField {
        field: raw.to_string(),
        reason,
    };
    let number = |text: &str| -> Result<u32, CronError> {
        let value: u32 = text
            .parse()
            .map_err(|_| invalid(format!("'{text}' is not a number")))?;
        if value < min || value > max {
            return Err(invalid(format!("{value} out of range ({min}-{max})")));
        }
        Ok(value)
    };

    let mut bits = 0u64;
    for part in raw.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| invalid(format!("bad step '{step}'")))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (number(a)?, number(b)?)
        } else {
            let value = number(range)?;
            // `5/15` means "from 5 every 15".
            if step.is_some() { (value, max) } else { (value, value) }
        };
        if lo > hi {
            return Err(invalid(format!("range {lo}-{hi} is reversed")));
        }

        let step = step.unwrap_or(1);
        let mut value = lo;
        while value <= hi {
            bits |= 1u64 << value;
            value += step;
        }
    }

    Ok(FieldSet {
        bits,
        restricted: !raw.starts_with('*'),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FallBackZone;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn daily_backup_matches_its_expression() {
        assert_eq!(CronSchedule::daily_backup(), CronSchedule::parse(BACKUP_SCHEDULE).unwrap());
    }

    #[test]
    fn daily_fires_same_day_before_three() {
        let schedule = CronSchedule::daily_backup();
        let next = schedule.next_after(&at(2024, 5, 1, 2, 59, 0)).unwrap();
        assert_eq!(next, at(2024, 5, 1, 3, 0, 0));
    }

    #[test]
    fn daily_fires_next_day_at_or_after_three() {
        let schedule = CronSchedule::daily_backup();
        assert_eq!(
            schedule.next_after(&at(2024, 5, 1, 3, 0, 0)).unwrap(),
            at(2024, 5, 2, 3, 0, 0)
        );
        assert_eq!(
            schedule.next_after(&at(2024, 5, 1, 3, 0, 30)).unwrap(),
            at(2024, 5, 2, 3, 0, 0)
        );
        assert_eq!(
            schedule.next_after(&at(2024, 12, 31, 17, 12, 5)).unwrap(),
            at(2025, 1, 1, 3, 0, 0)
        );
    }

    #[test]
    fn fire_time_is_local_to_the_given_zone() {
        let berlin = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = berlin.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        let next = CronSchedule::daily_backup().next_after(&now).unwrap();
        assert_eq!(next, berlin.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc), at(2024, 5, 1, 1, 0, 0));
    }

    #[test]
    fn steps_ranges_and_lists() {
        let schedule = CronSchedule::parse("*/15 9-17 * * 1-5").unwrap();
        // Saturday 2024-05-04 -> Monday 2024-05-06 09:00.
        assert_eq!(
            schedule.next_after(&at(2024, 5, 4, 12, 0, 0)).unwrap(),
            at(2024, 5, 6, 9, 0, 0)
        );
        assert_eq!(
            schedule.next_after(&at(2024, 5, 6, 9, 0, 0)).unwrap(),
            at(2024, 5, 6, 9, 15, 0)
        );

        let list = CronSchedule::parse("5,35 * * * *").unwrap();
        assert_eq!(list.next_after(&at(2024, 5, 6, 9, 6, 0)).unwrap(), at(2024, 5, 6, 9, 35, 0));
    }

    #[test]
    fn sunday_as_seven() {
        let schedule = CronSchedule::parse("0 0 * * 7").unwrap();
        // 2024-05-05 is a Sunday.
        assert_eq!(
            schedule.next_after(&at(2024, 5, 1, 0, 0, 0)).unwrap(),
            at(2024, 5, 5, 0, 0, 0)
        );
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        // 1st of the month or any Monday.
        let schedule = CronSchedule::parse("0 12 1 * 1").unwrap();
        // Thu 2024-05-02 -> Mon 2024-05-06.
        assert_eq!(
            schedule.next_after(&at(2024, 5, 2, 0, 0, 0)).unwrap(),
            at(2024, 5, 6, 12, 0, 0)
        );
    }

    #[test]
    fn leap_day_is_found() {
        let schedule = CronSchedule::parse("0 0 29 2 *").unwrap();
        assert_eq!(
            schedule.next_after(&at(2025, 3, 1, 0, 0, 0)).unwrap(),
            at(2028, 2, 29, 0, 0, 0)
        );
    }

    #[test]
    fn impossible_date_gives_up() {
        let schedule = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert!(schedule.next_after(&at(2024, 1, 1, 0, 0, 0)).is_none());
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(CronSchedule::parse("0 3 * *"), Err(CronError::FieldCount(4)));
        assert!(CronSchedule::parse("60 3 * * *").is_err());
        assert!(CronSchedule::parse("0 24 * * *").is_err());
        assert!(CronSchedule::parse("0 3 0 * *").is_err());
        assert!(CronSchedule::parse("*/0 3 * * *").is_err());
        assert!(CronSchedule::parse("0 5-3 * * *").is_err());
        assert!(CronSchedule::parse("x 3 * * *").is_err());
    }

    #[test]
    fn display_normalizes_whitespace() {
        let schedule: CronSchedule = "  0   3 * *  * ".parse().unwrap();
        assert_eq!(schedule.to_string(), "0 3 * * *");
    }

    #[test]
    fn fall_back_night_keeps_firing() {
        let zone = FallBackZone;
        // 03:00 EEST, five seconds after the fire; the hour that follows
        // 04:00 EEST is replayed as 03:00-03:59 EET.
        let fired = zone.at_utc(2024, 10, 27, 0, 0, 5);
        assert!(zone.is_repeated(&fired));

        let next = CronSchedule::daily_backup().next_after(&fired).unwrap();
        assert_eq!(next.with_timezone(&Utc), at(2024, 10, 28, 1, 0, 0));
    }

    #[test]
    fn repeated_wall_minute_fires_once() {
        let zone = FallBackZone;
        let schedule = CronSchedule::parse("30 3 * * *").unwrap();

        let before = zone.at_utc(2024, 10, 26, 23, 0, 0);
        let first = schedule.next_after(&before).unwrap();
        assert_eq!(first.with_timezone(&Utc), at(2024, 10, 27, 0, 30, 0));

        // 03:30 EET on the same night is skipped.
        let second = schedule.next_after(&first).unwrap();
        assert_eq!(second.with_timezone(&Utc), at(2024, 10, 28, 1, 30, 0));
    }

    #[test]
    fn start_inside_the_repeated_hour() {
        let zone = FallBackZone;
        // Second pass through 03:20, now on EET.
        let after = zone.at_utc(2024, 10, 27, 1, 20, 0);
        let next = CronSchedule::parse("*/15 * * * *").unwrap().next_after(&after).unwrap();
        assert_eq!(next.with_timezone(&Utc), at(2024, 10, 27, 1, 30, 0));
    }
}
