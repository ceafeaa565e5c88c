//! A fixed-rule timezone for exercising DST transitions without depending on
//! the host's zone database.

use chrono::{
    DateTime, FixedOffset, MappedLocalTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};

/// EEST (+03:00) until 2024-10-27 01:00 UTC, EET (+02:00) from then on.
/// Local 03:00-03:59 on 2024-10-27 happens twice.
#[derive(Debug, Clone, Copy)]
pub struct FallBackZone;

const SUMMER: i32 = 3 * 3600;
const WINTER: i32 = 2 * 3600;

fn switch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 10, 27)
        .and_then(|d| d.and_hms_opt(1, 0, 0))
        .expect("valid switch instant")
}

fn offset(secs: i32) -> FixedOffset {
    FixedOffset::east_opt(secs).expect("valid offset")
}

impl FallBackZone {
    pub fn at_utc(&self, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Self> {
        let utc = NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|d| d.and_hms_opt(h, mi, s))
            .expect("valid utc time");
        self.from_utc_datetime(&utc)
    }

    /// Whether `at`'s wall time is one the fall-back repeats.
    pub fn is_repeated(&self, at: &DateTime<Self>) -> bool {
        matches!(
            self.offset_from_local_datetime(&at.naive_local()),
            MappedLocalTime::Ambiguous(..)
        )
    }
}

impl TimeZone for FallBackZone {
    type Offset = FixedOffset;

    fn from_offset(_offset: &FixedOffset) -> Self {
        FallBackZone
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> MappedLocalTime<FixedOffset> {
        self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> MappedLocalTime<FixedOffset> {
        let as_summer = *local - chrono::TimeDelta::seconds(i64::from(SUMMER));
        let as_winter = *local - chrono::TimeDelta::seconds(i64::from(WINTER));
        match (as_summer < switch(), as_winter >= switch()) {
            (true, true) => MappedLocalTime::Ambiguous(offset(SUMMER), offset(WINTER)),
            (true, false) => MappedLocalTime::Single(offset(SUMMER)),
            (false, true) => MappedLocalTime::Single(offset(WINTER)),
            (false, false) => MappedLocalTime::None,
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
        if *utc < switch() { offset(SUMMER) } else { offset(WINTER) }
    }
}
