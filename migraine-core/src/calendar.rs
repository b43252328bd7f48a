//! Local-calendar arithmetic
//!
//! Every "day" in the analytics (usage-days, attack-days, correlation windows,
//! cycle offsets) is a local calendar day with its boundary at local midnight.
//! Instead of reading process-wide time zone state, the engine carries an
//! explicit [`Calendar`] so results are reproducible for a given input.
//!
//! The calendar is a fixed UTC offset. Daylight-saving transitions inside an
//! analysed range are not modelled.

use crate::error::{Error, Result};
use crate::types::DateRange;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month identifier, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    /// Month number 1-12
    pub month: u32,
}

impl MonthKey {
    pub fn of(day: NaiveDate) -> Self {
        Self {
            year: day.year(),
            month: day.month(),
        }
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Number of months from `self` to `other`, inclusive on both ends.
    ///
    /// Returns 0 when `other` precedes `self`.
    pub fn months_through(&self, other: &MonthKey) -> u32 {
        let from = self.year as i64 * 12 + self.month as i64;
        let to = other.year as i64 * 12 + other.month as i64;
        if to < from {
            0
        } else {
            (to - from + 1) as u32
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A local calendar defined by a fixed offset from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    /// Calendar with day boundaries at UTC midnight.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar using the host's current UTC offset.
    pub fn local() -> Self {
        Self {
            offset: Local::now().offset().fix(),
        }
    }

    /// Calendar `minutes` east of UTC (e.g. 480 for UTC+8).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| Error::Config(format!("UTC offset out of range: {} minutes", minutes)))
    }

    /// Offset from UTC in minutes.
    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Local calendar day containing `ts`.
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Local hour of day (0-23) of `ts`.
    pub fn hour_of(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.offset).hour()
    }

    /// Local weekday of `ts`, 0 = Sunday.
    pub fn weekday_of(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.offset)
            .weekday()
            .num_days_from_sunday()
    }

    /// Local calendar month containing `ts`.
    pub fn month_of(&self, ts: DateTime<Utc>) -> MonthKey {
        MonthKey::of(self.day_of(ts))
    }

    /// Every calendar month touched by `range`, in order.
    pub fn months_in(&self, range: &DateRange) -> Vec<MonthKey> {
        let count = self.months_spanned(range);
        let mut months = Vec::with_capacity(count as usize);
        let mut month = self.month_of(range.start);
        for _ in 0..count {
            months.push(month);
            month = month.next();
        }
        months
    }

    /// Instant of local midnight starting `day`.
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let local_midnight = day.and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }

    /// Last representable instant of local `day`.
    pub fn end_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        self.start_of_day(day) + Duration::days(1) - Duration::nanoseconds(1)
    }

    /// Closed range covering local days `first..=last`.
    pub fn day_range(&self, first: NaiveDate, last: NaiveDate) -> DateRange {
        DateRange::new(self.start_of_day(first), self.end_of_day(last))
    }

    /// Closed range covering one local calendar month.
    ///
    /// Returns `None` for an invalid month number.
    pub fn month_range(&self, year: i32, month: u32) -> Option<DateRange> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        Some(self.day_range(first, last))
    }

    /// Number of local calendar days touched by `range`, inclusive.
    pub fn days_in(&self, range: &DateRange) -> u32 {
        if range.is_empty() {
            return 0;
        }
        let days = (self.day_of(range.end) - self.day_of(range.start)).num_days() + 1;
        days.max(0) as u32
    }

    /// Number of calendar months touched by `range`, counting partial
    /// months at either end as whole months.
    pub fn months_spanned(&self, range: &DateRange) -> u32 {
        if range.is_empty() {
            return 0;
        }
        self.month_of(range.start)
            .months_through(&self.month_of(range.end))
    }
}
