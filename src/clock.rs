// src/clock.rs

use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::models::PaymentType;

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant. Used by tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Day-granular date arithmetic in the business time zone.
///
/// Every expiry and renewal comparison in the engine goes through here, so "today" and
/// "midnight" always mean the same thing regardless of where the process runs.
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
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn from_utc_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, d: DateTime<Utc>) -> NaiveDate {
        d.with_timezone(&self.offset).date_naive()
    }

    /// Truncates to local midnight.
    pub fn start_of_day(&self, d: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.local_date(d).and_time(NaiveTime::MIN);
        // A fixed offset has no DST gaps, so the local midnight always maps to one instant.
        match self.offset.from_local_datetime(&midnight).single() {
            Some(local) => local.with_timezone(&Utc),
            None => d,
        }
    }

    /// Whole local days from `a` to `b`; negative when `b` is earlier.
    pub fn days_between(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
        (self.local_date(b) - self.local_date(a)).num_days()
    }

    /// Adds one period of `bucket` using calendar months, so month lengths and leap years
    /// are respected. Day-of-month overflow clamps to the last day of the target month.
    /// Returns `None` for `custom`, which has no intrinsic length.
    pub fn add_duration(&self, date: DateTime<Utc>, bucket: PaymentType) -> Option<DateTime<Utc>> {
        let months = bucket.months()?;
        date.with_timezone(&self.offset)
            .checked_add_months(Months::new(months))
            .map(|d| d.with_timezone(&Utc))
    }

    /// Descriptive bucket for an extension from `old_end` to `new_end`, using fixed day
    /// thresholds. Not a calendar-exact reconstruction of the period.
    pub fn classify_renewal_bucket(
        &self,
        old_end: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> PaymentType {
        let days = self.days_between(old_end, new_end);
        if days >= 365 {
            PaymentType::OneYear
        } else if days >= 180 {
            PaymentType::SixMonths
        } else if days >= 28 {
            PaymentType::OneMonth
        } else {
            PaymentType::Custom
        }
    }
}
