//! Open-now evaluation over weekly business hours
//!
//! A schedule has one window per weekday, Monday first. The instant being
//! tested is converted into the service time zone before the weekday and the
//! minutes since midnight are read from it. A window is half-open:
//! `startsAt <= minutes < endsAt`.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::BusinessHours;

/// True if `minutes` (since midnight) falls inside the window.
pub fn is_open(hours: &BusinessHours, minutes: i32) -> bool {
    hours.starts_at <= minutes && minutes < hours.ends_at
}

/// Evaluates schedules in a fixed time zone
#[derive(Debug, Clone, Copy)]
pub struct BusinessHoursEvaluator {
    tz: Tz,
}

impl BusinessHoursEvaluator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(Tz::UTC)
    }

    /// Weekday index of `instant` in the service zone, Monday = 0 ... Sunday = 6.
    pub fn weekday_index(&self, instant: DateTime<Utc>) -> usize {
        instant
            .with_timezone(&self.tz)
            .weekday()
            .num_days_from_monday() as usize
    }

    /// Minutes since local midnight, 0..1440.
    pub fn minutes_of_day(&self, instant: DateTime<Utc>) -> i32 {
        let local = instant.with_timezone(&self.tz);
        (local.hour() * 60 + local.minute()) as i32
    }

    /// Whether the schedule has the company open at `instant`.
    ///
    /// A schedule without an entry for the weekday counts as closed.
    pub fn is_open_at(&self, schedule: &[BusinessHours], instant: DateTime<Utc>) -> bool {
        schedule
            .get(self.weekday_index(instant))
            .is_some_and(|hours| is_open(hours, self.minutes_of_day(instant)))
    }
}

impl Default for BusinessHoursEvaluator {
    fn default() -> Self {
        Self::utc()
    }
}
