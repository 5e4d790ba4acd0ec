use std::sync::Mutex;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};
use chrono_tz::Tz;

use crate::model::{DAY_END, DAY_START, Minute};

/// Source of the local wall-clock "now". Everything downstream takes the
/// returned value as a parameter; nothing else reads the system time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in a fixed IANA timezone.
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// Manually driven clock for tests and replays.
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Monday through Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `date` at `minute` past midnight.
pub fn at_minute(date: NaiveDate, minute: Minute) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + TimeDelta::minutes(i64::from(minute))
}

/// Business hours between two instants: the part of each weekday that falls
/// inside 08:00-17:00. A full weekday counts 9 hours; weekends count 0.
pub fn business_hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    if start >= end {
        return 0.0;
    }
    let mut total = TimeDelta::zero();
    let mut day = start.date();
    while day <= end.date() {
        if is_business_day(day) {
            let open = at_minute(day, DAY_START).max(start);
            let close = at_minute(day, DAY_END).min(end);
            if close > open {
                total += close - open;
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    total.num_seconds() as f64 / 3600.0
}
