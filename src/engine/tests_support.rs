//! Fixtures shared by the crate's unit tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// Wednesday 2025-03-19, far enough from `now()` for every tier.
pub fn meeting() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
}

/// Monday 2025-03-10 09:00.
pub fn now() -> NaiveDateTime {
    at(2025, 3, 10, 9, 0)
}

fn booking(
    date: NaiveDate,
    seq: u32,
    tier: PriorityTier,
    preferred: TimeRange,
    submitted_at: NaiveDateTime,
) -> Booking {
    Booking {
        id: BookingId::new(date, seq),
        requester: Requester {
            name: format!("Requester {seq}"),
            email: format!("requester{seq}@example.cl"),
        },
        date,
        preferred,
        assigned: None,
        tier,
        attendees: 4,
        purpose: format!("Meeting {seq}"),
        submitted_at,
    }
}

/// Unplaced candidate stamped with sequence `seq`, submitted at `now()`.
pub fn request(date: NaiveDate, seq: u32, tier: PriorityTier, preferred: TimeRange) -> Booking {
    booking(date, seq, tier, preferred, now())
}

/// Placed booking submitted a week before `now()`.
pub fn placed(date: NaiveDate, seq: u32, tier: PriorityTier, range: TimeRange) -> Booking {
    booking(date, seq, tier, range, at(2025, 3, 3, 10, 0)).with_assigned(range)
}

/// Placed booking submitted earlier on `now()`'s day.
pub fn placed_today(date: NaiveDate, seq: u32, tier: PriorityTier, range: TimeRange) -> Booking {
    booking(date, seq, tier, range, at(2025, 3, 10, 8, 15)).with_assigned(range)
}

/// A valid caller-side request.
pub fn booking_request(date: NaiveDate, tier: PriorityTier, preferred: TimeRange) -> BookingRequest {
    BookingRequest {
        requester: Requester {
            name: "Ana Rojas".to_string(),
            email: "ana.rojas@example.cl".to_string(),
        },
        date,
        preferred,
        tier,
        attendees: 5,
        purpose: "Weekly coordination".to_string(),
    }
}
