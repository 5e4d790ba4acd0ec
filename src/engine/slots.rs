use chrono::NaiveDate;

use crate::model::*;

/// Free meeting-length windows inside `window`, earliest first.
///
/// Candidate starts advance by 30 minutes from `window.start`; a candidate is
/// free iff it overlaps none of `occupied`. The iterator is finite and
/// deterministic; it is consumed once and discarded.
#[derive(Debug, Clone)]
pub struct FreeSlots {
    cursor: Minute,
    window_end: Minute,
    occupied: Vec<TimeRange>,
}

impl FreeSlots {
    pub fn new(window: TimeRange, occupied: Vec<TimeRange>) -> Self {
        Self {
            cursor: window.start,
            window_end: window.end,
            occupied,
        }
    }
}

impl Iterator for FreeSlots {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        while self.cursor + SLOT_MINUTES <= self.window_end {
            let candidate = TimeRange::slot_at(self.cursor);
            self.cursor += SLOT_STEP_MINUTES;
            if !self.occupied.iter().any(|r| r.overlaps(&candidate)) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Assigned ranges of the placed bookings on `date`.
pub fn occupied_on(date: NaiveDate, bookings: &[Booking]) -> Vec<TimeRange> {
    bookings
        .iter()
        .filter(|b| b.date == date)
        .filter_map(|b| b.assigned)
        .collect()
}

/// Scan `window` on `date` against the already-placed `existing` bookings.
pub fn find_free_slots(date: NaiveDate, window: TimeRange, existing: &[Booking]) -> FreeSlots {
    FreeSlots::new(window, occupied_on(date, existing))
}
