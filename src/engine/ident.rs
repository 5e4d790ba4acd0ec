use chrono::NaiveDate;

use crate::limits::MAX_SEQUENCE_PER_DAY;
use crate::model::{Booking, BookingId};

use super::EngineError;

/// Highest sequence number already used on `date`; 0 when none.
pub fn max_sequence(date: NaiveDate, bookings: &[Booking]) -> u32 {
    bookings
        .iter()
        .filter_map(|b| b.id.sequence_for(date))
        .max()
        .unwrap_or(0)
}

/// The next identifier for `date` given everything already stored for it.
pub fn next_id(date: NaiveDate, bookings: &[Booking]) -> BookingId {
    BookingId::new(date, max_sequence(date, bookings) + 1)
}

/// Per-date sequence counter. Seeded once from the stored maximum, then only
/// advanced when a placement is committed, so rejected attempts consume
/// nothing. Callers hold the date's lock while using it.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    date: NaiveDate,
    last: u32,
}

impl SequenceCounter {
    pub fn seeded(date: NaiveDate, bookings: &[Booking]) -> Self {
        Self {
            date,
            last: max_sequence(date, bookings),
        }
    }

    /// Counter whose next identifier follows `last`.
    pub fn starting_after(date: NaiveDate, last: u32) -> Self {
        Self { date, last }
    }

    pub fn peek(&self) -> Result<BookingId, EngineError> {
        if self.last >= MAX_SEQUENCE_PER_DAY {
            return Err(EngineError::LimitExceeded("identifier sequence exhausted for date"));
        }
        Ok(BookingId::new(self.date, self.last + 1))
    }

    pub fn commit(&mut self, id: &BookingId) {
        if let Some(seq) = id.sequence_for(self.date) {
            self.last = self.last.max(seq);
        }
    }

    pub fn last(&self) -> u32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests_support::placed;
    use crate::model::{PriorityTier, TimeRange};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    #[test]
    fn first_id_is_001() {
        assert_eq!(next_id(day(), &[]).as_str(), "RES-20250312-001");
    }

    #[test]
    fn next_is_max_plus_one() {
        let existing = vec![
            placed(day(), 3, PriorityTier::Team, TimeRange::slot_at(480)),
            placed(day(), 1, PriorityTier::Team, TimeRange::slot_at(570)),
        ];
        assert_eq!(next_id(day(), &existing).as_str(), "RES-20250312-004");
    }

    #[test]
    fn other_dates_do_not_count() {
        let other = day().succ_opt().unwrap();
        let existing = vec![placed(other, 9, PriorityTier::Team, TimeRange::slot_at(480))];
        assert_eq!(next_id(day(), &existing).as_str(), "RES-20250312-001");
    }

    #[test]
    fn counter_only_advances_on_commit() {
        let mut counter = SequenceCounter::seeded(day(), &[]);
        let id = counter.peek().unwrap();
        assert_eq!(counter.peek().unwrap(), id);
        counter.commit(&id);
        let next = counter.peek().unwrap();
        assert_eq!(next.as_str(), "RES-20250312-002");
        assert!(next > id);
    }

    #[test]
    fn sequential_ids_strictly_increase() {
        let mut counter = SequenceCounter::seeded(day(), &[]);
        let mut previous: Option<BookingId> = None;
        for _ in 0..50 {
            let id = counter.peek().unwrap();
            if let Some(p) = &previous {
                assert!(id.sequence_for(day()) > p.sequence_for(day()));
            }
            counter.commit(&id);
            previous = Some(id);
        }
        assert_eq!(counter.last(), 50);
    }

    #[test]
    fn counter_continues_after_raw_maximum() {
        let counter = SequenceCounter::starting_after(day(), 7);
        assert_eq!(counter.peek().unwrap().as_str(), "RES-20250312-008");
    }

    #[test]
    fn counter_exhausts() {
        let existing = vec![placed(day(), MAX_SEQUENCE_PER_DAY, PriorityTier::Team, TimeRange::slot_at(480))];
        let counter = SequenceCounter::seeded(day(), &existing);
        assert!(matches!(counter.peek(), Err(EngineError::LimitExceeded(_))));
    }
}
