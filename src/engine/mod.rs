mod allocation;
mod error;
mod ident;
mod lead_time;
mod mutations;
mod queries;
mod slots;
#[cfg(test)]
pub(crate) mod tests_support;

pub use allocation::{Placement, Relocation, allocate};
pub use error::{EngineError, Rejection};
pub use ident::{SequenceCounter, max_sequence, next_id};
pub use lead_time::{HIGH_PRIORITY_MIN_HOURS, NORMAL_MIN_HOURS, validate_lead_time};
pub use mutations::validate_request;
pub use slots::{FreeSlots, find_free_slots, occupied_on};

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::calendar::Clock;
use crate::model::Booking;
use crate::notify::NotifyHub;
use crate::store::BookingStore;

pub type SharedDay = Arc<Mutex<DaySchedule>>;

/// One date's placed bookings and its identifier counter, loaded lazily from
/// the store. Only touched while holding the date's lock.
pub struct DaySchedule {
    date: NaiveDate,
    loaded: bool,
    /// Placed bookings, sorted by assigned start.
    bookings: Vec<Booking>,
    sequence: SequenceCounter,
}

impl DaySchedule {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            loaded: false,
            bookings: Vec::new(),
            sequence: SequenceCounter::starting_after(date, 0),
        }
    }

    /// Replace the cached state with what the store returned. `raw_max` is
    /// the highest sequence among stored ids, including rows that failed to
    /// decode.
    fn reset(&mut self, stored: Vec<Booking>, raw_max: u32) {
        // Unplaced records still hold identifiers.
        let last = raw_max.max(max_sequence(self.date, &stored));
        self.sequence = SequenceCounter::starting_after(self.date, last);
        let date = self.date;
        self.bookings = stored
            .into_iter()
            .filter(|b| b.date == date && b.is_placed())
            .collect();
        self.bookings.sort_by_key(|b| b.assigned);
        self.loaded = true;
    }

    /// Drop the cache; the next access reloads from the store.
    fn invalidate(&mut self) {
        self.loaded = false;
        self.bookings.clear();
    }

    /// Apply a persisted placement.
    fn commit(&mut self, placement: &Placement) {
        for moved in &placement.relocated {
            if let Some(slot) = self.bookings.iter_mut().find(|b| b.id == moved.booking.id) {
                *slot = moved.booking.clone();
            }
        }
        self.bookings.push(placement.booking.clone());
        self.bookings.sort_by_key(|b| b.assigned);
        self.sequence.commit(&placement.booking.id);
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }
}

/// Allocates the room. All work for one date runs under that date's lock:
/// identifier stamping, the placement decision and the store writes. Dates
/// are independent and proceed in parallel.
pub struct Engine {
    days: DashMap<NaiveDate, SharedDay>,
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            days: DashMap::new(),
            store,
            clock,
            notify: Arc::new(NotifyHub::new()),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn day(&self, date: NaiveDate) -> SharedDay {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(Mutex::new(DaySchedule::new(date))))
            .value()
            .clone()
    }

    /// Acquire the date's lock, loading it from the store on first use.
    pub(super) async fn lock_day(
        &self,
        date: NaiveDate,
    ) -> Result<OwnedMutexGuard<DaySchedule>, EngineError> {
        let mut guard = self.day(date).lock_owned().await;
        if !guard.loaded {
            let loaded = async {
                let stored = self.store.load_bookings(Some(date)).await?;
                let raw_max = self.store.max_sequence(date).await?;
                Ok::<_, crate::store::StoreError>((stored, raw_max))
            }
            .await;
            let (stored, raw_max) = loaded.inspect_err(|e| {
                metrics::counter!(crate::observability::PERSISTENCE_FAILURES_TOTAL).increment(1);
                warn!(%date, "loading bookings failed: {e}");
            })?;
            guard.reset(stored, raw_max);
        }
        Ok(guard)
    }
}
