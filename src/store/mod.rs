//! Persistence collaborators. The engine only sees [`BookingStore`]; durable
//! storage lives behind it.

mod memory;
mod wal;

pub use memory::InMemoryStore;
pub use wal::{Wal, WalStore};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use thiserror::Error;

use crate::model::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("booking not found: {0}")]
    NotFound(BookingId),
    #[error("duplicate booking id: {0}")]
    Duplicate(BookingId),
    #[error("store unavailable: {0}")]
    Unavailable(&'static str),
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Every decodable booking for `date`, or for all dates when `None`.
    /// Malformed records are dropped with a warning.
    async fn load_bookings(&self, date: Option<NaiveDate>) -> Result<Vec<Booking>, StoreError>;

    /// Persist a new booking. Succeeds at most once per identifier.
    async fn append_booking(&self, booking: &Booking) -> Result<BookingId, StoreError>;

    /// Persist a relocated booking's new assigned range. Nothing else about
    /// the stored record changes.
    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Withdraw a booking appended by a placement that could not be fully
    /// persisted.
    async fn remove_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Highest sequence number any stored row holds for `date`, including
    /// rows that fail to decode. Their identifiers stay taken. The default
    /// only sees decodable bookings; stores holding raw rows override it.
    async fn max_sequence(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let stored = self.load_bookings(Some(date)).await?;
        Ok(stored
            .iter()
            .filter_map(|b| b.id.sequence_for(date))
            .max()
            .unwrap_or(0))
    }
}

pub(crate) fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Raw records bucketed by their (unvalidated) date column.
#[derive(Default)]
pub struct RecordIndex {
    by_date: DashMap<String, Vec<BookingRecord>>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_date.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records for one date, or all of them ordered by date column.
    pub fn records(&self, date: Option<NaiveDate>) -> Vec<BookingRecord> {
        match date {
            Some(d) => self
                .by_date
                .get(&date_key(d))
                .map(|e| e.value().clone())
                .unwrap_or_default(),
            None => {
                let mut keys: Vec<String> = self.by_date.iter().map(|e| e.key().clone()).collect();
                keys.sort();
                keys.iter()
                    .filter_map(|k| self.by_date.get(k).map(|e| e.value().clone()))
                    .flatten()
                    .collect()
            }
        }
    }

    pub fn contains(&self, date: &str, id: &str) -> bool {
        self.by_date
            .get(date)
            .is_some_and(|rows| rows.iter().any(|r| r.id == id))
    }

    /// Highest sequence among raw id columns for `date`, across every bucket
    /// so rows with an unreadable date column still count.
    pub fn max_sequence(&self, date: NaiveDate) -> u32 {
        self.by_date
            .iter()
            .filter_map(|e| {
                e.value()
                    .iter()
                    .filter_map(|r| BookingId::sequence_in(&r.id, date))
                    .max()
            })
            .max()
            .unwrap_or(0)
    }

    pub fn insert(&self, record: BookingRecord) {
        self.by_date.entry(record.date.clone()).or_default().push(record);
    }

    /// Overwrite the assigned range of one record. Returns false if absent.
    pub fn set_range(&self, date: &str, id: &str, start: &str, end: &str) -> bool {
        let Some(mut rows) = self.by_date.get_mut(date) else {
            return false;
        };
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.start = start.to_string();
                row.end = end.to_string();
                true
            }
            None => false,
        }
    }

    /// Drop one record. Returns false if absent.
    pub fn remove(&self, date: &str, id: &str) -> bool {
        let Some(mut rows) = self.by_date.get_mut(date) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        rows.len() < before
    }

    pub fn apply(&self, event: &BookingEvent) {
        match event {
            BookingEvent::Appended(record) => self.insert(record.clone()),
            BookingEvent::Removed { id, date } => {
                if !self.remove(date, id) {
                    tracing::warn!(record = %id, "removal of unknown booking record ignored");
                }
            }
            BookingEvent::Updated { id, date, start, end } => {
                if !self.set_range(date, id, start, end) {
                    tracing::warn!(record = %id, "update for unknown booking record ignored");
                }
            }
        }
    }

    /// One `Appended` per live record: the minimal log recreating this index.
    pub fn snapshot(&self) -> Vec<BookingEvent> {
        self.records(None)
            .into_iter()
            .map(BookingEvent::Appended)
            .collect()
    }
}

/// The `Updated` event for a relocated booking.
pub(crate) fn range_update(booking: &Booking) -> BookingEvent {
    let record = BookingRecord::from(booking);
    BookingEvent::Updated {
        id: record.id,
        date: record.date,
        start: record.start,
        end: record.end,
    }
}

pub(crate) fn removal(booking: &Booking) -> BookingEvent {
    BookingEvent::Removed {
        id: booking.id.to_string(),
        date: date_key(booking.date),
    }
}
