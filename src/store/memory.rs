use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::*;

use super::{BookingStore, RecordIndex, StoreError, date_key};

/// Volatile store. Used by tests and dry runs.
pub struct InMemoryStore {
    index: RecordIndex,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            index: RecordIndex::new(),
        }
    }

    /// Seed with raw rows, as if loaded from an existing sheet. Rows are not
    /// validated here.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = BookingRecord>,
    {
        let store = Self::new();
        for r in records {
            store.index.insert(r);
        }
        store
    }

    pub fn records(&self, date: Option<NaiveDate>) -> Vec<BookingRecord> {
        self.index.records(date)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn load_bookings(&self, date: Option<NaiveDate>) -> Result<Vec<Booking>, StoreError> {
        Ok(decode_records(self.index.records(date)))
    }

    async fn append_booking(&self, booking: &Booking) -> Result<BookingId, StoreError> {
        if self.index.contains(&date_key(booking.date), booking.id.as_str()) {
            return Err(StoreError::Duplicate(booking.id.clone()));
        }
        self.index.insert(BookingRecord::from(booking));
        Ok(booking.id.clone())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let record = BookingRecord::from(booking);
        if self
            .index
            .set_range(&record.date, &record.id, &record.start, &record.end)
        {
            Ok(())
        } else {
            Err(StoreError::NotFound(booking.id.clone()))
        }
    }

    async fn remove_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        if self.index.remove(&date_key(booking.date), booking.id.as_str()) {
            Ok(())
        } else {
            Err(StoreError::NotFound(booking.id.clone()))
        }
    }

    async fn max_sequence(&self, date: NaiveDate) -> Result<u32, StoreError> {
        Ok(self.index.max_sequence(date))
    }
}
