use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::model::*;
use crate::notify::ScheduleEvent;

use super::{Engine, EngineError, find_free_slots};

impl Engine {
    /// Placed bookings on `date`, earliest first.
    pub async fn bookings_on(&self, date: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        let day = self.lock_day(date).await?;
        Ok(day.bookings.clone())
    }

    /// Free meeting slots inside `window` on `date`, earliest first.
    pub async fn free_slots(
        &self,
        date: NaiveDate,
        window: TimeRange,
    ) -> Result<Vec<TimeRange>, EngineError> {
        let day = self.lock_day(date).await?;
        Ok(find_free_slots(date, window, &day.bookings).collect())
    }

    /// The identifier the next successful placement on `date` would receive.
    pub async fn next_id(&self, date: NaiveDate) -> Result<BookingId, EngineError> {
        let day = self.lock_day(date).await?;
        day.sequence.peek()
    }

    pub fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<ScheduleEvent> {
        self.notify.subscribe(date)
    }
}
