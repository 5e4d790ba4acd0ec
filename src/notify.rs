use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Booking, TimeRange};

const CHANNEL_CAPACITY: usize = 256;

/// What changed on a date's schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEvent {
    Placed { booking: Booking },
    Relocated { booking: Booking, previous: TimeRange },
}

/// Broadcast hub per meeting date. Requesters whose bookings get moved
/// learn about it here.
pub struct NotifyHub {
    channels: DashMap<NaiveDate, broadcast::Sender<ScheduleEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes on `date`. Creates the channel if needed.
    pub fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<ScheduleEvent> {
        let sender = self
            .channels
            .entry(date)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, date: NaiveDate, event: ScheduleEvent) {
        if let Some(sender) = self.channels.get(&date) {
            let _ = sender.send(event);
        }
    }
}
