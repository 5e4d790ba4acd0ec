use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::notify::ScheduleEvent;
use crate::observability;

use super::{Engine, EngineError, Placement, allocate, validate_lead_time};

/// Field checks run before a request reaches the allocator.
pub fn validate_request(request: &BookingRequest) -> Result<(), EngineError> {
    let name = request.requester.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidRequest("requester name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("requester name too long"));
    }

    let email = request.requester.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::InvalidRequest("requester email is invalid"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("requester email too long"));
    }

    let purpose = request.purpose.trim();
    if purpose.is_empty() {
        return Err(EngineError::InvalidRequest("meeting purpose is required"));
    }
    if purpose.len() > MAX_PURPOSE_LEN {
        return Err(EngineError::LimitExceeded("meeting purpose too long"));
    }

    if request.preferred.is_empty() {
        return Err(EngineError::InvalidRequest("preferred range must end after it starts"));
    }
    if !TimeRange::business_day().contains_range(&request.preferred) {
        return Err(EngineError::InvalidRequest("preferred range must lie within 08:00-17:00"));
    }

    if request.attendees == 0 {
        return Err(EngineError::InvalidRequest("at least one attendee is required"));
    }
    if request.attendees > MAX_ATTENDEES {
        return Err(EngineError::LimitExceeded("more attendees than the room holds"));
    }
    if request.attendees < request.tier.min_attendees() {
        return Err(EngineError::InvalidRequest("general meetings require at least 4 attendees"));
    }
    Ok(())
}

/// Turn a validated request into an unplaced booking carrying `id`.
fn stamp(request: BookingRequest, id: BookingId, now: NaiveDateTime) -> Booking {
    Booking {
        id,
        requester: Requester {
            name: request.requester.name.trim().to_string(),
            email: request.requester.email.trim().to_string(),
        },
        date: request.date,
        preferred: request.preferred,
        assigned: None,
        tier: request.tier,
        attendees: request.attendees,
        purpose: request.purpose.trim().to_string(),
        submitted_at: now,
    }
}

impl Engine {
    /// Place a request, displacing same-day lower-priority bookings if
    /// needed. Succeeds only once the store has confirmed every write.
    pub async fn submit(&self, request: BookingRequest) -> Result<Placement, EngineError> {
        validate_request(&request)?;
        let started = std::time::Instant::now();
        let now = self.clock.now();
        let date = request.date;

        // Notice is decided by the clock alone; the store is not consulted.
        if let Err(rejection) = validate_lead_time(date, request.tier, now) {
            observability::record_rejection(&rejection);
            info!(%date, reason = rejection.reason(), "booking rejected: {rejection}");
            return Err(rejection.into());
        }

        let mut day = self.lock_day(date).await?;
        let id = day.sequence.peek()?;
        let candidate = stamp(request, id, now);

        let placement = match allocate(candidate, &day.bookings, now) {
            Ok(p) => p,
            Err(rejection) => {
                observability::record_rejection(&rejection);
                info!(%date, reason = rejection.reason(), "booking rejected: {rejection}");
                return Err(rejection.into());
            }
        };

        if let Err(e) = self.persist(&placement).await {
            day.invalidate();
            metrics::counter!(observability::PERSISTENCE_FAILURES_TOTAL).increment(1);
            warn!(%date, id = %placement.booking.id, "placement discarded, store write failed: {e}");
            return Err(e);
        }
        day.commit(&placement);
        drop(day);

        metrics::counter!(observability::PLACEMENTS_TOTAL).increment(1);
        metrics::counter!(observability::RELOCATIONS_TOTAL).increment(placement.relocated.len() as u64);
        metrics::histogram!(observability::ALLOCATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        for moved in &placement.relocated {
            info!(
                %date,
                id = %moved.booking.id,
                from = %moved.previous,
                to = ?moved.booking.assigned,
                "booking relocated"
            );
            self.notify.send(
                date,
                ScheduleEvent::Relocated {
                    booking: moved.booking.clone(),
                    previous: moved.previous,
                },
            );
        }
        info!(%date, id = %placement.booking.id, slot = %placement.assigned, tier = placement.booking.tier.level(), "booking placed");
        self.notify.send(
            date,
            ScheduleEvent::Placed {
                booking: placement.booking.clone(),
            },
        );

        Ok(placement)
    }

    /// New booking first, then each relocation. If a relocation fails, the
    /// writes already accepted are undone so the store never holds the new
    /// booking on top of a booking that was not moved.
    async fn persist(&self, placement: &Placement) -> Result<(), EngineError> {
        self.store.append_booking(&placement.booking).await?;
        for (done, moved) in placement.relocated.iter().enumerate() {
            if let Err(e) = self.store.update_booking(&moved.booking).await {
                self.roll_back(placement, done).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Restore the first `done` relocations to their previous ranges, newest
    /// first, then withdraw the appended booking.
    async fn roll_back(&self, placement: &Placement, done: usize) {
        let date = placement.booking.date;
        for moved in placement.relocated[..done].iter().rev() {
            let restored = moved.booking.clone().with_assigned(moved.previous);
            if let Err(e) = self.store.update_booking(&restored).await {
                error!(%date, id = %restored.id, "rollback could not restore booking: {e}");
            }
        }
        if let Err(e) = self.store.remove_booking(&placement.booking).await {
            error!(%date, id = %placement.booking.id, "rollback could not withdraw booking: {e}");
        }
    }
}
