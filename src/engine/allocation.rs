use chrono::NaiveDateTime;
use tracing::debug;

use crate::model::*;

use super::Rejection;
use super::lead_time::validate_lead_time;
use super::slots::FreeSlots;

/// A lower-priority booking moved to make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// The booking with its new assigned range.
    pub booking: Booking,
    pub previous: TimeRange,
}

/// Outcome of a successful allocation. Nothing here is applied yet; the
/// caller persists it and commits it as a whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub booking: Booking,
    pub assigned: TimeRange,
    pub relocated: Vec<Relocation>,
}

impl Placement {
    fn direct(request: Booking, slot: TimeRange) -> Self {
        Self {
            booking: request.with_assigned(slot),
            assigned: slot,
            relocated: Vec::new(),
        }
    }
}

/// Decide where `request` goes on its date, given the current `day`.
///
/// 1. Lead time.
/// 2. First free slot on the preferred range's own half-hour grid.
/// 3. With nothing overlapping the preferred range, first full-day slot
///    touching it (see [`first_in_preferred`]).
/// 4. Otherwise split the conflicts: same-day-submitted bookings that the
///    request strictly outranks are movable, the rest are fixed. Place the
///    request against the fixed set, then move each movable booking to the
///    earliest free slot of the day. Any failed move rejects the whole thing.
pub fn allocate(
    request: Booking,
    day: &[Booking],
    now: NaiveDateTime,
) -> Result<Placement, Rejection> {
    validate_lead_time(request.date, request.tier, now)?;

    let preferred = request.preferred;
    let same_day: Vec<&Booking> = day
        .iter()
        .filter(|b| b.date == request.date && b.is_placed() && b.id != request.id)
        .collect();
    let occupied: Vec<TimeRange> = same_day.iter().filter_map(|b| b.assigned).collect();

    if let Some(slot) = FreeSlots::new(preferred, occupied.clone()).next() {
        return Ok(Placement::direct(request, slot));
    }

    let mut conflicts: Vec<&Booking> = same_day
        .iter()
        .copied()
        .filter(|b| b.assigned.is_some_and(|r| r.overlaps(&preferred)))
        .collect();

    if conflicts.is_empty() {
        debug!(id = %request.id, "preferred range free of bookings but too narrow, scanning full day");
        return first_in_preferred(occupied, preferred)
            .map(|slot| Placement::direct(request, slot))
            .ok_or(Rejection::NoAvailability);
    }

    // Stable: equal tiers keep their original order.
    conflicts.sort_by_key(|b| b.tier);
    let (movable, fixed): (Vec<&Booking>, Vec<&Booking>) = conflicts
        .into_iter()
        .partition(|c| request.tier.outranks(c.tier) && c.submitted_same_day(now));
    debug!(
        id = %request.id,
        movable = movable.len(),
        fixed = fixed.len(),
        "resolving conflicts in preferred range"
    );

    let mut obstruction: Vec<TimeRange> = same_day
        .iter()
        .filter(|b| !movable.iter().any(|m| m.id == b.id))
        .filter_map(|b| b.assigned)
        .collect();

    let slot = first_in_preferred(obstruction.clone(), preferred).ok_or(Rejection::NoAvailability)?;
    obstruction.push(slot);

    let mut relocated = Vec::with_capacity(movable.len());
    for candidate in movable {
        let Some(previous) = candidate.assigned else {
            continue;
        };
        let target = FreeSlots::new(TimeRange::business_day(), obstruction.clone())
            .next()
            .ok_or_else(|| Rejection::DisplacementFailed {
                id: candidate.id.clone(),
            })?;
        obstruction.push(target);
        if target != previous {
            relocated.push(Relocation {
                booking: candidate.clone().with_assigned(target),
                previous,
            });
        }
    }

    Ok(Placement {
        booking: request.with_assigned(slot),
        assigned: slot,
        relocated,
    })
}

/// Full-day scan intersected with `preferred`: the first free slot lying
/// inside it, else the first free slot overlapping it.
fn first_in_preferred(occupied: Vec<TimeRange>, preferred: TimeRange) -> Option<TimeRange> {
    let free: Vec<TimeRange> = FreeSlots::new(TimeRange::business_day(), occupied).collect();
    free.iter()
        .find(|s| preferred.contains_range(s))
        .or_else(|| free.iter().find(|s| s.overlaps(&preferred)))
        .copied()
}
