use chrono::{NaiveDate, NaiveDateTime};

use crate::calendar::{at_minute, business_hours_between};
use crate::model::{DAY_START, PriorityTier};

use super::Rejection;

/// Minimum notice for tiers 1-2, in business hours.
pub const HIGH_PRIORITY_MIN_HOURS: f64 = 24.0;
/// Minimum notice for tiers 3-4, in business hours.
pub const NORMAL_MIN_HOURS: f64 = 48.0;

/// Enforce the tiered minimum-notice policy, measured from `now` to 08:00 on
/// the meeting date.
///
/// The shortfall attached to a rejection is a coarse advisory (9h and 27h
/// cut-offs), not an exact count of missing days.
pub fn validate_lead_time(
    meeting: NaiveDate,
    tier: PriorityTier,
    now: NaiveDateTime,
) -> Result<(), Rejection> {
    if meeting <= now.date() {
        return Err(Rejection::PastDate);
    }
    let hours = business_hours_between(now, at_minute(meeting, DAY_START));

    if tier.is_high() {
        if hours < HIGH_PRIORITY_MIN_HOURS {
            let shortfall_days = if hours < 9.0 { 1 } else { 2 };
            return Err(Rejection::InsufficientLeadTimeHigh { shortfall_days });
        }
    } else if hours < NORMAL_MIN_HOURS {
        let shortfall_days = if hours < 27.0 { 3 } else { 2 };
        return Err(Rejection::InsufficientLeadTimeNormal { shortfall_days });
    }
    Ok(())
}
