use thiserror::Error;

use crate::model::BookingId;
use crate::store::StoreError;

/// Why the engine refused to place a request. Terminal; nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("meeting date must be in the future")]
    PastDate,
    #[error(
        "high-priority bookings require at least 24 business hours of notice \
         (short by ~{shortfall_days} business day(s))"
    )]
    InsufficientLeadTimeHigh { shortfall_days: u8 },
    #[error(
        "ordinary bookings require at least 48 business hours of notice \
         (short by ~{shortfall_days} business day(s))"
    )]
    InsufficientLeadTimeNormal { shortfall_days: u8 },
    #[error("no 90-minute slot available in the preferred range")]
    NoAvailability,
    #[error("lower-priority booking {id} could not be relocated")]
    DisplacementFailed { id: BookingId },
}

impl Rejection {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::PastDate => "past_date",
            Rejection::InsufficientLeadTimeHigh { .. } => "insufficient_lead_time_high",
            Rejection::InsufficientLeadTimeNormal { .. } => "insufficient_lead_time_normal",
            Rejection::NoAvailability => "no_availability",
            Rejection::DisplacementFailed { .. } => "displacement_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
