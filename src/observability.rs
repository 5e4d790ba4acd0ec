use crate::engine::Rejection;

// ── Allocation outcomes ─────────────────────────────────────────

/// Counter: requests placed.
pub const PLACEMENTS_TOTAL: &str = "roomslot_placements_total";

/// Counter: requests rejected. Labels: reason.
pub const REJECTIONS_TOTAL: &str = "roomslot_rejections_total";

/// Counter: lower-priority bookings moved by a displacement.
pub const RELOCATIONS_TOTAL: &str = "roomslot_relocations_total";

/// Histogram: time spent deciding and persisting one request, in seconds.
pub const ALLOCATION_DURATION_SECONDS: &str = "roomslot_allocation_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Counter: stored records skipped because they failed to decode.
pub const INVALID_RECORDS_TOTAL: &str = "roomslot_invalid_records_total";

/// Counter: store reads/writes that failed.
pub const PERSISTENCE_FAILURES_TOTAL: &str = "roomslot_persistence_failures_total";

/// Histogram: booking log group-commit flush duration in seconds.
pub const STORE_FLUSH_DURATION_SECONDS: &str = "roomslot_store_flush_duration_seconds";

/// Histogram: booking log group-commit batch size (events per flush).
pub const STORE_FLUSH_BATCH_SIZE: &str = "roomslot_store_flush_batch_size";

pub fn record_rejection(rejection: &Rejection) {
    metrics::counter!(REJECTIONS_TOTAL, "reason" => rejection.reason()).increment(1);
}
