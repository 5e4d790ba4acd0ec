use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes since midnight.
pub type Minute = u32;

/// Every meeting lasts exactly this long.
pub const SLOT_MINUTES: Minute = 90;
/// Candidate start times advance in steps of this size.
pub const SLOT_STEP_MINUTES: Minute = 30;
/// 08:00
pub const DAY_START: Minute = 8 * 60;
/// 17:00
pub const DAY_END: Minute = 17 * 60;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Half-open time-of-day window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minute,
    pub end: Minute,
}

impl TimeRange {
    pub const fn new(start: Minute, end: Minute) -> Self {
        Self { start, end }
    }

    /// The full bookable window, 08:00-17:00.
    pub const fn business_day() -> Self {
        Self::new(DAY_START, DAY_END)
    }

    /// A meeting-length slot beginning at `start`.
    pub const fn slot_at(start: Minute) -> Self {
        Self::new(start, start + SLOT_MINUTES)
    }

    pub fn duration(&self) -> Minute {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_range(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// A valid assigned range: exactly one slot long and inside business hours.
    pub fn is_placeable(&self) -> bool {
        self.duration() == SLOT_MINUTES && Self::business_day().contains_range(self)
    }

    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self::new(parse_minute(start)?, parse_minute(end)?))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_minute(self.start), format_minute(self.end))
    }
}

/// Parse `HH:MM` into minutes since midnight. `17:00` and friends are the
/// only accepted shapes; seconds are rejected.
pub fn parse_minute(s: &str) -> Option<Minute> {
    let t = NaiveTime::parse_from_str(s.trim(), TIME_FORMAT).ok()?;
    Some(t.hour() * 60 + t.minute())
}

pub fn format_minute(m: Minute) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Meeting priority. Lower level wins conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PriorityTier {
    /// Supervision of referents.
    Supervision = 1,
    /// Meetings with the community.
    Community = 2,
    /// Team meetings.
    Team = 3,
    /// General meetings, four people or more.
    General = 4,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 4] = [
        PriorityTier::Supervision,
        PriorityTier::Community,
        PriorityTier::Team,
        PriorityTier::General,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Supervision),
            2 => Some(Self::Community),
            3 => Some(Self::Team),
            4 => Some(Self::General),
            _ => None,
        }
    }

    /// Criterion label as it appears in stored records.
    pub fn label(self) -> &'static str {
        match self {
            Self::Supervision => "1 - Supervisión de Referentes",
            Self::Community => "2 - Reuniones con la Comunidad",
            Self::Team => "3 - Reuniones de Equipos",
            Self::General => "4 - Reuniones Generales (mínimo 4 personas)",
        }
    }

    /// Tiers 1 and 2.
    pub fn is_high(self) -> bool {
        self.level() <= 2
    }

    /// Strictly more urgent than `other`.
    pub fn outranks(self, other: PriorityTier) -> bool {
        self.level() < other.level()
    }

    pub fn min_attendees(self) -> u32 {
        match self {
            Self::General => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PriorityTier {
    type Err = RecordError;

    /// Accepts `"3"` or a full criterion label; the leading digit decides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let level = chars.next().and_then(|c| c.to_digit(10));
        let rest_ok = match chars.next() {
            None => true,
            Some(c) => !c.is_ascii_digit(),
        };
        level
            .filter(|_| rest_ok)
            .and_then(|l| Self::from_level(l as u8))
            .ok_or_else(|| RecordError::InvalidTier(s.to_string()))
    }
}

/// Date-scoped human-readable identifier, `RES-YYYYMMDD-NNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(String);

impl BookingId {
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        Self(format!("{}{sequence:03}", Self::prefix(date)))
    }

    pub fn prefix(date: NaiveDate) -> String {
        format!("RES-{}-", date.format("%Y%m%d"))
    }

    /// Sequence number if this id belongs to `date`.
    pub fn sequence_for(&self, date: NaiveDate) -> Option<u32> {
        Self::sequence_in(&self.0, date)
    }

    /// Same as [`BookingId::sequence_for`] on an unvalidated id column.
    pub fn sequence_in(raw: &str, date: NaiveDate) -> Option<u32> {
        let digits = raw.trim().strip_prefix(&Self::prefix(date))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub name: String,
    pub email: String,
}

/// What a caller submits: everything except identifier, assigned range and
/// submission timestamp, which the engine stamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub requester: Requester,
    pub date: NaiveDate,
    pub preferred: TimeRange,
    pub tier: PriorityTier,
    pub attendees: u32,
    pub purpose: String,
}

/// A placed or candidate reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub requester: Requester,
    pub date: NaiveDate,
    pub preferred: TimeRange,
    /// Set only by the allocation engine.
    pub assigned: Option<TimeRange>,
    pub tier: PriorityTier,
    pub attendees: u32,
    pub purpose: String,
    pub submitted_at: NaiveDateTime,
}

impl Booking {
    pub fn is_placed(&self) -> bool {
        self.assigned.is_some()
    }

    /// Whether this booking was submitted on the same calendar day as `now`.
    pub fn submitted_same_day(&self, now: NaiveDateTime) -> bool {
        self.submitted_at.date() == now.date()
    }

    pub fn with_assigned(mut self, range: TimeRange) -> Self {
        self.assigned = Some(range);
        self
    }
}

/// Malformed stored data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("invalid time range: {0:?}-{1:?}")]
    InvalidRange(String, String),
    #[error("invalid priority criterion: {0:?}")]
    InvalidTier(String),
    #[error("invalid attendee count: {0:?}")]
    InvalidAttendees(String),
    #[error("invalid submission timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("identifier {0:?} does not belong to its date")]
    InvalidId(String),
}

/// Flat storage row, one column per field. This is the shape the persistence
/// collaborator reads and writes; nothing in it has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub date: String,
    pub range_start: String,
    pub range_end: String,
    /// Assigned start; empty until placed.
    pub start: String,
    /// Assigned end; empty until placed.
    pub end: String,
    pub criterion: String,
    pub attendees: String,
    pub purpose: String,
    pub submitted_at: String,
}

impl From<&Booking> for BookingRecord {
    fn from(b: &Booking) -> Self {
        let (start, end) = match b.assigned {
            Some(r) => (format_minute(r.start), format_minute(r.end)),
            None => (String::new(), String::new()),
        };
        Self {
            id: b.id.to_string(),
            name: b.requester.name.clone(),
            email: b.requester.email.clone(),
            date: b.date.format(DATE_FORMAT).to_string(),
            range_start: format_minute(b.preferred.start),
            range_end: format_minute(b.preferred.end),
            start,
            end,
            criterion: b.tier.label().to_string(),
            attendees: b.attendees.to_string(),
            purpose: b.purpose.clone(),
            submitted_at: b.submitted_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl TryFrom<BookingRecord> for Booking {
    type Error = RecordError;

    fn try_from(r: BookingRecord) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(r.date.trim(), DATE_FORMAT)
            .map_err(|_| RecordError::InvalidDate(r.date.clone()))?;

        let id = BookingId(r.id.trim().to_string());
        if id.sequence_for(date).is_none() {
            return Err(RecordError::InvalidId(r.id));
        }

        let preferred = TimeRange::parse(&r.range_start, &r.range_end)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RecordError::InvalidRange(r.range_start.clone(), r.range_end.clone()))?;

        let assigned = if r.start.trim().is_empty() && r.end.trim().is_empty() {
            None
        } else {
            let range = TimeRange::parse(&r.start, &r.end)
                .filter(TimeRange::is_placeable)
                .ok_or_else(|| RecordError::InvalidRange(r.start.clone(), r.end.clone()))?;
            Some(range)
        };

        let tier: PriorityTier = r.criterion.parse()?;

        let attendees: u32 = r
            .attendees
            .trim()
            .parse()
            .ok()
            .filter(|n| *n >= tier.min_attendees())
            .ok_or_else(|| RecordError::InvalidAttendees(r.attendees.clone()))?;

        let submitted_at = NaiveDateTime::parse_from_str(r.submitted_at.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| RecordError::InvalidTimestamp(r.submitted_at.clone()))?;

        Ok(Booking {
            id,
            requester: Requester {
                name: r.name,
                email: r.email,
            },
            date,
            preferred,
            assigned,
            tier,
            attendees,
            purpose: r.purpose,
            submitted_at,
        })
    }
}

/// Parse stored rows, dropping the malformed ones with a warning.
pub fn decode_records<I>(records: I) -> Vec<Booking>
where
    I: IntoIterator<Item = BookingRecord>,
{
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            match Booking::try_from(record) {
                Ok(b) => Some(b),
                Err(e) => {
                    tracing::warn!(record = %id, "skipping invalid booking record: {e}");
                    metrics::counter!(crate::observability::INVALID_RECORDS_TOTAL).increment(1);
                    None
                }
            }
        })
        .collect()
}

/// Store log entry. `Updated` carries only what a relocation may change;
/// `Removed` withdraws an append whose placement was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    Appended(BookingRecord),
    Updated {
        id: String,
        date: String,
        start: String,
        end: String,
    },
    Removed {
        id: String,
        date: String,
    },
}
