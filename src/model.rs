use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open slot `[start, start + duration)` on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_hours: u32,
}

impl TimeRange {
    pub fn new(date: NaiveDate, start: NaiveTime, duration_hours: u32) -> Self {
        debug_assert!(duration_hours > 0, "TimeRange duration must be positive");
        Self { date, start, duration_hours }
    }

    /// Minutes from midnight where the slot opens.
    pub fn start_minute(&self) -> u32 {
        self.start.hour() * 60 + self.start.minute()
    }

    /// Minutes from midnight where the slot closes. May pass 1440 for a
    /// window running past midnight; it still belongs to its start date.
    pub fn end_minute(&self) -> u32 {
        self.start_minute() + self.duration_hours * 60
    }

    /// Two windows overlap iff they share the date and their half-open
    /// minute ranges intersect. A slot ending 18:00 does not clash with
    /// one starting 18:00.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.date == other.date
            && self.start_minute() < other.end_minute()
            && other.start_minute() < self.end_minute()
    }

    /// Civil instant the slot opens.
    pub fn start_instant(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    /// Civil instant the slot closes.
    pub fn end_instant(&self) -> NaiveDateTime {
        self.start_instant() + chrono::Duration::minutes(self.duration_hours as i64 * 60)
    }
}

/// The two bookable assets. Closed set: adding one is a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Court,
    Ambulance,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [ResourceType::Court, ResourceType::Ambulance];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Court => "court",
            ResourceType::Ambulance => "ambulance",
        }
    }

    /// Booking-policy cap on a single window, if the type has one.
    pub fn max_duration_hours(&self) -> Option<u32> {
        match self {
            ResourceType::Court => Some(crate::limits::MAX_COURT_DURATION_HOURS),
            ResourceType::Ambulance => None,
        }
    }
}

/// Where a reservation sits in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Approved,
    Booked,
    NeedsApproval,
    Rejected,
    Cancelled,
    Completed,
}

impl Status {
    /// Active statuses hold their slot for conflict purposes.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Status::Pending | Status::Approved | Status::Booked | Status::NeedsApproval
        )
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Rejected | Status::Cancelled | Status::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Booked => "booked",
            Status::NeedsApproval => "needs_approval",
            Status::Rejected => "rejected",
            Status::Cancelled => "cancelled",
            Status::Completed => "completed",
        }
    }
}

/// Who asked. The display name is captured from the verified identity at
/// submission time, not joined live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: String,
    pub name: String,
}

/// Resource-specific intake fields. The variant fixes the resource type, so
/// a payload/type mismatch cannot be represented. Opaque to conflict and
/// lifecycle logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Details {
    Court {
        purpose: String,
        headcount: u32,
    },
    Ambulance {
        patient_name: String,
        destination: String,
        /// Set by the intake form when the household expects to shoulder
        /// diesel cost. Staff may still flag the cost either way.
        diesel_cost: bool,
    },
}

impl Details {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Details::Court { .. } => ResourceType::Court,
            Details::Ambulance { .. } => ResourceType::Ambulance,
        }
    }
}

/// Staff verdict on record: set by approve and reject, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub decided_by: String,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// The requester's answer to a cost flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentResponse {
    pub accepted: bool,
    pub responded_at: DateTime<Utc>,
}

/// One reservation record. Never physically deleted: cancellation and
/// rejection are terminal statuses, so history stays queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    /// Human-facing tracking code, assigned once by the external generator.
    pub service_id: Option<String>,
    pub resource_type: ResourceType,
    pub requested_by: Requester,
    pub window: TimeRange,
    pub status: Status,
    pub details: Details,
    pub decision: Option<Decision>,
    pub resident_response: Option<ResidentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by every applied event; compare-and-set stamp for `decide`.
    pub version: u64,
}

/// The WAL record format: one flat event enum, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Submitted {
        id: Ulid,
        requester: Requester,
        window: TimeRange,
        details: Details,
        at: DateTime<Utc>,
    },
    ServiceIdAssigned {
        id: Ulid,
        service_id: String,
        at: DateTime<Utc>,
    },
    Approved {
        id: Ulid,
        decided_by: String,
        comment: Option<String>,
        at: DateTime<Utc>,
    },
    Rejected {
        id: Ulid,
        decided_by: String,
        comment: String,
        at: DateTime<Utc>,
    },
    CostFlagged {
        id: Ulid,
        at: DateTime<Utc>,
    },
    CostAnswered {
        id: Ulid,
        accepted: bool,
        at: DateTime<Utc>,
    },
    Cancelled {
        id: Ulid,
        at: DateTime<Utc>,
    },
    Completed {
        id: Ulid,
        at: DateTime<Utc>,
    },
    /// Compaction record: one per stored reservation, state carried whole so
    /// versions and timestamps survive a rewrite.
    Snapshot {
        record: Reservation,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One renderable calendar entry, already role-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: Ulid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color_class: &'static str,
}
