use chrono::{DateTime, NaiveDateTime, Utc};

use crate::model::{Event, Reservation, ResourceType, Status};

use super::EngineError;

/// A staff verdict on a pending reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
    FlagCost,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approve => "approve",
            Verdict::Reject => "reject",
            Verdict::FlagCost => "flag_cost",
        }
    }
}

// Each transition is a pure check: given the record as it stands, either the
// event to apply or the exact table violation. No side effects on failure.

pub(crate) fn decide_event(
    record: &Reservation,
    verdict: Verdict,
    actor_id: &str,
    comment: Option<String>,
    at: DateTime<Utc>,
) -> Result<Event, EngineError> {
    if record.status != Status::Pending {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: verdict.as_str(),
        });
    }
    match verdict {
        Verdict::Approve => Ok(Event::Approved {
            id: record.id,
            decided_by: actor_id.to_string(),
            comment,
            at,
        }),
        Verdict::Reject => {
            // A rejection without an explanation violates the guard.
            let comment = match comment {
                Some(c) if !c.trim().is_empty() => c,
                _ => {
                    return Err(EngineError::InvalidTransition {
                        from: record.status,
                        action: "reject without a comment",
                    });
                }
            };
            Ok(Event::Rejected {
                id: record.id,
                decided_by: actor_id.to_string(),
                comment,
                at,
            })
        }
        Verdict::FlagCost => {
            if record.resource_type != ResourceType::Ambulance {
                return Err(EngineError::InvalidTransition {
                    from: record.status,
                    action: "flag cost on a court booking",
                });
            }
            Ok(Event::CostFlagged { id: record.id, at })
        }
    }
}

pub(crate) fn respond_event(
    record: &Reservation,
    requester_id: &str,
    accept: bool,
    at: DateTime<Utc>,
) -> Result<Event, EngineError> {
    if record.status != Status::NeedsApproval {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "answer a cost flag",
        });
    }
    if record.requested_by.id != requester_id {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "answer someone else's cost flag",
        });
    }
    Ok(Event::CostAnswered { id: record.id, accepted: accept, at })
}

pub(crate) fn cancel_event(
    record: &Reservation,
    requester_id: &str,
    now: NaiveDateTime,
    at: DateTime<Utc>,
) -> Result<Event, EngineError> {
    if !record.status.is_active() {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "cancel",
        });
    }
    // The table's row is "requester cancels"; staff close records via reject.
    if record.requested_by.id != requester_id {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "cancel someone else's reservation",
        });
    }
    if now >= record.window.start_instant() {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "cancel a window that already started",
        });
    }
    Ok(Event::Cancelled { id: record.id, at })
}

pub(crate) fn complete_event(
    record: &Reservation,
    at: DateTime<Utc>,
) -> Result<Event, EngineError> {
    if record.resource_type != ResourceType::Ambulance {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "complete a court booking",
        });
    }
    if record.status != Status::Booked {
        return Err(EngineError::InvalidTransition {
            from: record.status,
            action: "complete",
        });
    }
    Ok(Event::Completed { id: record.id, at })
}
