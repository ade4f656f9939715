use chrono::{Local, NaiveDateTime};
use ulid::Ulid;

use crate::model::{ResourceType, TimeRange};

use super::store::ScheduleState;
use super::EngineError;

/// Civil wall-clock time, the reference for "no retroactive bookings" and
/// the cancel deadline. Record timestamps are UTC; scheduling is local.
pub(crate) fn now_civil() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn validate_window(
    resource_type: ResourceType,
    window: &TimeRange,
    now: NaiveDateTime,
) -> Result<(), EngineError> {
    use crate::limits::MAX_WINDOW_HOURS;
    if window.duration_hours == 0 {
        return Err(EngineError::InvalidWindow("duration must be at least one hour"));
    }
    if window.duration_hours > MAX_WINDOW_HOURS {
        return Err(EngineError::LimitExceeded("window spans too many hours"));
    }
    if let Some(cap) = resource_type.max_duration_hours()
        && window.duration_hours > cap {
            return Err(EngineError::InvalidWindow("duration over the resource cap"));
        }
    if window.start_instant() < now {
        return Err(EngineError::InvalidWindow("window starts in the past"));
    }
    Ok(())
}

/// The conflict decision: scan the window's date for an active-set record
/// whose slot intersects, skipping `exclude` so a record can re-validate
/// against everyone else during approval. Terminal statuses freed the slot
/// and never count.
pub(crate) fn check_no_conflict(
    state: &ScheduleState,
    window: &TimeRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    let blocker = state
        .on_date(window.date)
        .filter(|r| exclude != Some(r.id))
        .find(|r| r.status.is_active() && r.window.overlaps(window));
    match blocker {
        Some(r) => {
            metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
            Err(EngineError::ConflictDetected(r.id))
        }
        None => Ok(()),
    }
}
