use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_QUERY_WINDOW_DAYS;
use crate::model::*;

use super::calendar::project;
use super::{Engine, EngineError, Viewer};

/// Staff-side list filter. Every field is optional; absent means "any".
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub requester_id: Option<String>,
    pub status: Option<Status>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

fn validate_query_window(from: NaiveDate, to: NaiveDate) -> Result<(), EngineError> {
    if to < from {
        return Err(EngineError::InvalidWindow("date range reversed"));
    }
    if (to - from).num_days() + 1 > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

impl Engine {
    pub async fn get(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let resource_type = self.resource_type_of(&id)?;
        let guard = self.read_shard(resource_type).await?;
        guard.find(id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn list_reservations(
        &self,
        resource_type: ResourceType,
        filter: ReservationFilter,
    ) -> Result<Vec<Reservation>, EngineError> {
        if let Some((from, to)) = filter.date_range {
            validate_query_window(from, to)?;
        }
        let guard = self.read_shard(resource_type).await?;
        let matches = |r: &Reservation| {
            filter.status.is_none_or(|s| r.status == s)
                && filter
                    .requester_id
                    .as_deref()
                    .is_none_or(|q| r.requested_by.id == q)
        };
        let out = match filter.date_range {
            Some((from, to)) => guard.between(from, to).filter(|r| matches(r)).cloned().collect(),
            None => guard.records.iter().filter(|r| matches(r)).cloned().collect(),
        };
        Ok(out)
    }

    /// The month-grid feed: one pass over the date window, masked to what
    /// the viewer is entitled to see. Both date endpoints are inclusive.
    pub async fn list_calendar(
        &self,
        resource_type: ResourceType,
        date_start: NaiveDate,
        date_end: NaiveDate,
        viewer: &Viewer,
    ) -> Result<Vec<CalendarEvent>, EngineError> {
        validate_query_window(date_start, date_end)?;
        let guard = self.read_shard(resource_type).await?;
        Ok(project(guard.between(date_start, date_end), viewer).collect())
    }
}
