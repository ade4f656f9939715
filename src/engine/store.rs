use chrono::{DateTime, NaiveDate, Utc};
use ulid::Ulid;

use crate::model::*;

/// One resource type's full reservation history. Records are kept sorted by
/// `(date, start minute, id)`; the window never changes after submission, so
/// the order is stable for life.
#[derive(Debug)]
pub struct ScheduleState {
    pub resource_type: ResourceType,
    pub records: Vec<Reservation>,
}

impl ScheduleState {
    pub fn new(resource_type: ResourceType) -> Self {
        Self { resource_type, records: Vec::new() }
    }

    fn sort_key(r: &Reservation) -> (NaiveDate, u32, Ulid) {
        (r.window.date, r.window.start_minute(), r.id)
    }

    /// Insert maintaining sort order.
    fn insert(&mut self, record: Reservation) {
        let key = Self::sort_key(&record);
        let pos = self
            .records
            .binary_search_by_key(&key, Self::sort_key)
            .unwrap_or_else(|e| e);
        self.records.insert(pos, record);
    }

    pub fn find(&self, id: Ulid) -> Option<&Reservation> {
        self.records.iter().find(|r| r.id == id)
    }

    fn find_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Records whose date falls in `[from, to]`, both endpoints inclusive.
    /// Binary search skips everything outside the date span.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = &Reservation> {
        let left = self.records.partition_point(|r| r.window.date < from);
        let right = self.records.partition_point(|r| r.window.date <= to);
        self.records[left..right].iter()
    }

    /// Records on a single date.
    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &Reservation> {
        self.between(date, date)
    }

    /// Apply one event. The only mutation path: every applied event bumps
    /// the record's version and refreshes `updated_at`, which is what makes
    /// the compare-and-set in `decide` sound.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Submitted { id, requester, window, details, at } => {
                self.insert(Reservation {
                    id: *id,
                    service_id: None,
                    resource_type: details.resource_type(),
                    requested_by: requester.clone(),
                    window: *window,
                    status: Status::Pending,
                    details: details.clone(),
                    decision: None,
                    resident_response: None,
                    created_at: *at,
                    updated_at: *at,
                    version: 1,
                });
            }
            Event::Snapshot { record } => {
                self.insert(record.clone());
            }
            Event::ServiceIdAssigned { id, service_id, at } => {
                self.mutate(*id, *at, |r| r.service_id = Some(service_id.clone()));
            }
            Event::Approved { id, decided_by, comment, at } => {
                self.mutate(*id, *at, |r| {
                    // Courts wait out their slot as `approved`; an ambulance
                    // approval is dispatch-ready, so it lands on `booked`.
                    r.status = match r.resource_type {
                        ResourceType::Court => Status::Approved,
                        ResourceType::Ambulance => Status::Booked,
                    };
                    r.decision = Some(Decision {
                        decided_by: decided_by.clone(),
                        comment: comment.clone(),
                        decided_at: *at,
                    });
                });
            }
            Event::Rejected { id, decided_by, comment, at } => {
                self.mutate(*id, *at, |r| {
                    r.status = Status::Rejected;
                    r.decision = Some(Decision {
                        decided_by: decided_by.clone(),
                        comment: Some(comment.clone()),
                        decided_at: *at,
                    });
                });
            }
            Event::CostFlagged { id, at } => {
                self.mutate(*id, *at, |r| r.status = Status::NeedsApproval);
            }
            Event::CostAnswered { id, accepted, at } => {
                self.mutate(*id, *at, |r| {
                    r.status = if *accepted { Status::Booked } else { Status::Cancelled };
                    r.resident_response = Some(ResidentResponse {
                        accepted: *accepted,
                        responded_at: *at,
                    });
                });
            }
            Event::Cancelled { id, at } => {
                self.mutate(*id, *at, |r| r.status = Status::Cancelled);
            }
            Event::Completed { id, at } => {
                self.mutate(*id, *at, |r| r.status = Status::Completed);
            }
        }
    }

    fn mutate(&mut self, id: Ulid, at: DateTime<Utc>, f: impl FnOnce(&mut Reservation)) {
        match self.find_mut(id) {
            Some(record) => {
                f(record);
                record.updated_at = at;
                record.version += 1;
            }
            // Only reachable replaying a log whose head was lost
            None => tracing::warn!("apply: no record {id}, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, day).unwrap()
    }

    fn submitted(id: Ulid, day: u32, hour: u32) -> Event {
        Event::Submitted {
            id,
            requester: Requester { id: "res-1".into(), name: "Maria Santos".into() },
            window: TimeRange::new(d(day), NaiveTime::from_hms_opt(hour, 0, 0).unwrap(), 1),
            details: Details::Court { purpose: "practice".into(), headcount: 8 },
            at: Utc::now(),
        }
    }

    #[test]
    fn insert_keeps_date_then_time_order() {
        let mut state = ScheduleState::new(ResourceType::Court);
        let (a, b, c) = (Ulid::new(), Ulid::new(), Ulid::new());
        state.apply(&submitted(a, 2, 9));
        state.apply(&submitted(b, 1, 18));
        state.apply(&submitted(c, 1, 8));

        let order: Vec<Ulid> = state.records.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let mut state = ScheduleState::new(ResourceType::Court);
        for day in 1..=5 {
            state.apply(&submitted(Ulid::new(), day, 10));
        }
        let hits: Vec<NaiveDate> = state.between(d(2), d(4)).map(|r| r.window.date).collect();
        assert_eq!(hits, vec![d(2), d(3), d(4)]);
        assert_eq!(state.on_date(d(3)).count(), 1);
        assert_eq!(state.between(d(6), d(9)).count(), 0);
    }

    #[test]
    fn submitted_starts_at_version_one() {
        let mut state = ScheduleState::new(ResourceType::Court);
        let id = Ulid::new();
        state.apply(&submitted(id, 1, 10));
        let r = state.find(id).unwrap();
        assert_eq!(r.status, Status::Pending);
        assert_eq!(r.version, 1);
        assert_eq!(r.created_at, r.updated_at);
        assert!(r.service_id.is_none());
        assert!(r.decision.is_none());
    }

    #[test]
    fn every_applied_event_bumps_version() {
        let mut state = ScheduleState::new(ResourceType::Court);
        let id = Ulid::new();
        state.apply(&submitted(id, 1, 10));
        state.apply(&Event::ServiceIdAssigned { id, service_id: "CR-2030-0001".into(), at: Utc::now() });
        state.apply(&Event::Approved { id, decided_by: "staff-1".into(), comment: None, at: Utc::now() });

        let r = state.find(id).unwrap();
        assert_eq!(r.version, 3);
        assert_eq!(r.service_id.as_deref(), Some("CR-2030-0001"));
        assert_eq!(r.status, Status::Approved);
        assert!(r.updated_at >= r.created_at);
    }

    #[test]
    fn approval_lands_per_resource_type() {
        let mut court = ScheduleState::new(ResourceType::Court);
        let cid = Ulid::new();
        court.apply(&submitted(cid, 1, 10));
        court.apply(&Event::Approved { id: cid, decided_by: "s".into(), comment: None, at: Utc::now() });
        assert_eq!(court.find(cid).unwrap().status, Status::Approved);

        let mut amb = ScheduleState::new(ResourceType::Ambulance);
        let aid = Ulid::new();
        amb.apply(&Event::Submitted {
            id: aid,
            requester: Requester { id: "res-2".into(), name: "Pedro Cruz".into() },
            window: TimeRange::new(d(1), NaiveTime::from_hms_opt(6, 0, 0).unwrap(), 3),
            details: Details::Ambulance {
                patient_name: "L. Cruz".into(),
                destination: "District Hospital".into(),
                diesel_cost: true,
            },
            at: Utc::now(),
        });
        amb.apply(&Event::Approved { id: aid, decided_by: "s".into(), comment: None, at: Utc::now() });
        assert_eq!(amb.find(aid).unwrap().status, Status::Booked);
    }

    #[test]
    fn cost_answer_records_response() {
        let mut state = ScheduleState::new(ResourceType::Ambulance);
        let id = Ulid::new();
        state.apply(&submitted(id, 1, 10));
        state.apply(&Event::CostFlagged { id, at: Utc::now() });
        assert_eq!(state.find(id).unwrap().status, Status::NeedsApproval);
        // Flagging is not an approve/reject, so no decision on record
        assert!(state.find(id).unwrap().decision.is_none());

        state.apply(&Event::CostAnswered { id, accepted: false, at: Utc::now() });
        let r = state.find(id).unwrap();
        assert_eq!(r.status, Status::Cancelled);
        assert_eq!(r.resident_response.map(|a| a.accepted), Some(false));
    }

    #[test]
    fn snapshot_preserves_version_and_timestamps() {
        let mut state = ScheduleState::new(ResourceType::Court);
        let id = Ulid::new();
        state.apply(&submitted(id, 1, 10));
        state.apply(&Event::Cancelled { id, at: Utc::now() });
        let original = state.find(id).unwrap().clone();

        let mut rebuilt = ScheduleState::new(ResourceType::Court);
        rebuilt.apply(&Event::Snapshot { record: original.clone() });
        assert_eq!(rebuilt.find(id), Some(&original));
    }

    #[test]
    fn event_for_unknown_record_is_dropped() {
        let mut state = ScheduleState::new(ResourceType::Court);
        state.apply(&Event::Cancelled { id: Ulid::new(), at: Utc::now() });
        assert!(state.records.is_empty());
    }
}
