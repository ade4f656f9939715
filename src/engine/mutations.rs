use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, now_civil, validate_window};
use super::lifecycle::{cancel_event, complete_event, decide_event, respond_event};
use super::{Engine, EngineError, Verdict, WalCommand};

fn record_op(op: &'static str, started: Instant) {
    metrics::counter!(crate::observability::OPS_TOTAL, "op" => op).increment(1);
    metrics::histogram!(crate::observability::OP_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}

impl Engine {
    /// File a new request. The resource type rides on the details variant,
    /// so a court submission cannot carry ambulance metadata. Lands as
    /// `pending` with the slot already held against later arrivals.
    pub async fn submit_reservation(
        &self,
        requester: Requester,
        window: TimeRange,
        details: Details,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let resource_type = details.resource_type();
        validate_window(resource_type, &window, now_civil())?;
        if requester.id.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("requester id too long"));
        }
        if requester.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("requester name too long"));
        }
        match &details {
            Details::Court { purpose, .. } => {
                if purpose.len() > MAX_TEXT_LEN {
                    return Err(EngineError::LimitExceeded("purpose too long"));
                }
            }
            Details::Ambulance { patient_name, destination, .. } => {
                if patient_name.len() > MAX_NAME_LEN {
                    return Err(EngineError::LimitExceeded("patient name too long"));
                }
                if destination.len() > MAX_TEXT_LEN {
                    return Err(EngineError::LimitExceeded("destination too long"));
                }
            }
        }

        let mut guard = self.write_shard(resource_type).await?;
        if guard.on_date(window.date).count() >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations that day"));
        }
        check_no_conflict(&guard, &window, None)?;

        let id = Ulid::new();
        let event = Event::Submitted {
            id,
            requester: requester.clone(),
            window,
            details,
            at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("submitted record is in its shard");
        drop(guard);

        self.audit
            .record(
                &requester.id,
                "submit_reservation",
                id,
                json!({
                    "resource_type": resource_type.as_str(),
                    "date": window.date,
                    "start": window.start,
                    "duration_hours": window.duration_hours,
                }),
            )
            .await;
        record_op("submit_reservation", started);
        Ok(record)
    }

    /// Staff verdict on a pending request: approve, reject (comment
    /// required), or flag the diesel cost back to the requester.
    pub async fn decide(
        &self,
        id: Ulid,
        actor_id: &str,
        verdict: Verdict,
        comment: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        if let Some(ref c) = comment
            && c.len() > MAX_COMMENT_LEN {
                return Err(EngineError::LimitExceeded("decision comment too long"));
            }

        let (_, mut guard) = self.resolve_write(&id).await?;
        let record = guard.find(id).ok_or(EngineError::NotFound(id))?;

        // Compare-and-set runs before the lifecycle table: a stale caller
        // should re-fetch and retry, not learn about transition guards.
        if let Some(expected) = expected_version
            && record.version != expected {
                return Err(EngineError::StaleWrite { id, current: record.version });
            }
        let window = record.window;

        let event = decide_event(record, verdict, actor_id, comment.clone(), Utc::now())?;
        // The slot may have been granted to someone else between submission
        // and the staff decision, so approval re-checks against everyone
        // but this record.
        if verdict == Verdict::Approve {
            check_no_conflict(&guard, &window, Some(id))?;
        }
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("decided record is in its shard");
        drop(guard);

        self.audit
            .record(
                actor_id,
                verdict.as_str(),
                id,
                json!({
                    "comment": comment,
                    "status": record.status.as_str(),
                    "service_id": record.service_id,
                }),
            )
            .await;
        record_op("decide", started);
        Ok(record)
    }

    /// The requester's answer to a flagged cost: accept books the transport,
    /// decline closes the request.
    pub async fn respond_to_cost_flag(
        &self,
        id: Ulid,
        requester_id: &str,
        accept: bool,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let (_, mut guard) = self.resolve_write(&id).await?;
        let record = guard.find(id).ok_or(EngineError::NotFound(id))?;
        let event = respond_event(record, requester_id, accept, Utc::now())?;
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("answered record is in its shard");
        drop(guard);

        let action = if accept { "accept_cost" } else { "decline_cost" };
        self.audit
            .record(requester_id, action, id, json!({ "service_id": record.service_id }))
            .await;
        record_op("respond_to_cost_flag", started);
        Ok(record)
    }

    /// Requester withdraws an active request, any time strictly before the
    /// window opens. The optional reason goes to the audit trail only; the
    /// record itself stays as filed.
    pub async fn cancel(
        &self,
        id: Ulid,
        requester_id: &str,
        reason: Option<String>,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        if let Some(ref r) = reason
            && r.len() > MAX_TEXT_LEN {
                return Err(EngineError::LimitExceeded("cancel reason too long"));
            }
        let (_, mut guard) = self.resolve_write(&id).await?;
        let record = guard.find(id).ok_or(EngineError::NotFound(id))?;
        let event = cancel_event(record, requester_id, now_civil(), Utc::now())?;
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("cancelled record is in its shard");
        drop(guard);

        self.audit
            .record(
                requester_id,
                "cancel",
                id,
                json!({ "reason": reason, "service_id": record.service_id }),
            )
            .await;
        record_op("cancel", started);
        Ok(record)
    }

    /// Close out a dispatched ambulance run. The slot is freed for conflict
    /// purposes but the record keeps showing on the calendar.
    pub async fn complete(&self, id: Ulid, actor_id: &str) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let (_, mut guard) = self.resolve_write(&id).await?;
        let record = guard.find(id).ok_or(EngineError::NotFound(id))?;
        let event = complete_event(record, Utc::now())?;
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("completed record is in its shard");
        drop(guard);

        self.audit
            .record(actor_id, "complete", id, json!({ "service_id": record.service_id }))
            .await;
        record_op("complete", started);
        Ok(record)
    }

    /// Attach the tracking code minted by the external generator. Arrives
    /// asynchronously some time after submission and is write-once.
    pub async fn assign_service_id(
        &self,
        id: Ulid,
        service_id: String,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        if service_id.is_empty() || service_id.len() > MAX_SERVICE_ID_LEN {
            return Err(EngineError::LimitExceeded("service id length"));
        }
        let (_, mut guard) = self.resolve_write(&id).await?;
        let record = guard.find(id).ok_or(EngineError::NotFound(id))?;
        if record.service_id.is_some() {
            return Err(EngineError::AlreadyAssigned(id));
        }
        let event = Event::ServiceIdAssigned { id, service_id: service_id.clone(), at: Utc::now() };
        self.persist_and_apply(&mut guard, &event).await?;
        let record = guard
            .find(id)
            .cloned()
            .expect("assigned record is in its shard");
        drop(guard);

        self.audit
            .record("system", "assign_service_id", id, json!({ "service_id": service_id }))
            .await;
        record_op("assign_service_id", started);
        Ok(record)
    }

    /// Rewrite the WAL as one snapshot per record. Read guards on both
    /// schedule shards are held across the rewrite; writers hold their
    /// shard's write lock while awaiting the WAL ack, so the compacted
    /// file cannot miss an in-flight append.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut guards = Vec::with_capacity(ResourceType::ALL.len());
        for rt in ResourceType::ALL {
            guards.push(self.read_shard(rt).await?);
        }
        let mut events = Vec::new();
        for guard in &guards {
            for record in &guard.records {
                events.push(Event::Snapshot { record: record.clone() });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
