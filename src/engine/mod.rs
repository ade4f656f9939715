mod calendar;
mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use calendar::Viewer;
pub use error::EngineError;
pub use lifecycle::Verdict;
pub use queries::ReservationFilter;
pub use store::ScheduleState;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::audit::AuditSink;
use crate::limits::LOCK_WAIT;
use crate::model::*;
use crate::notify::ChangeFeed;
use crate::wal::Wal;

pub type SharedSchedule = Arc<RwLock<ScheduleState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the batch first, then the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── The engine ───────────────────────────────────────────

/// Validates input, serializes check-then-write per resource type, persists
/// through the WAL, drives lifecycle transitions, and tells the audit sink
/// and the change feed about every applied write.
pub struct Engine {
    shards: DashMap<ResourceType, SharedSchedule>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<ChangeFeed>,
    pub(super) audit: Arc<dyn AuditSink>,
    /// Reverse lookup: reservation id → resource type shard.
    pub(super) index: DashMap<Ulid, ResourceType>,
}

/// The reservation a WAL event applies to.
fn event_reservation_id(event: &Event) -> Ulid {
    match event {
        Event::Submitted { id, .. }
        | Event::ServiceIdAssigned { id, .. }
        | Event::Approved { id, .. }
        | Event::Rejected { id, .. }
        | Event::CostFlagged { id, .. }
        | Event::CostAnswered { id, .. }
        | Event::Cancelled { id, .. }
        | Event::Completed { id, .. } => *id,
        Event::Snapshot { record } => record.id,
    }
}

/// Keep the active-reservations gauge in step with the event stream.
fn track_active(event: &Event) {
    let gauge = metrics::gauge!(crate::observability::ACTIVE_RESERVATIONS);
    match event {
        Event::Submitted { .. } => gauge.increment(1.0),
        Event::Rejected { .. } | Event::Cancelled { .. } | Event::Completed { .. } => {
            gauge.decrement(1.0)
        }
        // A declined cost flag lands on cancelled
        Event::CostAnswered { accepted: false, .. } => gauge.decrement(1.0),
        _ => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<ChangeFeed>,
        audit: Arc<dyn AuditSink>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            shards: DashMap::new(),
            wal_tx,
            notify,
            audit,
            index: DashMap::new(),
        };
        for rt in ResourceType::ALL {
            engine
                .shards
                .insert(rt, Arc::new(RwLock::new(ScheduleState::new(rt))));
        }

        // Replay: we're the sole owner of the shard Arcs here, so try_write
        // always succeeds instantly. Never use blocking_write, this may run
        // inside an async context.
        for event in &events {
            let rt = match event {
                Event::Submitted { details, .. } => details.resource_type(),
                Event::Snapshot { record } => record.resource_type,
                other => {
                    let id = event_reservation_id(other);
                    match engine.index.get(&id) {
                        Some(entry) => *entry.value(),
                        None => {
                            tracing::warn!("replay: event for unknown reservation {id}, skipped");
                            continue;
                        }
                    }
                }
            };
            let shard = engine.shard(rt);
            let mut guard = shard.try_write().expect("replay: uncontended write");
            guard.apply(event);
            engine.register(event);
        }

        let mut active = 0usize;
        for rt in ResourceType::ALL {
            let shard = engine.shard(rt);
            let guard = shard.try_read().expect("replay: uncontended read");
            active += guard.records.iter().filter(|r| r.status.is_active()).count();
        }
        metrics::gauge!(crate::observability::ACTIVE_RESERVATIONS).set(active as f64);
        if !events.is_empty() {
            tracing::info!("replayed {} events from {}", events.len(), wal_path.display());
        }

        Ok(engine)
    }

    fn shard(&self, resource_type: ResourceType) -> SharedSchedule {
        self.shards
            .get(&resource_type)
            .map(|e| e.value().clone())
            .expect("shard initialized at startup")
    }

    /// Bounded write-lock acquisition. A caller that cannot get the schedule
    /// within LOCK_WAIT gets a retryable Busy instead of queueing forever.
    pub(super) async fn write_shard(
        &self,
        resource_type: ResourceType,
    ) -> Result<OwnedRwLockWriteGuard<ScheduleState>, EngineError> {
        let shard = self.shard(resource_type);
        match tokio::time::timeout(LOCK_WAIT, shard.write_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                metrics::counter!(crate::observability::BUSY_TOTAL).increment(1);
                Err(EngineError::Busy("schedule write lock"))
            }
        }
    }

    pub(super) async fn read_shard(
        &self,
        resource_type: ResourceType,
    ) -> Result<OwnedRwLockReadGuard<ScheduleState>, EngineError> {
        let shard = self.shard(resource_type);
        match tokio::time::timeout(LOCK_WAIT, shard.read_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                metrics::counter!(crate::observability::BUSY_TOTAL).increment(1);
                Err(EngineError::Busy("schedule read lock"))
            }
        }
    }

    pub(super) fn resource_type_of(&self, id: &Ulid) -> Result<ResourceType, EngineError> {
        self.index
            .get(id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(*id))
    }

    /// Resolve a reservation id to its shard and take the write lock.
    pub(super) async fn resolve_write(
        &self,
        id: &Ulid,
    ) -> Result<(ResourceType, OwnedRwLockWriteGuard<ScheduleState>), EngineError> {
        let rt = self.resource_type_of(id)?;
        let guard = self.write_shard(rt).await?;
        Ok((rt, guard))
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    fn register(&self, event: &Event) {
        match event {
            Event::Submitted { id, details, .. } => {
                self.index.insert(*id, details.resource_type());
            }
            Event::Snapshot { record } => {
                self.index.insert(record.id, record.resource_type);
            }
            _ => {}
        }
    }

    /// WAL-append + apply + publish in one call. Nothing mutates in-memory
    /// state before the event is durable.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut ScheduleState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        state.apply(event);
        self.register(event);
        track_active(event);
        self.notify.publish(state.resource_type, event);
        Ok(())
    }
}
