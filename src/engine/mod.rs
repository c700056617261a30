mod availability;
mod bookings;
mod conflict;
mod courts;
mod directory;
mod error;
pub mod policy;
mod queries;
mod store;

pub use availability::{free_slots, is_available, merge_overlapping, subtract_intervals};
pub use bookings::BookingPatch;
pub use conflict::has_conflict;
pub use courts::{CourtDraft, CourtPatch};
pub use error::{EngineError, ErrorKind};
pub use policy::{Caller, Target};
pub use store::{SharedCourtState, Store};

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
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

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task owning the WAL. Appends queued while a flush is pending
/// are batched into a single fsync; every sender in the batch gets the same
/// outcome.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_control(&mut wal, other);
                continue;
            }
        };

        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes do not leak
    // into the next batch.
    let flushed = wal.flush_sync();
    let outcome = appended.and(flushed);

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = &outcome {
        tracing::error!("wal flush failed for {} events: {e}", batch.len());
    }

    for (_, tx) in batch {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The booking engine: court catalog, user directory and booking lifecycle
/// over an event-sourced store.
///
/// Every court has its own write lock. A booking mutation holds it across
/// "check overlap → append WAL → apply", so two requests for the same slot
/// can never both pass the overlap check.
pub struct Engine {
    pub(crate) store: Store,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared; compaction holds it exclusively so the
    /// snapshot never misses an event already in the old log. Always taken
    /// before any court lock.
    commit_gate: RwLock<()>,
    /// Serializes directory writes (email uniqueness, roles) and court
    /// ownership changes. Taken after the gate and before any court lock.
    directory_lock: Mutex<()>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start the writer task. Must run inside
    /// a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Store::new();
        store.replay(&events);
        tracing::info!(
            "replayed {} events from {}: {} users, {} courts, {} bookings",
            events.len(),
            wal_path.display(),
            store.user_count(),
            store.court_count(),
            store.booking_count()
        );

        Ok(Self {
            store,
            wal_tx,
            commit_gate: RwLock::new(()),
            directory_lock: Mutex::new(()),
        })
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event: event.clone(), response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(crate) async fn begin_commit(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate.read().await
    }

    /// WAL-append then apply to the locked court.
    pub(crate) async fn persist_to_court(
        &self,
        cs: &mut CourtState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_to_court(cs, event);
        Ok(())
    }

    pub(crate) async fn persist_directory(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_directory_event(event);
        Ok(())
    }

    pub fn get_court_state(&self, id: &Ulid) -> Option<SharedCourtState> {
        self.store.get_court(id)
    }

    pub(crate) fn court_handle(&self, id: Ulid) -> Result<SharedCourtState, EngineError> {
        self.store
            .get_court(&id)
            .ok_or_else(|| EngineError::not_found("court", id))
    }

    pub(crate) fn require_user(&self, id: Ulid) -> Result<User, EngineError> {
        self.store
            .get_user(&id)
            .ok_or_else(|| EngineError::not_found("user", id))
    }

    /// Lookup booking → court, acquire the court's write lock, and confirm
    /// the booking is still there (it may have moved while we waited).
    pub(crate) async fn lock_booking_court(
        &self,
        booking_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<CourtState>, EngineError> {
        loop {
            let court_id = self
                .store
                .court_for_booking(&booking_id)
                .ok_or_else(|| EngineError::not_found("booking", booking_id))?;
            let guard = self.court_handle(court_id)?.write_owned().await;
            if guard.booking(booking_id).is_some() {
                return Ok(guard);
            }
            if self.store.court_for_booking(&booking_id) == Some(court_id) {
                return Err(EngineError::not_found("booking", booking_id));
            }
        }
    }

    /// Write-lock two distinct courts in id order.
    pub(crate) async fn lock_court_pair(
        &self,
        a: Ulid,
        b: Ulid,
    ) -> Result<(OwnedRwLockWriteGuard<CourtState>, OwnedRwLockWriteGuard<CourtState>), EngineError>
    {
        debug_assert_ne!(a, b);
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_handle = self.court_handle(first)?;
        let second_handle = self.court_handle(second)?;
        let first_guard = first_handle.write_owned().await;
        let second_guard = second_handle.write_owned().await;
        if first == a {
            Ok((first_guard, second_guard))
        } else {
            Ok((second_guard, first_guard))
        }
    }

    /// Rewrite the WAL from current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let events = self.store.snapshot().await;
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!("compacted WAL to {count} events");
        Ok(())
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
