use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, now_ms, validate_span};
use super::policy::{authorize, Caller, Target};
use super::{Engine, EngineError};

/// Fields of a partial booking update. `None` means "not supplied"; the set
/// is closed, so an unknown key can only fail while parsing the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub court_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub status: Option<BookingStatus>,
}

/// Status change requested through the API. COMPLETED belongs to the
/// completion sweep.
fn next_status(id: Ulid, from: BookingStatus, to: BookingStatus) -> Result<BookingStatus, EngineError> {
    match (from, to) {
        (_, BookingStatus::Completed) => Err(EngineError::Validation(
            "status COMPLETED cannot be set through the API".into(),
        )),
        (BookingStatus::Booked, BookingStatus::Booked) => Ok(BookingStatus::Booked),
        (BookingStatus::Booked, BookingStatus::Cancelled) => Ok(BookingStatus::Cancelled),
        (BookingStatus::Cancelled, BookingStatus::Cancelled) => Err(EngineError::AlreadyCancelled(id)),
        (from, to) => Err(EngineError::InvalidTransition { from, to }),
    }
}

impl Engine {
    pub async fn create_booking(
        &self,
        caller: &Caller,
        court_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<BookingView, EngineError> {
        let span = validate_span(start, end)?;
        let requester = self.require_user(caller.user_id)?;

        let _gate = self.begin_commit().await;
        let handle = self.court_handle(court_id)?;
        let mut guard = handle.write().await;
        self.ensure_live(&guard)?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_COURT {
            return Err(EngineError::LimitExceeded("too many bookings on court"));
        }
        check_no_conflict(&guard, &span, None)?;

        let now = now_ms();
        let booking = Booking {
            id: Ulid::new(),
            court_id,
            user_id: requester.id,
            span,
            status: BookingStatus::Booked,
            created_at: now,
            updated_at: now,
        };
        self.persist_to_court(&mut guard, &Event::BookingCreated { booking: booking.clone() })
            .await?;
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!("booking {} created on court {court_id} by {}", booking.id, requester.id);
        Ok(self.booking_view(&booking, &guard.court))
    }

    /// Full replacement of court, creator (the caller), start and end.
    /// Status is left as is.
    pub async fn update_booking(
        &self,
        caller: &Caller,
        id: Ulid,
        court_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<BookingView, EngineError> {
        if self.store.court_for_booking(&id).is_none() {
            return Err(EngineError::not_found("booking", id));
        }
        let span = validate_span(start, end)?;
        let requester = self.require_user(caller.user_id)?;
        self.court_handle(court_id)?;

        let view = self
            .rewrite_booking(caller, id, Some(court_id), |existing| {
                Ok(Booking {
                    court_id,
                    user_id: requester.id,
                    span,
                    updated_at: now_ms(),
                    ..existing.clone()
                })
            })
            .await?;
        info!("booking {id} updated by {}", caller.user_id);
        Ok(view)
    }

    /// Apply only the supplied fields. Every field is validated before
    /// anything is persisted, so a failing patch leaves the booking as it was.
    pub async fn patch_booking(
        &self,
        caller: &Caller,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<BookingView, EngineError> {
        let view = self
            .rewrite_booking(caller, id, patch.court_id, |existing| {
                let mut next = existing.clone();
                if let Some(court_id) = patch.court_id {
                    next.court_id = court_id;
                }
                if let Some(user_id) = patch.user_id {
                    next.user_id = self.require_user(user_id)?.id;
                }
                if let Some(status) = patch.status {
                    next.status = next_status(id, existing.status, status)?;
                }
                next.span = validate_span(
                    patch.start.unwrap_or(existing.span.start),
                    patch.end.unwrap_or(existing.span.end),
                )?;
                next.updated_at = now_ms();
                Ok(next)
            })
            .await?;
        debug!("booking {id} patched by {}: {patch:?}", caller.user_id);
        Ok(view)
    }

    /// Shared body of update and patch: lock the booking's court (and the
    /// destination court when it moves), authorize against the booking as it
    /// is and as it will be, re-check overlap, then persist.
    async fn rewrite_booking<F>(
        &self,
        caller: &Caller,
        id: Ulid,
        destination: Option<Ulid>,
        build: F,
    ) -> Result<BookingView, EngineError>
    where
        F: Fn(&Booking) -> Result<Booking, EngineError>,
    {
        let _gate = self.begin_commit().await;
        loop {
            let current = self
                .store
                .court_for_booking(&id)
                .ok_or_else(|| EngineError::not_found("booking", id))?;
            let dest = destination.unwrap_or(current);

            if dest == current {
                let mut guard = self.lock_booking_court(id).await?;
                if guard.id() != current {
                    continue; // moved while we waited for the lock
                }
                let existing = guard
                    .booking(id)
                    .cloned()
                    .ok_or_else(|| EngineError::not_found("booking", id))?;
                authorize(caller, Target::booking(caller, &existing, &guard.court))?;
                let updated = build(&existing)?;
                authorize(caller, Target::booking(caller, &updated, &guard.court))?;
                if updated.status.is_active() && updated.span != existing.span {
                    check_no_conflict(&guard, &updated.span, Some(id))?;
                }
                let event = Event::BookingUpdated { booking: updated.clone(), previous_court_id: current };
                self.persist_to_court(&mut guard, &event).await?;
                return Ok(self.booking_view(&updated, &guard.court));
            }

            let (mut from, mut to) = self.lock_court_pair(current, dest).await?;
            let Some(existing) = from.booking(id).cloned() else {
                continue;
            };
            self.ensure_live(&to)?;
            authorize(caller, Target::booking(caller, &existing, &from.court))?;
            let updated = build(&existing)?;
            authorize(caller, Target::booking(caller, &updated, &to.court))?;
            if to.bookings.len() >= MAX_BOOKINGS_PER_COURT {
                return Err(EngineError::LimitExceeded("too many bookings on court"));
            }
            if updated.status.is_active() {
                check_no_conflict(&to, &updated.span, None)?;
            }
            let event = Event::BookingUpdated { booking: updated.clone(), previous_court_id: current };
            self.wal_append(&event).await?;
            self.store.move_booking(&mut from, &mut to, &updated);
            debug!("booking {id} moved from court {current} to {dest}");
            return Ok(self.booking_view(&updated, &to.court));
        }
    }

    pub async fn cancel_booking(&self, caller: &Caller, id: Ulid) -> Result<BookingView, EngineError> {
        let _gate = self.begin_commit().await;
        let mut guard = self.lock_booking_court(id).await?;
        let existing = guard
            .booking(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("booking", id))?;
        next_status(id, existing.status, BookingStatus::Cancelled)?;
        authorize(caller, Target::booking(caller, &existing, &guard.court))?;

        let at = now_ms();
        let event = Event::BookingStatusChanged {
            id,
            court_id: guard.id(),
            status: BookingStatus::Cancelled,
            at,
        };
        self.persist_to_court(&mut guard, &event).await?;
        info!("booking {id} cancelled by {}", caller.user_id);
        let cancelled = Booking { status: BookingStatus::Cancelled, updated_at: at, ..existing };
        Ok(self.booking_view(&cancelled, &guard.court))
    }

    /// Hard delete, gated by the same policy as cancellation.
    pub async fn delete_booking(&self, caller: &Caller, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.begin_commit().await;
        let mut guard = self.lock_booking_court(id).await?;
        let existing = guard
            .booking(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("booking", id))?;
        authorize(caller, Target::booking(caller, &existing, &guard.court))?;

        let event = Event::BookingDeleted { id, court_id: guard.id() };
        self.persist_to_court(&mut guard, &event).await?;
        info!("booking {id} deleted by {}", caller.user_id);
        Ok(())
    }

    /// System transition: mark every BOOKED booking that ended at or before
    /// `now` as COMPLETED. Returns how many bookings changed.
    pub async fn complete_elapsed(&self, now: Ms) -> Result<usize, EngineError> {
        let _gate = self.begin_commit().await;
        let mut completed = 0;
        for handle in self.store.court_handles() {
            let mut guard = handle.write().await;
            let elapsed: Vec<Ulid> = guard
                .bookings
                .iter()
                .take_while(|b| b.span.start < now)
                .filter(|b| b.status.is_active() && b.span.end <= now)
                .map(|b| b.id)
                .collect();
            for id in elapsed {
                let event = Event::BookingStatusChanged {
                    id,
                    court_id: guard.id(),
                    status: BookingStatus::Completed,
                    at: now,
                };
                self.persist_to_court(&mut guard, &event).await?;
                completed += 1;
            }
        }
        if completed > 0 {
            metrics::counter!(crate::observability::BOOKINGS_COMPLETED_TOTAL).increment(completed as u64);
            info!("marked {completed} elapsed bookings as completed");
        }
        Ok(completed)
    }
}
