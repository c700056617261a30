use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedCourtState = Arc<RwLock<CourtState>>;

/// In-memory state rebuilt from the WAL: the court catalog with its
/// bookings, the user directory, and the booking → court index.
pub struct Store {
    courts: DashMap<Ulid, SharedCourtState>,
    users: DashMap<Ulid, User>,
    /// Lowercased email → user id.
    emails: DashMap<String, Ulid>,
    booking_to_court: DashMap<Ulid, Ulid>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            courts: DashMap::new(),
            users: DashMap::new(),
            emails: DashMap::new(),
            booking_to_court: DashMap::new(),
        }
    }

    // ── Courts ───────────────────────────────────────────────

    pub fn court_count(&self) -> usize {
        self.courts.len()
    }

    pub fn get_court(&self, id: &Ulid) -> Option<SharedCourtState> {
        self.courts.get(id).map(|e| e.value().clone())
    }

    pub fn insert_court(&self, court: Court) {
        self.courts
            .insert(court.id, Arc::new(RwLock::new(CourtState::new(court))));
    }

    pub fn remove_court(&self, id: &Ulid) {
        self.courts.remove(id);
    }

    /// All court handles, ordered by id so callers lock in a stable order.
    pub fn court_handles(&self) -> Vec<SharedCourtState> {
        let mut handles: Vec<(Ulid, SharedCourtState)> = self
            .courts
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        handles.into_iter().map(|(_, h)| h).collect()
    }

    // ── Directory ────────────────────────────────────────────

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&email.to_ascii_lowercase())?.value();
        self.get_user(&id)
    }

    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    /// Display name for views; an unresolvable id renders as empty.
    pub fn user_name(&self, id: &Ulid) -> String {
        self.users
            .get(id)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    // ── Booking index ────────────────────────────────────────

    pub fn court_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_court.get(booking_id).map(|e| *e.value())
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_court.len()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a directory event. Caller serializes directory writes.
    pub fn apply_directory_event(&self, event: &Event) {
        match event {
            Event::UserRegistered { user } => {
                self.emails.insert(user.email.to_ascii_lowercase(), user.id);
                self.users.insert(user.id, user.clone());
            }
            Event::UserRoleChanged { id, role } => {
                if let Some(mut user) = self.users.get_mut(id) {
                    user.role = *role;
                }
            }
            _ => {}
        }
    }

    /// Apply an event scoped to one court. Caller holds the court's write lock.
    pub fn apply_to_court(&self, cs: &mut CourtState, event: &Event) {
        match event {
            Event::CourtUpdated { court } => {
                cs.court = court.clone();
            }
            Event::BookingCreated { booking } => {
                self.booking_to_court.insert(booking.id, cs.id());
                cs.insert_booking(booking.clone());
            }
            Event::BookingUpdated { booking, .. } => {
                cs.put_booking(booking.clone());
                self.booking_to_court.insert(booking.id, cs.id());
            }
            Event::BookingStatusChanged { id, status, at, .. } => {
                if let Some(b) = cs.booking_mut(*id) {
                    b.status = *status;
                    b.updated_at = *at;
                }
            }
            Event::BookingDeleted { id, .. } => {
                cs.remove_booking(*id);
                self.booking_to_court.remove(id);
            }
            Event::UserRegistered { .. }
            | Event::UserRoleChanged { .. }
            | Event::CourtCreated { .. }
            | Event::CourtDeleted { .. } => {}
        }
    }

    /// Move a booking between courts. Caller holds both write locks.
    pub fn move_booking(&self, from: &mut CourtState, to: &mut CourtState, booking: &Booking) {
        from.remove_booking(booking.id);
        to.insert_booking(booking.clone());
        self.booking_to_court.insert(booking.id, to.id());
    }

    /// Rebuild state from replayed events. We are the sole owner of every
    /// lock here, so `try_write` always succeeds; blocking variants would
    /// panic inside an async context.
    pub fn replay(&self, events: &[Event]) {
        for event in events {
            match event {
                Event::UserRegistered { .. } | Event::UserRoleChanged { .. } => {
                    self.apply_directory_event(event);
                }
                Event::CourtCreated { court } => self.insert_court(court.clone()),
                Event::CourtDeleted { id } => {
                    if let Some(cs) = self.get_court(id)
                        && let Ok(guard) = cs.try_read()
                    {
                        for b in &guard.bookings {
                            self.booking_to_court.remove(&b.id);
                        }
                    }
                    self.remove_court(id);
                }
                Event::BookingUpdated { booking, previous_court_id }
                    if *previous_court_id != booking.court_id =>
                {
                    let (Some(from), Some(to)) =
                        (self.get_court(previous_court_id), self.get_court(&booking.court_id))
                    else {
                        tracing::warn!("replay: booking {} moved to unknown court", booking.id);
                        continue;
                    };
                    let (Ok(mut from), Ok(mut to)) = (from.try_write(), to.try_write()) else {
                        continue;
                    };
                    self.move_booking(&mut from, &mut to, booking);
                }
                other => {
                    let Some(court_id) = event_court_id(other) else { continue };
                    if let Some(cs) = self.get_court(&court_id)
                        && let Ok(mut guard) = cs.try_write()
                    {
                        self.apply_to_court(&mut guard, other);
                    }
                }
            }
        }
    }

    /// Minimal event list that recreates the current state: users, then
    /// courts, then bookings with their current status.
    pub async fn snapshot(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .users()
            .into_iter()
            .map(|user| Event::UserRegistered { user })
            .collect();
        let mut bookings = Vec::new();
        for handle in self.court_handles() {
            let guard = handle.read().await;
            events.push(Event::CourtCreated { court: guard.court.clone() });
            bookings.extend(
                guard
                    .bookings
                    .iter()
                    .map(|b| Event::BookingCreated { booking: b.clone() }),
            );
        }
        events.extend(bookings);
        events
    }
}

/// Court an event applies to, for court-scoped events.
fn event_court_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::CourtUpdated { court } => Some(court.id),
        Event::BookingCreated { booking } | Event::BookingUpdated { booking, .. } => {
            Some(booking.court_id)
        }
        Event::BookingStatusChanged { court_id, .. } | Event::BookingDeleted { court_id, .. } => {
            Some(*court_id)
        }
        Event::UserRegistered { .. }
        | Event::UserRoleChanged { .. }
        | Event::CourtCreated { .. }
        | Event::CourtDeleted { .. } => None,
    }
}
