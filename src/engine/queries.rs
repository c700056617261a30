use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability;
use super::conflict::{has_conflict, validate_span, validate_window};
use super::policy::{authorize, Caller, Target};
use super::{Engine, EngineError};

impl Engine {
    pub(crate) fn booking_view(&self, booking: &Booking, court: &Court) -> BookingView {
        BookingView {
            id: booking.id,
            court_id: court.id,
            court_name: court.name.clone(),
            user_id: booking.user_id,
            user_name: self.store.user_name(&booking.user_id),
            start: booking.span.start,
            end: booking.span.end,
            status: booking.status,
        }
    }

    pub(crate) fn court_view(&self, court: &Court) -> CourtView {
        CourtView {
            id: court.id,
            name: court.name.clone(),
            address: court.address.clone(),
            location: court.location,
            price_cents: court.price_cents,
            owner_id: court.owner_id,
            owner_name: self.store.user_name(&court.owner_id),
        }
    }

    /// Whether `[start, end)` overlaps an active booking on the court.
    pub async fn has_conflict(&self, court_id: Ulid, start: Ms, end: Ms) -> Result<bool, EngineError> {
        let span = validate_span(start, end)?;
        let handle = self.court_handle(court_id)?;
        let guard = handle.read().await;
        Ok(has_conflict(&guard, &span))
    }

    pub async fn get_booking(&self, caller: &Caller, id: Ulid) -> Result<BookingView, EngineError> {
        let court_id = self
            .store
            .court_for_booking(&id)
            .ok_or_else(|| EngineError::not_found("booking", id))?;
        let handle = self.court_handle(court_id)?;
        let guard = handle.read().await;
        let booking = guard
            .booking(id)
            .ok_or_else(|| EngineError::not_found("booking", id))?;
        authorize(caller, Target::booking(caller, booking, &guard.court))?;
        Ok(self.booking_view(booking, &guard.court))
    }

    /// Full listing for ADMIN; an OWNER sees the bookings on their courts.
    pub async fn list_bookings(&self, caller: &Caller) -> Result<Vec<BookingView>, EngineError> {
        authorize(caller, Target::AllBookings)?;
        let mut views = Vec::new();
        for handle in self.store.court_handles() {
            let guard = handle.read().await;
            if caller.role == Role::Owner && guard.court.owner_id != caller.user_id {
                continue;
            }
            views.extend(guard.bookings.iter().map(|b| self.booking_view(b, &guard.court)));
        }
        views.sort_by_key(|v| (v.start, v.id));
        Ok(views)
    }

    /// The caller's own bookings, most recent start first.
    pub async fn list_my_bookings(
        &self,
        caller: &Caller,
        page: usize,
        size: usize,
        status: Option<BookingStatus>,
    ) -> Result<Page<BookingView>, EngineError> {
        if size == 0 {
            return Err(EngineError::Validation("page size must be positive".into()));
        }
        if size > MAX_PAGE_SIZE {
            return Err(EngineError::LimitExceeded("page size too large"));
        }

        let mut mine = Vec::new();
        for handle in self.store.court_handles() {
            let guard = handle.read().await;
            mine.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.user_id == caller.user_id)
                    .filter(|b| status.is_none_or(|s| b.status == s))
                    .map(|b| self.booking_view(b, &guard.court)),
            );
        }
        mine.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));

        let total_items = mine.len();
        let items = mine
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();
        Ok(Page { items, page, size, total_items })
    }

    pub async fn list_courts(&self) -> Vec<CourtView> {
        let mut views = Vec::new();
        for handle in self.store.court_handles() {
            views.push(self.court_view(&handle.read().await.court));
        }
        views
    }

    pub async fn get_court(&self, id: Ulid) -> Result<CourtView, EngineError> {
        let handle = self.court_handle(id)?;
        let guard = handle.read().await;
        Ok(self.court_view(&guard.court))
    }

    /// Courts with no active booking overlapping `[start, end)`.
    pub async fn list_available_courts(&self, start: Ms, end: Ms) -> Result<Vec<CourtView>, EngineError> {
        let window = validate_window(start, end)?;
        let mut views = Vec::new();
        for handle in self.store.court_handles() {
            let guard = handle.read().await;
            if availability::is_available(&guard, &window) {
                views.push(self.court_view(&guard.court));
            }
        }
        Ok(views)
    }

    pub async fn free_slots(&self, court_id: Ulid, start: Ms, end: Ms) -> Result<Vec<Span>, EngineError> {
        let window = validate_window(start, end)?;
        let handle = self.court_handle(court_id)?;
        let guard = handle.read().await;
        Ok(availability::free_slots(&guard, &window))
    }

    pub async fn admin_stats(&self, caller: &Caller) -> Result<AdminStats, EngineError> {
        authorize(caller, Target::Administration)?;
        let total_users = self.store.user_count();
        let mut total_courts = 0;
        let mut total_bookings = 0;
        let mut revenue_cents: u64 = 0;
        for handle in self.store.court_handles() {
            let guard = handle.read().await;
            total_courts += 1;
            total_bookings += guard.bookings.len();
            let billable = guard
                .bookings
                .iter()
                .filter(|b| b.status != BookingStatus::Cancelled)
                .count() as u64;
            revenue_cents = revenue_cents.saturating_add(billable.saturating_mul(guard.court.price_cents));
        }
        let average_bookings_per_user = if total_users == 0 {
            0.0
        } else {
            total_bookings as f64 / total_users as f64
        };
        Ok(AdminStats {
            total_users,
            total_courts,
            total_bookings,
            average_bookings_per_user,
            revenue_cents,
        })
    }
}
