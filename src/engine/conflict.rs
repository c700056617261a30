use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

fn check_bounds(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

/// Validate a requested booking range. Equal or inverted bounds are rejected
/// before any conflict evaluation.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    let span = Span::try_new(start, end).ok_or(EngineError::InvalidSpan { start, end })?;
    check_bounds(&span)?;
    if span.duration_ms() > MAX_BOOKING_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    Ok(span)
}

/// Validate an availability query window.
pub(crate) fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    let span = Span::try_new(start, end).ok_or(EngineError::InvalidSpan { start, end })?;
    check_bounds(&span)?;
    if span.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

/// First active booking on the court overlapping `span`, skipping `ignore`
/// (the booking being rescheduled).
pub(crate) fn find_conflict<'a>(
    court: &'a CourtState,
    span: &Span,
    ignore: Option<Ulid>,
) -> Option<&'a Booking> {
    court
        .active_overlapping(span)
        .find(|b| Some(b.id) != ignore)
}

pub fn has_conflict(court: &CourtState, span: &Span) -> bool {
    find_conflict(court, span, None).is_some()
}

pub(crate) fn check_no_conflict(
    court: &CourtState,
    span: &Span,
    ignore: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(court, span, ignore) {
        Some(existing) => {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            Err(EngineError::Conflict(existing.id))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn court_with(bookings: &[(Ms, Ms, BookingStatus)]) -> CourtState {
        let mut cs = CourtState::new(Court {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            name: "Pista".into(),
            address: "Plaza 1".into(),
            location: None,
            price_cents: 0,
        });
        for &(start, end, status) in bookings {
            cs.insert_booking(Booking {
                id: Ulid::new(),
                court_id: cs.id(),
                user_id: Ulid::new(),
                span: Span::new(start, end),
                status,
                created_at: 0,
                updated_at: 0,
            });
        }
        cs
    }

    #[test]
    fn validate_span_rejects_empty_and_inverted() {
        assert!(matches!(validate_span(10 * H, 10 * H), Err(EngineError::InvalidSpan { .. })));
        assert!(matches!(validate_span(10 * H + 1, 10 * H), Err(EngineError::InvalidSpan { .. })));
        assert_eq!(validate_span(10 * H, 11 * H).unwrap(), Span::new(10 * H, 11 * H));
    }

    #[test]
    fn validate_span_limits() {
        assert!(matches!(validate_span(-H, H), Err(EngineError::LimitExceeded(_))));
        assert!(matches!(validate_span(0, 25 * H), Err(EngineError::LimitExceeded(_))));
        assert!(matches!(
            validate_span(MAX_VALID_TIMESTAMP_MS - H, MAX_VALID_TIMESTAMP_MS + H),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn validate_window_allows_wide_queries() {
        assert!(validate_window(0, 7 * 24 * H).is_ok());
        assert!(validate_window(0, 32 * 24 * H).is_err());
        assert!(validate_window(H, H).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        let cs = court_with(&[(10 * H, 11 * H, BookingStatus::Booked)]);
        assert!(has_conflict(&cs, &Span::new(10 * H + H / 2, 11 * H + H / 2)));
        assert!(has_conflict(&cs, &Span::new(9 * H, 12 * H)));
        assert!(!has_conflict(&cs, &Span::new(11 * H, 12 * H))); // back-to-back
        assert!(!has_conflict(&cs, &Span::new(9 * H, 10 * H)));
    }

    #[test]
    fn terminal_bookings_never_block() {
        let cs = court_with(&[
            (10 * H, 11 * H, BookingStatus::Cancelled),
            (10 * H, 11 * H, BookingStatus::Completed),
        ]);
        assert!(!has_conflict(&cs, &Span::new(10 * H, 11 * H)));
    }

    #[test]
    fn rescheduled_booking_ignores_itself() {
        let cs = court_with(&[(10 * H, 11 * H, BookingStatus::Booked)]);
        let own = cs.bookings[0].id;
        let shifted = Span::new(10 * H + H / 2, 11 * H + H / 2);
        assert!(check_no_conflict(&cs, &shifted, Some(own)).is_ok());
        match check_no_conflict(&cs, &shifted, None) {
            Err(EngineError::Conflict(id)) => assert_eq!(id, own),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
