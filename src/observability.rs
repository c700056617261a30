use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: operation, status.
pub const REQUESTS_TOTAL: &str = "padelbook_requests_total";

/// Histogram: request latency in seconds. Labels: operation.
pub const REQUEST_DURATION_SECONDS: &str = "padelbook_request_duration_seconds";

/// Counter: requests rejected by the identity provider.
pub const AUTH_FAILURES_TOTAL: &str = "padelbook_auth_failures_total";

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "padelbook_bookings_created_total";

/// Counter: create/update attempts refused for overlapping an active booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "padelbook_booking_conflicts_total";

/// Counter: bookings moved to COMPLETED by the sweeper.
pub const BOOKINGS_COMPLETED_TOTAL: &str = "padelbook_bookings_completed_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "padelbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "padelbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a matched route.
pub fn operation_label(method: &str, route: &str) -> &'static str {
    match (method, route) {
        (_, "/health") => "health",
        ("POST", "/api/users") => "register_user",
        ("GET", "/api/users") => "list_users",
        ("GET", "/api/users/me") => "current_user",
        ("GET", "/api/users/{id}") => "get_user",
        ("PUT", "/api/users/{id}/role") => "change_role",
        ("GET", "/api/courts") => "list_courts",
        ("POST", "/api/courts") => "create_court",
        ("GET", "/api/courts/available") => "list_available_courts",
        ("GET", "/api/courts/{id}") => "get_court",
        ("PUT", "/api/courts/{id}") => "update_court",
        ("PATCH", "/api/courts/{id}") => "patch_court",
        ("DELETE", "/api/courts/{id}") => "delete_court",
        ("GET", "/api/courts/{id}/free-slots") => "free_slots",
        ("GET", "/api/courts/{id}/conflict") => "has_conflict",
        ("GET", "/api/bookings") => "list_bookings",
        ("POST", "/api/bookings") => "create_booking",
        ("GET", "/api/bookings/me") => "list_my_bookings",
        ("GET", "/api/bookings/{id}") => "get_booking",
        ("PUT", "/api/bookings/{id}") => "update_booking",
        ("PATCH", "/api/bookings/{id}") => "patch_booking",
        ("DELETE", "/api/bookings/{id}") => "delete_booking",
        ("POST", "/api/bookings/{id}/cancel") => "cancel_booking",
        ("GET", "/api/statistics/admin") => "admin_stats",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_distinguish_methods_on_one_route() {
        assert_eq!(operation_label("GET", "/api/bookings/{id}"), "get_booking");
        assert_eq!(operation_label("PATCH", "/api/bookings/{id}"), "patch_booking");
        assert_eq!(operation_label("DELETE", "/api/bookings/{id}"), "delete_booking");
        assert_eq!(operation_label("GET", "/nowhere"), "other");
    }
}
