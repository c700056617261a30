//! JSON request and response bodies. Times cross the wire as RFC 3339 UTC
//! timestamps and are stored as Unix milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::{BookingPatch, CourtDraft, CourtPatch, EngineError};
use crate::model::*;

pub fn to_ms(t: DateTime<Utc>) -> Ms {
    t.timestamp_millis()
}

pub fn from_ms(ms: Ms) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn location(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, EngineError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Some(GeoPoint { lat, lng })),
        (None, None) => Ok(None),
        _ => Err(EngineError::Validation("lat and lng must be set together".into())),
    }
}

// ── Requests ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CourtRequest {
    pub name: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price_cents: u64,
    pub owner_id: Option<Ulid>,
}

impl CourtRequest {
    pub fn into_draft(self) -> Result<CourtDraft, EngineError> {
        Ok(CourtDraft {
            location: location(self.lat, self.lng)?,
            name: self.name,
            address: self.address,
            price_cents: self.price_cents,
            owner_id: self.owner_id,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CourtPatchRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price_cents: Option<u64>,
    pub owner_id: Option<Ulid>,
}

impl From<CourtPatchRequest> for CourtPatch {
    fn from(req: CourtPatchRequest) -> Self {
        CourtPatch {
            name: req.name,
            address: req.address,
            lat: req.lat,
            lng: req.lng,
            price_cents: req.price_cents,
            owner_id: req.owner_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingRequest {
    pub court_id: Ulid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Partial booking update. Any key outside this set fails to parse.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingPatchRequest {
    pub court_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
}

impl From<BookingPatchRequest> for BookingPatch {
    fn from(req: BookingPatchRequest) -> Self {
        BookingPatch {
            court_id: req.court_id,
            user_id: req.user_id,
            start: req.start_time.map(to_ms),
            end: req.end_time.map(to_ms),
            status: req.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MyBookingsQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub status: Option<String>,
}

// ── Responses ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Ulid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub points: u32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        UserResponse {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            points: u.points,
            created_at: from_ms(u.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtResponse {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price_cents: u64,
    pub owner_id: Ulid,
    pub owner_name: String,
}

impl From<CourtView> for CourtResponse {
    fn from(c: CourtView) -> Self {
        CourtResponse {
            id: c.id,
            name: c.name,
            address: c.address,
            lat: c.location.map(|p| p.lat),
            lng: c.location.map(|p| p.lng),
            price_cents: c.price_cents,
            owner_id: c.owner_id,
            owner_name: c.owner_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Ulid,
    pub court_id: Ulid,
    pub court_name: String,
    pub user_id: Ulid,
    pub user_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<BookingView> for BookingResponse {
    fn from(b: BookingView) -> Self {
        BookingResponse {
            id: b.id,
            court_id: b.court_id,
            court_name: b.court_name,
            user_id: b.user_id,
            user_name: b.user_name,
            start_time: from_ms(b.start),
            end_time: from_ms(b.end),
            status: b.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl From<Page<BookingView>> for PageResponse<BookingResponse> {
    fn from(p: Page<BookingView>) -> Self {
        PageResponse {
            total_pages: p.total_pages(),
            page: p.page,
            size: p.size,
            total_items: p.total_items,
            items: p.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Span> for SlotResponse {
    fn from(s: Span) -> Self {
        SlotResponse { start_time: from_ms(s.start), end_time: from_ms(s.end) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConflictResponse {
    pub conflict: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: usize,
    pub total_courts: usize,
    pub total_bookings: usize,
    pub average_bookings_per_user: f64,
    pub revenue_cents: u64,
}

impl From<AdminStats> for StatsResponse {
    fn from(s: AdminStats) -> Self {
        StatsResponse {
            total_users: s.total_users,
            total_courts: s.total_courts,
            total_bookings: s.total_bookings,
            average_bookings_per_user: s.average_bookings_per_user,
            revenue_cents: s.revenue_cents,
        }
    }
}
