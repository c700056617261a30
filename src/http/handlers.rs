use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::engine::EngineError;
use crate::limits::DEFAULT_PAGE_SIZE;
use crate::model::BookingStatus;

use super::dto::*;
use super::{parse_body, parse_id, ApiError, ApiResult, AppState, Authenticated};

fn query<T>(q: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    q.map(|Query(v)| v)
        .map_err(|e| ApiError(EngineError::Validation(e.body_text())))
}

pub async fn health() -> &'static str {
    "ok"
}

// ── Users ────────────────────────────────────────────────

pub async fn register_user(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let req: RegisterRequest = parse_body(&body)?;
    let user = state.engine.register_user(&req.email, &req.name).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn list_users(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.engine.list_users(&caller)?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub async fn current_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.engine.get_user(&caller, caller.user_id)?.into()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id, "user")?;
    Ok(Json(state.engine.get_user(&caller, id)?.into()))
}

pub async fn change_role(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id, "user")?;
    let req: RoleRequest = parse_body(&body)?;
    Ok(Json(state.engine.change_role(&caller, id, req.role).await?.into()))
}

// ── Courts ───────────────────────────────────────────────

pub async fn list_courts(State(state): State<AppState>) -> Json<Vec<CourtResponse>> {
    let courts = state.engine.list_courts().await;
    Json(courts.into_iter().map(Into::into).collect())
}

pub async fn list_available_courts(
    State(state): State<AppState>,
    window: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CourtResponse>>> {
    let window = query(window)?;
    let courts = state
        .engine
        .list_available_courts(to_ms(window.start), to_ms(window.end))
        .await?;
    Ok(Json(courts.into_iter().map(Into::into).collect()))
}

pub async fn get_court(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CourtResponse>> {
    let id = parse_id(&id, "court")?;
    Ok(Json(state.engine.get_court(id).await?.into()))
}

pub async fn free_slots(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SlotResponse>>> {
    let id = parse_id(&id, "court")?;
    let window = query(window)?;
    let slots = state
        .engine
        .free_slots(id, to_ms(window.start), to_ms(window.end))
        .await?;
    Ok(Json(slots.into_iter().map(Into::into).collect()))
}

pub async fn has_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<ConflictResponse>> {
    let id = parse_id(&id, "court")?;
    let window = query(window)?;
    let conflict = state
        .engine
        .has_conflict(id, to_ms(window.start), to_ms(window.end))
        .await?;
    Ok(Json(ConflictResponse { conflict }))
}

pub async fn create_court(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<CourtResponse>)> {
    let draft = parse_body::<CourtRequest>(&body)?.into_draft()?;
    let court = state.engine.create_court(&caller, draft).await?;
    Ok((StatusCode::CREATED, Json(court.into())))
}

pub async fn update_court(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<CourtResponse>> {
    let id = parse_id(&id, "court")?;
    let draft = parse_body::<CourtRequest>(&body)?.into_draft()?;
    Ok(Json(state.engine.update_court(&caller, id, draft).await?.into()))
}

pub async fn patch_court(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<CourtResponse>> {
    let id = parse_id(&id, "court")?;
    let patch: CourtPatchRequest = parse_body(&body)?;
    Ok(Json(state.engine.patch_court(&caller, id, patch.into()).await?.into()))
}

pub async fn delete_court(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "court")?;
    state.engine.delete_court(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Bookings ─────────────────────────────────────────────

pub async fn list_bookings(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<Vec<BookingResponse>>> {
    let bookings = state.engine.list_bookings(&caller).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

pub async fn list_my_bookings(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    params: Result<Query<MyBookingsQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<BookingResponse>>> {
    let params = query(params)?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<BookingStatus>)
        .transpose()
        .map_err(|e| ApiError(EngineError::Validation(e.to_string())))?;
    let page = state
        .engine
        .list_my_bookings(
            &caller,
            params.page.unwrap_or(0),
            params.size.unwrap_or(DEFAULT_PAGE_SIZE),
            status,
        )
        .await?;
    Ok(Json(page.into()))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    let req: BookingRequest = parse_body(&body)?;
    let booking = state
        .engine
        .create_booking(&caller, req.court_id, to_ms(req.start_time), to_ms(req.end_time))
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let id = parse_id(&id, "booking")?;
    Ok(Json(state.engine.get_booking(&caller, id).await?.into()))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<BookingResponse>> {
    let id = parse_id(&id, "booking")?;
    let req: BookingRequest = parse_body(&body)?;
    let booking = state
        .engine
        .update_booking(&caller, id, req.court_id, to_ms(req.start_time), to_ms(req.end_time))
        .await?;
    Ok(Json(booking.into()))
}

pub async fn patch_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<BookingResponse>> {
    let id = parse_id(&id, "booking")?;
    let patch: BookingPatchRequest = parse_body(&body)?;
    Ok(Json(state.engine.patch_booking(&caller, id, patch.into()).await?.into()))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingResponse>> {
    let id = parse_id(&id, "booking")?;
    Ok(Json(state.engine.cancel_booking(&caller, id).await?.into()))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "booking")?;
    state.engine.delete_booking(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Statistics ───────────────────────────────────────────

pub async fn admin_stats(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(state.engine.admin_stats(&caller).await?.into()))
}
