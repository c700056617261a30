use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;

/// Coarse classification of engine failures; the HTTP layer maps these to
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Unauthenticated,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Authorization => "forbidden",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid time range: start {start} must be before end {end}")]
    InvalidSpan { start: i64, end: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict with booking: {0}")]
    Conflict(Ulid),

    #[error("booking {0} is already cancelled")]
    AlreadyCancelled(Ulid),

    #[error("booking status cannot change from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("cannot delete court {0}: it has bookings")]
    CourtHasBookings(Ulid),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound { entity, id: id.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidSpan { .. }
            | EngineError::Validation(_)
            | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Conflict(_)
            | EngineError::AlreadyCancelled(_)
            | EngineError::InvalidTransition { .. }
            | EngineError::CourtHasBookings(_)
            | EngineError::AlreadyExists(_) => ErrorKind::Conflict,
            EngineError::Forbidden(_) => ErrorKind::Authorization,
            EngineError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            EngineError::WalError(_) => ErrorKind::Internal,
        }
    }
}
