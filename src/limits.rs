use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_ADDRESS_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;

pub const MAX_COURTS: usize = 10_000;
pub const MAX_USERS: usize = 1_000_000;
pub const MAX_BOOKINGS_PER_COURT: usize = 100_000;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

pub const MAX_BOOKING_DURATION_MS: Ms = 24 * 3_600_000;
pub const MAX_QUERY_WINDOW_MS: Ms = 31 * 24 * 3_600_000;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Upper bound on the court price, in cents.
pub const MAX_PRICE_CENTS: u64 = 100_000_000;

/// Largest encoded event the WAL writes or accepts on replay.
pub const MAX_EVENT_BYTES: usize = 1 << 20;
