//! Role- and ownership-scoped access rules.
//!
//! Every lifecycle operation funnels through [`authorize`]; the decision
//! itself is the pure function [`permits`].

use ulid::Ulid;

use crate::model::{Booking, Court, Role, User};

use super::EngineError;

/// Authenticated identity of the caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Ulid,
    pub role: Role,
    pub email: String,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Caller { user_id: user.id, role: user.role, email: user.email.clone() }
    }
}

/// What the caller wants to act on, reduced to the ownership facts the
/// decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Booking { owns_court: bool, is_creator: bool },
    /// The full booking listing.
    AllBookings,
    /// An existing court, or a court about to be created/assigned.
    Court { owns_court: bool },
    /// Directory administration and statistics.
    Administration,
}

impl Target {
    pub fn booking(caller: &Caller, booking: &Booking, court: &Court) -> Self {
        Target::Booking {
            owns_court: court.owner_id == caller.user_id,
            is_creator: booking.user_id == caller.user_id,
        }
    }

    pub fn court(caller: &Caller, owner_id: Ulid) -> Self {
        Target::Court { owns_court: owner_id == caller.user_id }
    }
}

pub fn permits(role: Role, target: Target) -> bool {
    match (role, target) {
        (Role::Admin, _) => true,
        (Role::Owner, Target::Booking { owns_court, .. }) => owns_court,
        (Role::User, Target::Booking { is_creator, .. }) => is_creator,
        (Role::Owner, Target::AllBookings) => true,
        (Role::User, Target::AllBookings) => false,
        (Role::Owner, Target::Court { owns_court }) => owns_court,
        // a USER can never own a court
        (Role::User, Target::Court { .. }) => false,
        (_, Target::Administration) => false,
    }
}

pub fn authorize(caller: &Caller, target: Target) -> Result<(), EngineError> {
    if permits(caller.role, target) {
        return Ok(());
    }
    let reason = match target {
        Target::Booking { .. } => "booking is outside the caller's scope",
        Target::AllBookings => "listing all bookings requires OWNER or ADMIN",
        Target::Court { .. } if caller.role == Role::User => "USER role cannot manage courts",
        Target::Court { .. } => "court is owned by another user",
        Target::Administration => "requires ADMIN",
    };
    Err(EngineError::Forbidden(reason))
}
