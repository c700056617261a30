use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::policy::{authorize, Caller, Target};
use super::{Engine, EngineError};

/// Full set of court fields for create and update. `owner_id` defaults to
/// the caller on create and to the current owner on update.
#[derive(Debug, Clone, PartialEq)]
pub struct CourtDraft {
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub price_cents: u64,
    pub owner_id: Option<Ulid>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourtPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price_cents: Option<u64>,
    pub owner_id: Option<Ulid>,
}

fn validate_text(value: &str, field: &'static str, max: usize) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be blank")));
    }
    if trimmed.len() > max {
        return Err(EngineError::LimitExceeded(field));
    }
    Ok(trimmed.to_string())
}

fn validate_location(location: Option<GeoPoint>) -> Result<Option<GeoPoint>, EngineError> {
    if let Some(GeoPoint { lat, lng }) = location
        && !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
    {
        return Err(EngineError::Validation(format!("invalid coordinates ({lat}, {lng})")));
    }
    Ok(location)
}

fn validate_court(court: Court) -> Result<Court, EngineError> {
    if court.price_cents > MAX_PRICE_CENTS {
        return Err(EngineError::LimitExceeded("price"));
    }
    Ok(Court {
        name: validate_text(&court.name, "name", MAX_NAME_LEN)?,
        address: validate_text(&court.address, "address", MAX_ADDRESS_LEN)?,
        location: validate_location(court.location)?,
        ..court
    })
}

impl Engine {
    /// The owner must exist and hold a role that can own courts; the caller
    /// must be allowed to assign it.
    fn resolve_owner(&self, caller: &Caller, owner_id: Ulid) -> Result<User, EngineError> {
        authorize(caller, Target::court(caller, owner_id))?;
        let owner = self.require_user(owner_id)?;
        if !owner.role.can_own_courts() {
            return Err(EngineError::Validation(format!(
                "user {owner_id} has role {} and cannot own courts",
                owner.role
            )));
        }
        Ok(owner)
    }

    pub async fn create_court(&self, caller: &Caller, draft: CourtDraft) -> Result<CourtView, EngineError> {
        let _gate = self.begin_commit().await;
        // Held until the court is inserted, so a concurrent demotion of the
        // owner either sees the court or is seen by the role check.
        let _directory = self.directory_lock.lock().await;
        let owner = self.resolve_owner(caller, draft.owner_id.unwrap_or(caller.user_id))?;
        let court = validate_court(Court {
            id: Ulid::new(),
            owner_id: owner.id,
            name: draft.name,
            address: draft.address,
            location: draft.location,
            price_cents: draft.price_cents,
        })?;

        if self.store.court_count() >= MAX_COURTS {
            return Err(EngineError::LimitExceeded("too many courts"));
        }
        self.wal_append(&Event::CourtCreated { court: court.clone() }).await?;
        self.store.insert_court(court.clone());
        info!("court {} ({}) created for owner {}", court.id, court.name, owner.id);
        Ok(self.court_view(&court))
    }

    pub async fn update_court(
        &self,
        caller: &Caller,
        id: Ulid,
        draft: CourtDraft,
    ) -> Result<CourtView, EngineError> {
        self.rewrite_court(caller, id, |existing| {
            Ok(Court {
                id,
                owner_id: draft.owner_id.unwrap_or(existing.owner_id),
                name: draft.name.clone(),
                address: draft.address.clone(),
                location: draft.location,
                price_cents: draft.price_cents,
            })
        })
        .await
    }

    pub async fn patch_court(
        &self,
        caller: &Caller,
        id: Ulid,
        patch: CourtPatch,
    ) -> Result<CourtView, EngineError> {
        self.rewrite_court(caller, id, |existing| {
            let mut next = existing.clone();
            if let Some(name) = &patch.name {
                next.name = name.clone();
            }
            if let Some(address) = &patch.address {
                next.address = address.clone();
            }
            if patch.lat.is_some() || patch.lng.is_some() {
                let current = existing.location;
                let lat = patch.lat.or(current.map(|p| p.lat));
                let lng = patch.lng.or(current.map(|p| p.lng));
                next.location = match (lat, lng) {
                    (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
                    _ => {
                        return Err(EngineError::Validation(
                            "lat and lng must be set together".into(),
                        ));
                    }
                };
            }
            if let Some(price_cents) = patch.price_cents {
                next.price_cents = price_cents;
            }
            if let Some(owner_id) = patch.owner_id {
                next.owner_id = owner_id;
            }
            Ok(next)
        })
        .await
    }

    async fn rewrite_court<F>(&self, caller: &Caller, id: Ulid, build: F) -> Result<CourtView, EngineError>
    where
        F: FnOnce(&Court) -> Result<Court, EngineError>,
    {
        let _gate = self.begin_commit().await;
        // Directory before court: `set_role` reads court owners under it.
        let _directory = self.directory_lock.lock().await;
        let handle = self.court_handle(id)?;
        let mut guard = handle.write().await;
        self.ensure_live(&guard)?;
        authorize(caller, Target::court(caller, guard.court.owner_id))?;

        let court = validate_court(build(&guard.court)?)?;
        if court.owner_id != guard.court.owner_id {
            self.resolve_owner(caller, court.owner_id)?;
        }
        self.persist_to_court(&mut guard, &Event::CourtUpdated { court: court.clone() })
            .await?;
        info!("court {id} updated by {}", caller.user_id);
        Ok(self.court_view(&court))
    }

    /// Refused while the court has any booking, whatever its status.
    pub async fn delete_court(&self, caller: &Caller, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.begin_commit().await;
        let handle = self.court_handle(id)?;
        let guard = handle.write().await;
        self.ensure_live(&guard)?;
        authorize(caller, Target::court(caller, guard.court.owner_id))?;
        if !guard.bookings.is_empty() {
            return Err(EngineError::CourtHasBookings(id));
        }

        self.wal_append(&Event::CourtDeleted { id }).await?;
        self.store.remove_court(&id);
        info!("court {id} deleted by {}", caller.user_id);
        Ok(())
    }

    /// A court handle obtained before a concurrent delete must not be written.
    pub(crate) fn ensure_live(&self, cs: &CourtState) -> Result<(), EngineError> {
        if self.store.get_court(&cs.id()).is_none() {
            return Err(EngineError::not_found("court", cs.id()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court(name: &str, address: &str) -> Court {
        Court {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            name: name.into(),
            address: address.into(),
            location: None,
            price_cents: 1500,
        }
    }

    #[test]
    fn court_fields_are_trimmed() {
        let c = validate_court(court("  Pista 1 ", " Calle 2 ")).unwrap();
        assert_eq!(c.name, "Pista 1");
        assert_eq!(c.address, "Calle 2");
    }

    #[test]
    fn blank_fields_rejected() {
        assert!(matches!(validate_court(court("   ", "Calle")), Err(EngineError::Validation(_))));
        assert!(matches!(validate_court(court("Pista", "")), Err(EngineError::Validation(_))));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(validate_court(court(&long, "Calle")), Err(EngineError::LimitExceeded(_))));
    }

    #[test]
    fn coordinates_checked() {
        let mut c = court("Pista", "Calle");
        c.location = Some(GeoPoint { lat: 91.0, lng: 0.0 });
        assert!(validate_court(c.clone()).is_err());
        c.location = Some(GeoPoint { lat: f64::NAN, lng: 0.0 });
        assert!(validate_court(c.clone()).is_err());
        c.location = Some(GeoPoint { lat: -34.6, lng: -58.4 });
        assert!(validate_court(c).is_ok());
    }
}
