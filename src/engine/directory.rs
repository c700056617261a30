use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::now_ms;
use super::policy::{authorize, Caller, Target};
use super::{Engine, EngineError};

fn normalize_email(email: &str) -> Result<String, EngineError> {
    let email = email.trim().to_ascii_lowercase();
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(EngineError::Validation(format!("invalid email: {email:?}"))),
    }
}

fn normalize_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::Validation("name must not be blank".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(name.to_string())
}

impl Engine {
    /// Self-service registration; new accounts always start as USER.
    pub async fn register_user(&self, email: &str, name: &str) -> Result<User, EngineError> {
        self.insert_user(email, name, Role::User).await
    }

    async fn insert_user(&self, email: &str, name: &str, role: Role) -> Result<User, EngineError> {
        let email = normalize_email(email)?;
        let name = normalize_name(name)?;

        let _gate = self.begin_commit().await;
        let _directory = self.directory_lock.lock().await;
        if self.store.user_by_email(&email).is_some() {
            return Err(EngineError::AlreadyExists(format!("user with email {email}")));
        }
        if self.store.user_count() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        let user = User {
            id: Ulid::new(),
            email,
            name,
            role,
            points: 0,
            created_at: now_ms(),
        };
        self.persist_directory(&Event::UserRegistered { user: user.clone() }).await?;
        info!("registered user {} as {}", user.id, user.role);
        Ok(user)
    }

    /// Make sure an ADMIN account exists for `email`, promoting an existing
    /// account if needed. Used at startup.
    pub async fn ensure_admin(&self, email: &str, name: &str) -> Result<User, EngineError> {
        match self.store.user_by_email(&normalize_email(email)?) {
            Some(user) if user.role == Role::Admin => Ok(user),
            Some(user) => self.set_role(user.id, Role::Admin).await,
            None => self.insert_user(email, name, Role::Admin).await,
        }
    }

    pub async fn change_role(&self, caller: &Caller, id: Ulid, role: Role) -> Result<User, EngineError> {
        authorize(caller, Target::Administration)?;
        self.set_role(id, role).await
    }

    async fn set_role(&self, id: Ulid, role: Role) -> Result<User, EngineError> {
        let _gate = self.begin_commit().await;
        let _directory = self.directory_lock.lock().await;
        let user = self.require_user(id)?;
        if user.role == role {
            return Ok(user);
        }
        if !role.can_own_courts() && self.owns_any_court(id).await {
            return Err(EngineError::Validation(format!(
                "user {id} owns courts and cannot become {role}"
            )));
        }
        self.persist_directory(&Event::UserRoleChanged { id, role }).await?;
        info!("user {id} role changed from {} to {role}", user.role);
        Ok(User { role, ..user })
    }

    async fn owns_any_court(&self, user_id: Ulid) -> bool {
        for handle in self.store.court_handles() {
            if handle.read().await.court.owner_id == user_id {
                return true;
            }
        }
        false
    }

    pub fn list_users(&self, caller: &Caller) -> Result<Vec<User>, EngineError> {
        authorize(caller, Target::Administration)?;
        Ok(self.store.users())
    }

    /// An ADMIN may read any account, everyone else only their own.
    pub fn get_user(&self, caller: &Caller, id: Ulid) -> Result<User, EngineError> {
        let user = self.require_user(id)?;
        if id != caller.user_id {
            authorize(caller, Target::Administration)?;
        }
        Ok(user)
    }

    pub fn find_user(&self, id: &Ulid) -> Option<User> {
        self.store.get_user(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@localhost").is_err());
    }

    #[test]
    fn names_must_not_be_blank() {
        assert!(normalize_name("   ").is_err());
        assert_eq!(normalize_name(" Ana ").unwrap(), "Ana");
    }
}
