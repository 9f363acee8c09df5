//! Staff accounts and the login session.
//!
//! The session is the `currentUser` fallback entry. It holds a copy of the user
//! without the password hash.

use super::{not_found, DataStorage, SaveOutcome, Saved, USERS};
use crate::error::{KartotekaError, Result};
use crate::model::{find_by_id, upsert, AuditAction, AuditLog, EntityId, Record, Role, User};
use crate::store::fallback::keys;
use crate::store::{FallbackStore, FileBridge};
use tracing::{debug, info, warn};

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@kartoteka.local";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

impl<B: FileBridge, F: FallbackStore> DataStorage<B, F> {
    pub fn get_users(&self) -> Vec<User> {
        self.load(&USERS)
    }

    /// Upsert a user. The email is the login key, so a second account with the
    /// same address (ignoring case) is rejected.
    pub fn save_user(&self, mut user: User) -> Result<Saved<User>> {
        let id = user.ensure_id();
        let _guard = self.lock(&USERS);
        let mut users: Vec<User> = self.load(&USERS);
        ensure_unique_email(&users, &user)?;
        upsert(&mut users, user.clone());
        let outcome = self.persist_list(&USERS, &users, &format!("Saved user {}", id));
        Ok(Saved {
            record: user,
            outcome,
        })
    }

    pub fn save_users(&self, users: Vec<User>) -> Result<SaveOutcome> {
        for (pos, user) in users.iter().enumerate() {
            ensure_unique_email(&users[..pos], user)?;
        }
        Ok(self.save_all(&USERS, users))
    }

    /// Seed one admin account when there are no users at all. Returns the new user.
    pub fn ensure_default_users(&self) -> Result<Option<Saved<User>>> {
        if !self.get_users().is_empty() {
            return Ok(None);
        }
        info!("no users found, creating default admin {}", DEFAULT_ADMIN_EMAIL);
        let admin = User::new(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD, Role::Admin)
            .with_name("Administrator");
        self.save_user(admin).map(Some)
    }

    pub fn delete_user(&self, id: &EntityId) -> Result<SaveOutcome> {
        let guard = self.lock(&USERS);
        let mut users: Vec<User> = self.load(&USERS);
        let before = users.len();
        users.retain(|u| u.id.as_ref() != Some(id));
        if users.len() == before {
            return Err(not_found(&USERS, id));
        }
        let outcome = self.persist_list(&USERS, &users, &format!("Deleted user {}", id));
        drop(guard);

        let actor = self.actor();
        self.append_audit(
            AuditLog::new(AuditAction::Delete, "user", Some(id.clone())).by(actor.as_deref()),
        );
        Ok(outcome)
    }

    pub fn reset_password(&self, id: &EntityId, new_password: &str) -> Result<Saved<User>> {
        self.update_one(&USERS, id, |user: &mut User| {
            user.set_password(new_password);
            Ok(())
        })
    }

    /// Check credentials and open a session. `None` for unknown, inactive or wrong password.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        let users = self.get_users();
        let Some(user) = users.iter().find(|u| u.has_email(email)) else {
            debug!("login attempt for unknown user");
            return None;
        };
        if !user.can_authenticate(password) {
            debug!("login rejected for {}", user.email);
            return None;
        }

        let session = user.without_secret();
        if let Err(e) = self.store_fallback(keys::CURRENT_USER, &session) {
            warn!("failed to store session: {}", e);
        }
        self.append_audit(
            AuditLog::new(AuditAction::Login, "user", session.id.clone())
                .by(Some(session.email.as_str())),
        );
        Some(session)
    }

    pub fn current_user(&self) -> Option<User> {
        self.fallback_value(keys::CURRENT_USER)
    }

    pub fn logout(&self) {
        let Some(user) = self.current_user() else {
            return;
        };
        if let Err(e) = self.fallback().remove(keys::CURRENT_USER) {
            warn!("failed to clear session: {}", e);
        }
        self.append_audit(
            AuditLog::new(AuditAction::Logout, "user", user.id.clone()).by(Some(user.email.as_str())),
        );
    }

    pub fn get_user(&self, id: &EntityId) -> Option<User> {
        find_by_id(&self.get_users(), id).cloned()
    }
}

fn ensure_unique_email(users: &[User], user: &User) -> Result<()> {
    let taken = users.iter().any(|other| {
        other.has_email(&user.email) && (other.id.is_none() || other.id != user.id)
    });
    if taken {
        return Err(KartotekaError::Validation(format!(
            "a user with email {} already exists",
            user.email.trim()
        )));
    }
    Ok(())
}
