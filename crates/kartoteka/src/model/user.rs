use super::{EntityId, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_SCHEME: &str = "sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Technician,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Login key, compared case-insensitively.
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Data URL of the signature image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp_image: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(email: &str, password: &str, role: Role) -> Self {
        Self {
            id: None,
            email: email.trim().to_string(),
            password_hash: hash_password(password),
            role,
            name: None,
            specialization: None,
            phone: None,
            signature_image: None,
            stamp_image: None,
            active: true,
            created_at: Some(Utc::now()),
            schema_version: Self::SCHEMA_VERSION,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Active users with a matching password may log in.
    pub fn can_authenticate(&self, password: &str) -> bool {
        self.active && verify_password(password, &self.password_hash)
    }

    pub fn set_password(&mut self, password: &str) {
        self.password_hash = hash_password(password);
    }

    /// Copy suitable for the session slot: everything but the password hash.
    pub fn without_secret(&self) -> Self {
        Self {
            password_hash: String::new(),
            ..self.clone()
        }
    }
}

impl Record for User {
    const SCHEMA_VERSION: u32 = 1;

    fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn upgrade(mut self) -> Self {
        self.schema_version = Self::SCHEMA_VERSION;
        self
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted SHA-256 in the form `sha256$<salt>$<hex digest>`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}${}", HASH_SCHEME, salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => digest(salt, password) == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("tajna123");
        assert!(hash.starts_with("sha256$"));
        assert!(verify_password("tajna123", &hash));
        assert!(!verify_password("tajna124", &hash));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        assert_ne!(hash_password("x"), hash_password("x"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("plain", "plain"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_inactive_user_cannot_authenticate() {
        let mut user = User::new("dr@klinika.rs", "lozinka", Role::Doctor);
        assert!(user.can_authenticate("lozinka"));
        user.active = false;
        assert!(!user.can_authenticate("lozinka"));
    }

    #[test]
    fn test_email_match_ignores_case_and_whitespace() {
        let user = User::new("Admin@Klinika.rs", "x", Role::Admin);
        assert!(user.has_email(" admin@klinika.rs "));
    }

    #[test]
    fn test_missing_active_flag_defaults_to_true() {
        let user: User =
            serde_json::from_str(r#"{"id": 3, "email": "a@b.rs", "role": "nurse"}"#).unwrap();
        assert!(user.active);
        assert_eq!(user.role, Role::Nurse);
    }
}
