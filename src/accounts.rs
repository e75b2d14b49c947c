use std::fmt;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use rand::RngCore;
use tracing::warn;

use crate::entities::user;
use crate::store::StoreError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_NAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PASSWORD_HASH_LEN: usize = 128;
pub const SALT_BYTES: usize = 16;

const USERNAME_PUNCTUATION: &[char] = &['@', '.', '+', '-', '_'];

/// Fields every account carries regardless of what the application adds on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn check_password(&self, raw: &str) -> bool {
        verify_password(raw, &self.password_hash)
    }
}

/// An account plus the election-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub account: Account,
    pub email: String,
    pub is_election_admin: bool,
}

impl User {
    pub fn id(&self) -> i32 {
        self.account.id
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn check_password(&self, raw: &str) -> bool {
        self.account.check_password(raw)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.account.username)
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            account: Account {
                id: model.id,
                username: model.username,
                password_hash: model.password,
                first_name: model.first_name,
                last_name: model.last_name,
                is_staff: model.is_staff,
                is_active: model.is_active,
                is_superuser: model.is_superuser,
                last_login: model.last_login.map(|at| at.with_timezone(&Utc)),
                date_joined: model.date_joined.with_timezone(&Utc),
            },
            email: model.email,
            is_election_admin: model.is_election_admin,
        }
    }
}

/// Usernames may contain letters, digits and `@ . + - _`.
pub fn canonicalize_username(value: &str) -> Result<String, StoreError> {
    if value.is_empty() {
        return Err(StoreError::validation("username", "must not be empty"));
    }
    if value.chars().count() > MAX_USERNAME_LEN {
        return Err(StoreError::validation(
            "username",
            format!("exceeds {MAX_USERNAME_LEN} character limit"),
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_alphanumeric() && !USERNAME_PUNCTUATION.contains(c))
    {
        return Err(StoreError::validation(
            "username",
            format!("contains unsupported character {bad:?}"),
        ));
    }
    Ok(value.to_string())
}

pub fn canonicalize_name(field: &'static str, value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::validation(
            field,
            format!("exceeds {MAX_NAME_LEN} character limit"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validates an address and lower-cases its domain part. The local part is
/// kept as written since some mail hosts treat it case-sensitively.
pub fn normalize_email(value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("email", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_EMAIL_LEN {
        return Err(StoreError::validation(
            "email",
            format!("exceeds {MAX_EMAIL_LEN} character limit"),
        ));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(StoreError::validation("email", "must not contain whitespace"));
    }

    let (local, domain) = trimmed
        .split_once('@')
        .ok_or_else(|| StoreError::validation("email", "must contain '@'"))?;
    if domain.contains('@') {
        return Err(StoreError::validation("email", "must contain exactly one '@'"));
    }
    if local.is_empty() || domain.is_empty() {
        return Err(StoreError::validation(
            "email",
            "must have a local part and a domain",
        ));
    }

    let domain = domain.to_ascii_lowercase();
    let labels_ok = domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    });
    if !labels_ok || (!domain.contains('.') && domain != "localhost") {
        return Err(StoreError::validation(
            "email",
            format!("domain {domain:?} is not valid"),
        ));
    }

    Ok(format!("{local}@{domain}"))
}

pub fn hash_password(raw: &str) -> Result<String, StoreError> {
    if raw.is_empty() {
        return Err(StoreError::validation("password", "must not be empty"));
    }

    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| StoreError::PasswordHash(err.to_string()))?;

    let encoded = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| StoreError::PasswordHash(err.to_string()))?;
    assert!(
        encoded.len() <= MAX_PASSWORD_HASH_LEN,
        "Encoded password hash exceeds column width"
    );
    Ok(encoded)
}

pub fn verify_password(raw: &str, encoded: &str) -> bool {
    let parsed = match PasswordHash::new(encoded) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("Stored password hash is malformed: {err}");
            return false;
        }
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation() {
        assert_eq!(canonicalize_username("alice.b+1@x_y-z").unwrap(), "alice.b+1@x_y-z");
        assert!(canonicalize_username("").is_err());
        assert!(canonicalize_username("has space").is_err());
        assert!(canonicalize_username("semi;colon").is_err());
        let long_name = "u".repeat(MAX_USERNAME_LEN + 1);
        assert!(canonicalize_username(&long_name).is_err());
    }

    #[test]
    fn email_domain_is_lowercased() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "Alice@example.com"
        );
        assert_eq!(normalize_email("root@localhost").unwrap(), "root@localhost");
    }

    #[test]
    fn email_validation() {
        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@").is_err());
        assert!(normalize_email("alice@nodot").is_err());
        assert!(normalize_email("alice@exa..mple.com").is_err());
        assert!(normalize_email("al ice@example.com").is_err());
        assert!(normalize_email("a@b@example.com").is_err());
        assert!(normalize_email("@@example.com").is_err());
        let long_local = "a".repeat(MAX_EMAIL_LEN);
        assert!(normalize_email(&format!("{long_local}@example.com")).is_err());
    }

    #[test]
    fn name_validation() {
        assert_eq!(canonicalize_name("first_name", "  Ada ").unwrap(), "Ada");
        assert_eq!(canonicalize_name("first_name", "").unwrap(), "");
        let long_name = "n".repeat(MAX_NAME_LEN + 1);
        assert!(canonicalize_name("last_name", &long_name).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let encoded = hash_password("correct horse").expect("hash succeeds");
        assert!(encoded.starts_with("$argon2id$"));
        assert!(encoded.len() <= MAX_PASSWORD_HASH_LEN);
        assert!(verify_password("correct horse", &encoded));
        assert!(!verify_password("battery staple", &encoded));
        assert!(!verify_password("correct horse", "not-a-hash"));
        assert!(hash_password("").is_err());
    }

    #[test]
    fn user_displays_as_username() {
        let joined = Utc::now().fixed_offset();
        let model = user::Model {
            id: 7,
            username: "returning_officer".to_string(),
            password: "!".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            is_staff: false,
            is_active: true,
            is_superuser: false,
            is_election_admin: true,
            last_login: None,
            date_joined: joined,
        };
        let user = User::from(model);
        assert_eq!(user.to_string(), "returning_officer");
        assert_eq!(user.id(), 7);
        assert_eq!(user.account.full_name(), "Grace Hopper");
        assert!(user.is_election_admin);
        assert!(!user.check_password("anything"));
    }
}
