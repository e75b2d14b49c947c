use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::User;

/// Payload for creating an account. Only `username`, `email` and `password`
/// are required; flags fall back to the usual defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default = "NewUser::default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_election_admin: bool,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            is_active: Self::default_is_active(),
            is_superuser: false,
            is_election_admin: false,
        }
    }

    const fn default_is_active() -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub is_election_admin: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub password: String,
}

/// Admin-facing representation. The password hash is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_election_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.account.id,
            username: user.account.username.clone(),
            email: user.email.clone(),
            first_name: user.account.first_name.clone(),
            last_name: user.account.last_name.clone(),
            is_staff: user.account.is_staff,
            is_active: user.account.is_active,
            is_superuser: user.account.is_superuser,
            is_election_admin: user.is_election_admin,
            last_login: user.account.last_login,
            date_joined: user.account.date_joined,
        }
    }
}
