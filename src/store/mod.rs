//! Persistence operations for users, polls, questions and choices.
//!
//! Every write validates its input first and then relies on the schema as the
//! last line of enforcement: unique and foreign-key violations reported by the
//! database are translated into the same [`StoreError`] variants the
//! application-level checks produce.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DbErr, SqlErr};

pub mod polls;
pub mod users;

pub const DEFAULT_PAGE_LIMIT: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("a {entity} with {field} '{value}' already exists")]
    UniqueViolation {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{entity} references missing {parent} {parent_id}")]
    ForeignKeyViolation {
        entity: &'static str,
        parent: &'static str,
        parent_id: i32,
    },
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl StoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Maps a foreign-key failure on insert to the missing parent.
pub(crate) fn foreign_key_error(
    err: DbErr,
    entity: &'static str,
    parent: &'static str,
    parent_id: i32,
) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => StoreError::ForeignKeyViolation {
            entity,
            parent,
            parent_id,
        },
        _ => StoreError::Database(err),
    }
}

pub(crate) fn fixed_now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

#[cfg(test)]
pub(crate) mod testing {
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};

    /// Fresh, fully migrated in-memory SQLite database. A single pooled
    /// connection keeps every query on the same memory database.
    pub async fn memory_database() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let database = Database::connect(options)
            .await
            .expect("in-memory sqlite connects");
        migration::Migrator::up(&database, None)
            .await
            .expect("migrations apply");
        database
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_record() {
        let missing = StoreError::not_found("poll", 4);
        assert_eq!(missing.to_string(), "poll 4 not found");

        let duplicate = StoreError::UniqueViolation {
            entity: "user",
            field: "email",
            value: "a@example.com".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "a user with email 'a@example.com' already exists"
        );

        let orphan = StoreError::ForeignKeyViolation {
            entity: "question",
            parent: "poll",
            parent_id: 9,
        };
        assert_eq!(orphan.to_string(), "question references missing poll 9");
    }

    #[test]
    fn unrelated_database_errors_pass_through() {
        let err = foreign_key_error(
            DbErr::Custom("connection reset".to_string()),
            "choice",
            "question",
            1,
        );
        assert!(matches!(err, StoreError::Database(_)));
    }
}
