use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, SqlErr,
};
use tracing::{debug, info};

use crate::accounts::{self, User};
use crate::entities::user;
use crate::models::user::{NewUser, UserPatch};

use super::{StoreError, fixed_now};

const ENTITY: &str = "user";

pub async fn create_user(database: &DatabaseConnection, new: NewUser) -> Result<User, StoreError> {
    let username = accounts::canonicalize_username(&new.username)?;
    let email = accounts::normalize_email(&new.email)?;
    let first_name = accounts::canonicalize_name("first_name", &new.first_name)?;
    let last_name = accounts::canonicalize_name("last_name", &new.last_name)?;
    let password = accounts::hash_password(&new.password)?;

    ensure_username_available(database, &username, None).await?;
    ensure_email_available(database, &email, None).await?;

    let model = user::ActiveModel {
        id: NotSet,
        username: Set(username.clone()),
        password: Set(password),
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email.clone()),
        is_staff: Set(new.is_staff),
        is_active: Set(new.is_active),
        is_superuser: Set(new.is_superuser),
        is_election_admin: Set(new.is_election_admin),
        last_login: Set(None),
        date_joined: Set(fixed_now()),
    };

    let created = model
        .insert(database)
        .await
        .map_err(|err| unique_error(err, &username, &email))?;
    info!(user_id = created.id, username = %created.username, "Created user");
    Ok(User::from(created))
}

pub async fn get_user(database: &DatabaseConnection, id: i32) -> Result<User, StoreError> {
    find_model(database, id).await.map(User::from)
}

pub async fn find_by_username(
    database: &DatabaseConnection,
    username: &str,
) -> Result<Option<User>, StoreError> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(database)
        .await?;
    Ok(found.map(User::from))
}

pub async fn list_users(
    database: &DatabaseConnection,
    limit: u64,
    offset: u64,
) -> Result<Vec<User>, StoreError> {
    assert!(limit > 0, "User page limit must be positive");
    let models = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(database)
        .await?;
    Ok(models.into_iter().map(User::from).collect())
}

/// Applies the fields present in `patch`. A user may keep its own username
/// and email; taking another account's value is a conflict.
pub async fn update_user(
    database: &DatabaseConnection,
    id: i32,
    patch: UserPatch,
) -> Result<User, StoreError> {
    let existing = find_model(database, id).await?;
    let mut username = existing.username.clone();
    let mut email = existing.email.clone();
    let mut active: user::ActiveModel = existing.into();

    if let Some(value) = patch.username.as_deref() {
        username = accounts::canonicalize_username(value)?;
        ensure_username_available(database, &username, Some(id)).await?;
        active.username = Set(username.clone());
    }
    if let Some(value) = patch.email.as_deref() {
        email = accounts::normalize_email(value)?;
        ensure_email_available(database, &email, Some(id)).await?;
        active.email = Set(email.clone());
    }
    if let Some(value) = patch.first_name.as_deref() {
        active.first_name = Set(accounts::canonicalize_name("first_name", value)?);
    }
    if let Some(value) = patch.last_name.as_deref() {
        active.last_name = Set(accounts::canonicalize_name("last_name", value)?);
    }
    if let Some(value) = patch.is_staff {
        active.is_staff = Set(value);
    }
    if let Some(value) = patch.is_active {
        active.is_active = Set(value);
    }
    if let Some(value) = patch.is_superuser {
        active.is_superuser = Set(value);
    }
    if let Some(value) = patch.is_election_admin {
        active.is_election_admin = Set(value);
    }

    if !active.is_changed() {
        return get_user(database, id).await;
    }

    let updated = active
        .update(database)
        .await
        .map_err(|err| unique_error(err, &username, &email))?;
    debug!(user_id = id, "Updated user");
    Ok(User::from(updated))
}

pub async fn set_password(
    database: &DatabaseConnection,
    id: i32,
    raw_password: &str,
) -> Result<(), StoreError> {
    let existing = find_model(database, id).await?;
    let encoded = accounts::hash_password(raw_password)?;
    let mut active: user::ActiveModel = existing.into();
    active.password = Set(encoded);
    active.update(database).await?;
    info!(user_id = id, "Password changed");
    Ok(())
}

pub async fn delete_user(database: &DatabaseConnection, id: i32) -> Result<(), StoreError> {
    let result = user::Entity::delete_by_id(id).exec(database).await?;
    if result.rows_affected == 0 {
        return Err(StoreError::not_found(ENTITY, id));
    }
    info!(user_id = id, "Deleted user");
    Ok(())
}

/// Returns the account when it is active and `raw_password` matches, stamping
/// `last_login`. Unknown usernames, inactive accounts and wrong passwords all
/// yield `None`.
pub async fn authenticate(
    database: &DatabaseConnection,
    username: &str,
    raw_password: &str,
) -> Result<Option<User>, StoreError> {
    let Some(model) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(database)
        .await?
    else {
        return Ok(None);
    };

    if !model.is_active || !accounts::verify_password(raw_password, &model.password) {
        debug!(username, "Authentication rejected");
        return Ok(None);
    }

    let mut active: user::ActiveModel = model.into();
    active.last_login = Set(Some(fixed_now()));
    let updated = active.update(database).await?;
    Ok(Some(User::from(updated)))
}

async fn find_model(database: &DatabaseConnection, id: i32) -> Result<user::Model, StoreError> {
    user::Entity::find_by_id(id)
        .one(database)
        .await?
        .ok_or_else(|| StoreError::not_found(ENTITY, id))
}

async fn ensure_username_available(
    database: &DatabaseConnection,
    username: &str,
    except_id: Option<i32>,
) -> Result<(), StoreError> {
    let mut select = user::Entity::find().filter(user::Column::Username.eq(username));
    if let Some(id) = except_id {
        select = select.filter(user::Column::Id.ne(id));
    }
    if select.one(database).await?.is_some() {
        return Err(StoreError::UniqueViolation {
            entity: ENTITY,
            field: "username",
            value: username.to_string(),
        });
    }
    Ok(())
}

async fn ensure_email_available(
    database: &DatabaseConnection,
    email: &str,
    except_id: Option<i32>,
) -> Result<(), StoreError> {
    let mut select = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except_id {
        select = select.filter(user::Column::Id.ne(id));
    }
    if select.one(database).await?.is_some() {
        return Err(StoreError::UniqueViolation {
            entity: ENTITY,
            field: "email",
            value: email.to_string(),
        });
    }
    Ok(())
}

/// Both `username` and `email` carry unique constraints; the constraint or
/// column name in the driver message tells them apart.
fn unique_error(err: DbErr, username: &str, email: &str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            let (field, value) = if message.contains("email") {
                ("email", email)
            } else {
                ("username", username)
            };
            StoreError::UniqueViolation {
                entity: ENTITY,
                field,
                value: value.to_string(),
            }
        }
        _ => StoreError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::memory_database;

    fn voter(username: &str, email: &str) -> NewUser {
        NewUser::new(username, email, "s3cret-pass")
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let database = memory_database().await;
        let user = create_user(&database, voter("alice", "alice@Example.org"))
            .await
            .expect("user created");

        assert!(!user.is_election_admin);
        assert!(user.account.is_active);
        assert!(!user.account.is_staff);
        assert!(!user.account.is_superuser);
        assert!(user.account.last_login.is_none());
        assert_eq!(user.email, "alice@example.org");
        assert_eq!(user.to_string(), "alice");
        assert_ne!(user.account.password_hash, "s3cret-pass");
        assert!(user.check_password("s3cret-pass"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let database = memory_database().await;
        create_user(&database, voter("alice", "shared@example.org"))
            .await
            .expect("first user created");

        let err = create_user(&database, voter("bob", "shared@EXAMPLE.org"))
            .await
            .expect_err("duplicate email rejected");
        assert!(matches!(
            err,
            StoreError::UniqueViolation { field: "email", .. }
        ));
        assert_eq!(list_users(&database, 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let database = memory_database().await;
        create_user(&database, voter("alice", "a1@example.org"))
            .await
            .unwrap();
        let err = create_user(&database, voter("alice", "a2@example.org"))
            .await
            .expect_err("duplicate username rejected");
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                field: "username",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn update_keeps_email_unique() {
        let database = memory_database().await;
        let alice = create_user(&database, voter("alice", "alice@example.org"))
            .await
            .unwrap();
        let bob = create_user(&database, voter("bob", "bob@example.org"))
            .await
            .unwrap();

        let patch = UserPatch {
            email: Some("alice@example.org".to_string()),
            ..UserPatch::default()
        };
        let err = update_user(&database, bob.id(), patch)
            .await
            .expect_err("email taken");
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        let keep_own = UserPatch {
            email: Some("alice@example.org".to_string()),
            is_election_admin: Some(true),
            first_name: Some(" Alice ".to_string()),
            ..UserPatch::default()
        };
        let updated = update_user(&database, alice.id(), keep_own)
            .await
            .expect("own email accepted");
        assert!(updated.is_election_admin);
        assert_eq!(updated.account.first_name, "Alice");
    }

    #[tokio::test]
    async fn password_change_and_authentication() {
        let database = memory_database().await;
        let alice = create_user(&database, voter("alice", "alice@example.org"))
            .await
            .unwrap();

        assert!(
            authenticate(&database, "alice", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            authenticate(&database, "nobody", "s3cret-pass")
                .await
                .unwrap()
                .is_none()
        );

        set_password(&database, alice.id(), "new-pass").await.unwrap();
        let signed_in = authenticate(&database, "alice", "new-pass")
            .await
            .unwrap()
            .expect("new password accepted");
        assert!(signed_in.account.last_login.is_some());

        let deactivate = UserPatch {
            is_active: Some(false),
            ..UserPatch::default()
        };
        update_user(&database, alice.id(), deactivate).await.unwrap();
        assert!(
            authenticate(&database, "alice", "new-pass")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_and_lookup() {
        let database = memory_database().await;
        let alice = create_user(&database, voter("alice", "alice@example.org"))
            .await
            .unwrap();

        let found = find_by_username(&database, "alice").await.unwrap();
        assert_eq!(found.map(|u| u.id()), Some(alice.id()));

        delete_user(&database, alice.id()).await.unwrap();
        assert!(matches!(
            get_user(&database, alice.id()).await,
            Err(StoreError::NotFound { entity: "user", .. })
        ));
        assert!(matches!(
            delete_user(&database, alice.id()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    fn raw_row(username: &str, email: &str) -> user::ActiveModel {
        user::ActiveModel {
            id: NotSet,
            username: Set(username.to_string()),
            password: Set("not-a-hash".to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            email: Set(email.to_string()),
            is_staff: Set(false),
            is_active: Set(true),
            is_superuser: Set(false),
            is_election_admin: Set(false),
            last_login: Set(None),
            date_joined: Set(fixed_now()),
        }
    }

    #[tokio::test]
    async fn schema_constraints_map_to_the_violated_field() {
        let database = memory_database().await;
        raw_row("carol", "carol@example.org")
            .insert(&database)
            .await
            .expect("first row inserted");

        // Skip the store's pre-checks so only the table constraints answer.
        let err = raw_row("carol2", "carol@example.org")
            .insert(&database)
            .await
            .expect_err("email is unique");
        match unique_error(err, "carol2", "carol@example.org") {
            StoreError::UniqueViolation { field, value, .. } => {
                assert_eq!((field, value.as_str()), ("email", "carol@example.org"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = raw_row("carol", "other@example.org")
            .insert(&database)
            .await
            .expect_err("username is unique");
        match unique_error(err, "carol", "other@example.org") {
            StoreError::UniqueViolation { field, value, .. } => {
                assert_eq!((field, value.as_str()), ("username", "carol"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
