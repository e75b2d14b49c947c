//! Account rows. The generic account columns and the election-specific
//! columns live in one flat table; `crate::accounts::User` regroups them.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique, column_type = "String(StringLen::N(150))")]
    pub username: String,
    /// Encoded Argon2 hash, never the raw password
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub password: String,
    #[sea_orm(column_type = "String(StringLen::N(150))")]
    pub first_name: String,
    #[sea_orm(column_type = "String(StringLen::N(150))")]
    pub last_name: String,
    #[sea_orm(unique, column_type = "String(StringLen::N(254))")]
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_election_admin: bool,
    pub last_login: Option<DateTimeWithTimeZone>,
    pub date_joined: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
