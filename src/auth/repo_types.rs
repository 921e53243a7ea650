use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::role::Role;

/// Raw `users` row as Postgres returns it; `role` is still untrusted text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: OffsetDateTime,
}

/// Same as `UserRow` minus the hash; used by listing queries.
#[derive(Debug, FromRow)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: String,
    pub role: String,
    pub created_at: OffsetDateTime,
}

/// Credential record. Never serialized; it stays inside the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

/// Projection handed out by listing. There is no hash field to leak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for inserting a user. `role` is chosen by the caller (register always
/// passes the default).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
#[error("user {id} has invalid role '{role}'")]
pub struct CorruptRole {
    pub id: Uuid,
    pub role: String,
}

impl TryFrom<UserRow> for User {
    type Error = CorruptRole;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r.role.parse::<Role>().map_err(|_| CorruptRole {
            id: r.id,
            role: r.role.clone(),
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            lastname: r.lastname,
            email: r.email,
            password_hash: r.password_hash,
            role,
            created_at: r.created_at,
        })
    }
}

impl TryFrom<UserSummaryRow> for UserSummary {
    type Error = CorruptRole;

    fn try_from(r: UserSummaryRow) -> Result<Self, Self::Error> {
        let role = r.role.parse::<Role>().map_err(|_| CorruptRole {
            id: r.id,
            role: r.role.clone(),
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            lastname: r.lastname,
            email: r.email,
            role,
            created_at: r.created_at,
        })
    }
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            lastname: u.lastname.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at,
        }
    }
}
