use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{CorruptRole, NewUser, User, UserRow, UserSummary, UserSummaryRow};
use super::role::Role;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    CorruptRow(#[from] CorruptRole),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Emails are matched case-insensitively: every store entry point folds them
/// through here before touching data.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Persistent record of users. The only owner of `User` rows and hashes.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `DuplicateEmail` if the normalized email is taken.
    async fn insert(&self, new: NewUser) -> Result<User, StoreError>;

    async fn list(&self) -> Result<Vec<UserSummary>, StoreError>;

    /// Returns `false` when no user has `id`.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, StoreError>;

    /// Returns `false` when no user has `id`.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        // unique_violation
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, lastname, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, lastname, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, lastname, email, password_hash, role, created_at
            "#,
        )
        .bind(new.name)
        .bind(new.lastname)
        .bind(normalize_email(&new.email))
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(User::try_from(row)?)
    }

    async fn list(&self) -> Result<Vec<UserSummary>, StoreError> {
        let rows = sqlx::query_as::<_, UserSummaryRow>(
            r#"
            SELECT id, name, lastname, email, role, created_at
            FROM users
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|r| UserSummary::try_from(r).map_err(StoreError::from))
            .collect()
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"UPDATE users SET role = $2 WHERE id = $1"#)
            .bind(id)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
