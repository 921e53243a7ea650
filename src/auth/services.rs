use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    claims::{Claims, Identity},
    dto::RegisterRequest,
    extractors::AdminUser,
    password::Hasher,
    repo::normalize_email,
    repo_types::{NewUser, UserSummary},
    role::Role,
};
use crate::{
    config::BootstrapAdmin,
    error::{AuthError, AuthResult},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;
// column widths in the users table
const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn optional_text(value: Option<String>, field: &str) -> AuthResult<Option<String>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        Some(v) if v.chars().count() > MAX_NAME_LEN => Err(AuthError::invalid_input(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        ))),
        other => Ok(other),
    }
}

fn validate_new_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::invalid_input("Email and password are required"));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(AuthError::invalid_input(format!(
            "Email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    if !is_valid_email(email) {
        return Err(AuthError::invalid_input("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::invalid_input("Password too short"));
    }
    Ok(())
}

// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_off_thread(hasher: &Hasher, plain: &str) -> AuthResult<String> {
    let hasher = hasher.clone();
    let plain = plain.to_owned();
    let joined = tokio::task::spawn_blocking(move || hasher.hash(&plain)).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(AuthError::Internal(format!("hash task failed: {e}"))),
    }
}

async fn verify_off_thread(hasher: &Hasher, plain: &str, hash: &str) -> AuthResult<bool> {
    let hasher = hasher.clone();
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    let joined = tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash)).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(AuthError::Internal(format!("verify task failed: {e}"))),
    }
}

/// Creates a `user`-role account. Does not log the caller in.
pub async fn register(state: &AppState, req: RegisterRequest) -> AuthResult<UserSummary> {
    let email = normalize_email(&req.email);
    validate_new_credentials(&email, &req.password)?;
    let name = optional_text(req.name, "Name")?;
    let lastname = optional_text(req.lastname, "Lastname")?;

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash = hash_off_thread(&state.hasher, &req.password).await?;

    // insert still reports DuplicateEmail if a concurrent register won the race
    let user = state
        .store
        .insert(NewUser {
            name,
            lastname,
            email,
            password_hash,
            role: Role::default(),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(UserSummary::from(&user))
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: Claims,
}

impl LoginOutcome {
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.claims.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

pub async fn login(state: &AppState, email: &str, password: &str) -> AuthResult<LoginOutcome> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::invalid_input("Email and password are required"));
    }

    let Some(user) = state.store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        // spend a hash's worth of time so a missing account is not observable
        hash_off_thread(&state.hasher, password).await?;
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_off_thread(&state.hasher, password, &user.password_hash).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let (token, claims) = state.keys.sign(&Identity {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    })?;

    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(LoginOutcome { token, claims })
}

pub async fn list_users(state: &AppState, admin: &AdminUser) -> AuthResult<Vec<UserSummary>> {
    let users = state.store.list().await?;
    info!(admin_id = %admin.claims().sub, count = users.len(), "users listed");
    Ok(users)
}

/// Sets `target`'s role to `new_role`. Setting the current role again succeeds.
///
/// A missing `target` is `NotFound`: there is no account to hold the role. This
/// differs from [`delete_user`], where a missing account already satisfies the
/// request.
pub async fn change_role(
    state: &AppState,
    admin: &AdminUser,
    target: Uuid,
    new_role: &str,
) -> AuthResult<Role> {
    let role = new_role
        .trim()
        .parse::<Role>()
        .map_err(|e| AuthError::invalid_input(e.to_string()))?;

    if !state.store.set_role(target, role).await? {
        warn!(admin_id = %admin.claims().sub, target = %target, "change_role on unknown user");
        return Err(AuthError::NotFound);
    }

    info!(admin_id = %admin.claims().sub, target = %target, role = %role, "role changed");
    Ok(role)
}

/// Deleting an id that does not exist is a success, unlike [`change_role`].
pub async fn delete_user(state: &AppState, admin: &AdminUser, target: Uuid) -> AuthResult<()> {
    let existed = state.store.delete(target).await?;
    info!(admin_id = %admin.claims().sub, target = %target, existed, "user deleted");
    Ok(())
}

/// Makes sure the configured administrator exists and holds the admin role.
pub async fn bootstrap_admin(state: &AppState, admin: &BootstrapAdmin) -> AuthResult<()> {
    let email = normalize_email(&admin.email);
    validate_new_credentials(&email, &admin.password)?;

    match state.store.find_by_email(&email).await? {
        Some(user) if user.role == Role::Admin => {
            info!(user_id = %user.id, "bootstrap admin present");
        }
        Some(user) => {
            state.store.set_role(user.id, Role::Admin).await?;
            info!(user_id = %user.id, "bootstrap admin promoted");
        }
        None => {
            let password_hash = hash_off_thread(&state.hasher, &admin.password).await?;
            let user = state
                .store
                .insert(NewUser {
                    name: None,
                    lastname: None,
                    email,
                    password_hash,
                    role: Role::Admin,
                })
                .await?;
            info!(user_id = %user.id, "bootstrap admin created");
        }
    }
    Ok(())
}
