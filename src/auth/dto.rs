use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{claims::Claims, repo_types::UserSummary, role::Role};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Role arrives as text so an unknown value is an input error, not a JSON rejection.
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub id: Uuid,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Uuid,
}

/// Plain acknowledgment.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
    pub message: &'static str,
}

impl Ack {
    pub fn new(message: &'static str) -> Self {
        Self { ok: true, message }
    }
}

/// Public part of the user returned with a login.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MeUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for MeUser {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            email: c.email,
            role: c.role,
            iat: c.iat,
            exp: c.exp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: MeUser,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub ok: bool,
    pub users: Vec<UserSummary>,
}
