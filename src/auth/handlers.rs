use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            Ack, ChangeRoleRequest, DeleteUserRequest, LoginRequest, LoginResponse, MeResponse,
            PublicUser, RegisterRequest, UsersResponse,
        },
        extractors::{AdminUser, AuthUser, Payload},
        services,
    },
    error::AuthResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/change-role", post(change_role))
        .route("/admin/delete-user", post(delete_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<Ack>)> {
    services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(Ack::new("User registered"))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> AuthResult<Json<LoginResponse>> {
    let outcome = services::login(&state, &payload.email, &payload.password).await?;
    let expires_at = outcome.expires_at();
    let claims = outcome.claims;
    Ok(Json(LoginResponse {
        ok: true,
        token: outcome.token,
        role: claims.role,
        expires_at,
        user: PublicUser {
            id: claims.sub,
            email: claims.email,
        },
    }))
}

/// Tokens are not tracked server-side; the client discards its copy.
pub async fn logout() -> Json<Ack> {
    Json(Ack::new("Logged out"))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        ok: true,
        user: claims.into(),
    })
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
) -> AuthResult<Json<UsersResponse>> {
    let users = services::list_users(&state, &admin).await?;
    Ok(Json(UsersResponse { ok: true, users }))
}

#[instrument(skip(state, admin))]
pub async fn change_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Payload(payload): Payload<ChangeRoleRequest>,
) -> AuthResult<Json<Ack>> {
    services::change_role(&state, &admin, payload.id, &payload.role).await?;
    Ok(Json(Ack::new("Role updated")))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Payload(payload): Payload<DeleteUserRequest>,
) -> AuthResult<Json<Ack>> {
    services::delete_user(&state, &admin, payload.id).await?;
    Ok(Json(Ack::new("User deleted")))
}
