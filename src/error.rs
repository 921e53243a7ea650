//! Error taxonomy shared by every operation, and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::{jwt::TokenError, password::PasswordError, repo::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Email already registered")]
    DuplicateEmail,
    /// Unknown email and wrong password both land here.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("User not found")]
    NotFound,
    /// The detail is logged, never sent.
    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AuthError::InvalidInput(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "INVALID_INPUT",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal error");
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (self.status(), body).into_response()
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(detail) => AuthError::Internal(detail),
            TokenError::InvalidSignature | TokenError::Expired | TokenError::Malformed => {
                AuthError::Unauthenticated
            }
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_is_not_sent() {
        let (status, body) =
            body_json(AuthError::Internal("relation \"users\" does not exist".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL");
        assert_eq!(body["error"]["message"], "Internal server error");
        assert!(!body.to_string().contains("relation"));
    }

    #[tokio::test]
    async fn statuses_follow_the_taxonomy() {
        let cases = [
            (AuthError::invalid_input("email is required"), StatusCode::BAD_REQUEST),
            (AuthError::DuplicateEmail, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            let code = err.code();
            let (status, body) = body_json(err).await;
            assert_eq!(status, expected);
            assert_eq!(body["error"]["code"], code);
        }
    }

    #[test]
    fn token_failures_become_unauthenticated() {
        for e in [TokenError::InvalidSignature, TokenError::Expired, TokenError::Malformed] {
            assert!(matches!(AuthError::from(e), AuthError::Unauthenticated));
        }
        assert!(matches!(
            AuthError::from(TokenError::Signing("boom".into())),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn store_duplicate_maps_through() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(
            AuthError::from(StoreError::Database(sqlx::Error::PoolTimedOut)),
            AuthError::Internal(_)
        ));
    }
}
