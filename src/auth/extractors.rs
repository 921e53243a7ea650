use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys, role::Role};
use crate::error::AuthError;

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::Unauthenticated)?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::Unauthenticated)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthenticated);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    Ok(token)
}

/// Header check plus signature/expiry verification.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<Claims, AuthError> {
    let token = bearer_token(headers)?;
    keys.verify(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AuthError::Unauthenticated
    })
}

/// Role check; only ever applied to claims that came out of `authenticate`.
pub fn require_role(claims: &Claims, required: Role) -> Result<(), AuthError> {
    if claims.role == required {
        Ok(())
    } else {
        warn!(user_id = %claims.sub, role = %claims.role, required = %required, "forbidden");
        Err(AuthError::Forbidden)
    }
}

/// Verified claims of the caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys).map(AuthUser)
    }
}

/// Proof that the caller passed authentication and then the admin check.
/// Only `AdminUser::check` builds one, so admin-only operations ask for it.
#[derive(Debug, Clone)]
pub struct AdminUser(Claims);

impl AdminUser {
    pub fn check(user: AuthUser) -> Result<Self, AuthError> {
        require_role(&user.0, Role::Admin)?;
        Ok(AdminUser(user.0))
    }

    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        AdminUser::check(user)
    }
}

/// JSON body whose rejections come back as `InvalidInput`.
#[derive(Debug)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AuthError::invalid_input(e.body_text()))?;
        Ok(Payload(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::Identity, jwt::test_keys};
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn token_for(keys: &JwtKeys, role: Role) -> String {
        keys.sign(&Identity {
            id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            role,
        })
        .unwrap()
        .0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers_with("bearer abc")).unwrap(), "abc");
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers_with("Bearer ")).is_err());
        assert!(bearer_token(&headers_with("abc.def")).is_err());
    }

    #[test]
    fn authenticate_binds_verified_claims() {
        let keys = test_keys("gate-secret");
        let token = token_for(&keys, Role::Viewer);
        let claims = authenticate(&headers_with(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(claims.role, Role::Viewer);
    }

    #[test]
    fn authenticate_rejects_missing_and_foreign_tokens() {
        let keys = test_keys("gate-secret");
        assert!(matches!(
            authenticate(&HeaderMap::new(), &keys),
            Err(AuthError::Unauthenticated)
        ));
        let foreign = token_for(&test_keys("other-secret"), Role::Admin);
        assert!(matches!(
            authenticate(&headers_with(&format!("Bearer {foreign}")), &keys),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn admin_check_requires_admin_role() {
        let keys = test_keys("gate-secret");
        for role in [Role::User, Role::Viewer] {
            let claims = keys.verify(&token_for(&keys, role)).unwrap();
            assert!(matches!(
                AdminUser::check(AuthUser(claims)),
                Err(AuthError::Forbidden)
            ));
        }
        let claims = keys.verify(&token_for(&keys, Role::Admin)).unwrap();
        let admin = AdminUser::check(AuthUser(claims)).unwrap();
        assert_eq!(admin.claims().role, Role::Admin);
    }
}
