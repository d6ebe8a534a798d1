/// Authentication extractors
use crate::{
    api::middleware::extract_bearer_token,
    auth::{require_role, Claims, Role},
    context::AppContext,
    error::WishlistError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates the session token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = WishlistError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| WishlistError::InvalidToken("Missing authorization header".to_string()))?;

        let claims = state.auth.verify_token(&token)?;

        Ok(AuthContext { claims })
    }
}

/// Admin authentication context - requires the admin role exactly
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = WishlistError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { claims } = AuthContext::from_request_parts(parts, state).await?;

        if !require_role(&claims, Role::Admin) {
            tracing::debug!(
                "User {} with role {} denied admin operation",
                claims.id,
                claims.role.as_str()
            );
            return Err(WishlistError::Forbidden);
        }

        Ok(AdminAuthContext { claims })
    }
}

/// Raw bearer token, signature and expiry unchecked (used by refresh)
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = WishlistError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers)
            .map(BearerToken)
            .ok_or_else(|| WishlistError::InvalidToken("Missing authorization header".to_string()))
    }
}
