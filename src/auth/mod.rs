/// Authentication: login checks and stateless session tokens
///
/// Session tokens are HS512 JWTs carrying the user id, role level and the
/// must-reset-password flag. Nothing about a session is stored server side,
/// so a token stays usable until it expires.

pub mod extract;
pub mod password;
mod roles;

pub use roles::{Capability, Role};

use crate::{
    clock::Clock,
    config::AuthConfig,
    error::{WishlistError, WishlistResult},
    metrics,
    store::{UserFilter, UserId, UserStore},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    pub password_reset: bool,
}

/// Claims embedded in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    #[serde(rename = "userlevel")]
    pub role: Role,
    #[serde(rename = "passwordreset")]
    pub password_reset: bool,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issue time, unix seconds
    pub orig_iat: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role: self.role,
            password_reset: self.password_reset,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }
}

/// Exact role check used to gate admin-only operations
pub fn require_role(claims: &Claims, role: Role) -> bool {
    claims.role == role
}

/// A signed session token and when it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks session tokens
pub struct AuthService {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    timeout: Duration,
    max_refresh: Duration,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            users,
            clock,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            timeout: Duration::seconds(config.token_ttl_secs),
            max_refresh: Duration::seconds(config.max_refresh_secs),
        }
    }

    /// Check a username/password pair
    ///
    /// Unknown user and wrong password both come back as
    /// `InvalidCredentials`; only the failed-login metric tells them apart.
    pub async fn authenticate(&self, username: &str, password: &str) -> WishlistResult<Identity> {
        let username = username.trim().to_lowercase();

        let user = self
            .users
            .find_user(&UserFilter::Username(username.clone()))
            .await
            .map_err(|e| {
                tracing::error!("Login: failed to look up user {}: {}", username, e);
                WishlistError::StorageError(e.to_string())
            })?;

        let Some(user) = user else {
            tracing::warn!("Login failed: {}", username);
            metrics::record_failed_login(metrics::LOGIN_FAILED_USER);
            return Err(WishlistError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password_hash) {
            tracing::warn!("Login failed: {}", username);
            metrics::record_failed_login(metrics::LOGIN_FAILED_PASSWORD);
            return Err(WishlistError::InvalidCredentials);
        }

        tracing::debug!("Successful login: {}", username);
        Ok(Identity {
            id: user.id,
            role: user.role,
            password_reset: user.password_reset,
        })
    }

    /// Authenticate and issue a session token in one step
    pub async fn login(&self, username: &str, password: &str) -> WishlistResult<SessionToken> {
        let identity = self.authenticate(username, password).await?;
        self.issue_token(identity)
    }

    /// Sign a new session token for `identity`
    pub fn issue_token(&self, identity: Identity) -> WishlistResult<SessionToken> {
        let now = self.clock.now();
        let expires_at = now + self.timeout;

        let claims = Claims {
            id: identity.id,
            role: identity.role,
            password_reset: identity.password_reset,
            exp: expires_at.timestamp(),
            orig_iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)
            .map_err(|e| WishlistError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(SessionToken { token, expires_at })
    }

    /// Check signature and expiry and return the claims
    pub fn verify_token(&self, token: &str) -> WishlistResult<Claims> {
        let claims = self.decode_signed(token)?;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(WishlistError::ExpiredToken);
        }

        Ok(claims)
    }

    /// Reissue a token with the same identity
    ///
    /// Accepted until `max_refresh` past the original token's expiry.
    pub fn refresh_token(&self, token: &str) -> WishlistResult<SessionToken> {
        let claims = self.decode_signed(token)?;

        let expired_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| WishlistError::InvalidToken("Bad expiry".to_string()))?;
        if self.clock.now() > expired_at + self.max_refresh {
            tracing::debug!("Refresh refused for user {}: window closed", claims.id);
            return Err(WishlistError::ExpiredToken);
        }

        self.issue_token(claims.identity())
    }

    /// Verify the signature only; expiry is checked by the callers
    fn decode_signed(&self, token: &str) -> WishlistResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        WishlistError::InvalidToken("Invalid token signature".to_string())
                    }
                    _ => WishlistError::InvalidToken("Malformed token".to_string()),
                }
            })
    }
}
