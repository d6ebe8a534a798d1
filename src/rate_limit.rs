/// Rate limiting for the credential endpoints
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{WishlistError, WishlistResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Shared limiter for login, registration and password-forgot requests
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { limiter: None };
        }

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Some(Arc::new(GovernorLimiter::direct(Quota::per_minute(per_minute)))),
        }
    }

    /// Take one request from the quota
    pub fn check(&self) -> WishlistResult<()> {
        match &self.limiter {
            Some(limiter) => limiter
                .check()
                .map_err(|_| WishlistError::RateLimitExceeded),
            None => Ok(()),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = ctx.rate_limiter.check() {
        tracing::warn!(
            "Rate limit exceeded: {} {}",
            request.method(),
            request.uri().path()
        );
        return e.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhaustion() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: 3,
        });

        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(matches!(
            limiter.check(),
            Err(WishlistError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_disabled_limiter_never_refuses() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
        });

        for _ in 0..100 {
            assert!(limiter.check().is_ok());
        }
    }

    #[test]
    fn test_clones_share_quota() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: 1,
        });
        let other = limiter.clone();

        assert!(limiter.check().is_ok());
        assert!(other.check().is_err());
    }
}
