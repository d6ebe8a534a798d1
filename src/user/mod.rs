/// User workflows: registration and the password reset lifecycle
///
/// Reset tokens are 40 hex characters, valid for one hour, and stored on the
/// user record. Requesting a new one replaces the old one.
use crate::{
    auth::{password, Role},
    clock::Clock,
    error::{WishlistError, WishlistResult},
    mailer::Notifier,
    store::{
        NewUser, ResetToken, StoreError, User, UserCondition, UserFilter, UserPatch, UserStore,
    },
};
use chrono::Duration;
use std::sync::Arc;

/// How long a reset token stays valid after issuance
pub const RESET_TOKEN_TTL_SECS: i64 = 3600;

pub const RESET_EMAIL_SUBJECT: &str = "Wishlist Password Reset";

/// Registration details, already validated by the transport layer
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// User workflow service
pub struct UserService {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn reset_email_body(host_url: &str, token: &str, username: &str) -> String {
    format!(
        "You are receiving this because you (or someone else) requested the reset of the password for your account.\n\n\
         Please click the following link, or paste into your browser to complete the process:\n\n\
         https://{}/password_reset/{}\n\n\
         Username: {}\n\n\
         If you did not request this, please ignore this email and your password will remain unchanged.",
        host_url, token, username
    )
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            notifier,
            clock,
        }
    }

    /// Register a new user at the default role
    ///
    /// The existence checks give friendly errors; the store's uniqueness
    /// constraint decides when two registrations race.
    pub async fn register_user(&self, registration: Registration) -> WishlistResult<User> {
        let username = normalize(&registration.username);
        let email = normalize(&registration.email);

        if self.exists(UserFilter::Username(username.clone())).await? {
            tracing::debug!("Username taken: {}", username);
            return Err(WishlistError::UsernameTaken);
        }
        if self.exists(UserFilter::Email(email.clone())).await? {
            tracing::debug!("Email taken: {}", email);
            return Err(WishlistError::EmailTaken);
        }

        let password_hash = password::hash_password(&registration.password).map_err(|e| {
            tracing::error!("User registration password hash failed: {}", e);
            WishlistError::RegistrationError
        })?;

        let user = self
            .users
            .create_user(NewUser {
                username,
                password_hash,
                role: Role::User,
                email,
                first_name: registration.first_name.trim().to_string(),
                last_name: registration.last_name.trim().to_string(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { field: "username" } => WishlistError::UsernameTaken,
                StoreError::Duplicate { field: "email" } => WishlistError::EmailTaken,
                other => {
                    tracing::error!("User registration insert failed: {}", other);
                    WishlistError::RegistrationError
                }
            })?;

        tracing::info!("Registered new user {} ({})", user.username, user.id);
        Ok(user)
    }

    async fn exists(&self, filter: UserFilter) -> WishlistResult<bool> {
        self.users
            .find_user(&filter)
            .await
            .map(|user| user.is_some())
            .map_err(|e| {
                tracing::error!("User registration lookup failed: {}", e);
                WishlistError::RegistrationError
            })
    }

    /// Issue a reset token for the account behind `email` and mail the link
    ///
    /// The token is persisted before the mail goes out; if sending fails the
    /// call fails but the token stays valid.
    pub async fn password_forgot(&self, email: &str, host_url: &str) -> WishlistResult<()> {
        let email = normalize(email);

        let user = self
            .users
            .find_user(&UserFilter::Email(email.clone()))
            .await
            .map_err(|e| {
                tracing::error!("PasswordForgot: failed lookup for {}: {}", email, e);
                WishlistError::PasswordForgotError
            })?
            .ok_or_else(|| {
                tracing::warn!("PasswordForgot: no user record for {}", email);
                WishlistError::PasswordForgotError
            })?;

        let reset = ResetToken {
            token: password::generate_reset_token(),
            expires_at: self.clock.now() + Duration::seconds(RESET_TOKEN_TTL_SECS),
        };

        let patch = UserPatch {
            reset: Some(Some(reset.clone())),
            ..Default::default()
        };
        match self.users.update_user(user.id, patch).await {
            Ok(1) => {}
            Ok(_) => {
                tracing::error!("PasswordForgot: user {} vanished before update", user.id);
                return Err(WishlistError::PasswordForgotError);
            }
            Err(e) => {
                tracing::error!("PasswordForgot: failed to store reset token: {}", e);
                return Err(WishlistError::PasswordForgotError);
            }
        }

        let body = reset_email_body(host_url, &reset.token, &user.username);
        self.notifier
            .send(&email, RESET_EMAIL_SUBJECT, &body)
            .await
            .map_err(|e| {
                tracing::error!("PasswordForgot: error sending reset email: {}", e);
                WishlistError::PasswordForgotError
            })?;

        tracing::info!("Password reset started for user {}", user.id);
        Ok(())
    }

    /// Whether `token` is a live reset token
    ///
    /// Unknown, malformed or expired tokens are `Ok(false)`; only a store
    /// failure is an error. Never changes any state.
    pub async fn password_reset_token_validate(&self, token: &str) -> WishlistResult<bool> {
        if token.len() != ResetToken::LEN {
            tracing::debug!("Password reset token has wrong length");
            return Ok(false);
        }

        let user = self
            .users
            .find_user(&UserFilter::ResetToken(token.to_string()))
            .await
            .map_err(|e| {
                tracing::error!("PasswordResetTokenValidate: failed lookup: {}", e);
                WishlistError::ValidateServerError
            })?;

        let now = self.clock.now();
        let valid = user
            .and_then(|user| user.reset)
            .map(|reset| reset.accepts(token, now))
            .unwrap_or(false);

        tracing::debug!("Password reset token valid: {}", valid);
        Ok(valid)
    }

    /// Set a new password using a live reset token, consuming the token
    pub async fn password_reset(
        &self,
        email: &str,
        new_password: &str,
        token: &str,
    ) -> WishlistResult<()> {
        let email = normalize(email);

        let token_valid = match self.password_reset_token_validate(token).await {
            Ok(valid) => valid,
            Err(_) => return Err(WishlistError::ResetError),
        };
        if !token_valid {
            tracing::debug!("Password reset for {} had an invalid token", email);
            return Err(WishlistError::ValidateError);
        }

        let user = self
            .users
            .find_user(&UserFilter::Email(email.clone()))
            .await
            .map_err(|e| {
                tracing::error!("PasswordReset: failed lookup for {}: {}", email, e);
                WishlistError::ResetError
            })?
            .ok_or_else(|| {
                tracing::warn!("PasswordReset: no user record for {}", email);
                WishlistError::ResetError
            })?;

        // The token may belong to someone else or have been superseded
        let owns_token = user
            .reset
            .as_ref()
            .map(|reset| reset.token == token)
            .unwrap_or(false);
        if !owns_token {
            tracing::error!("PasswordReset: token does not match the one stored for user {}", user.id);
            return Err(WishlistError::ValidateError);
        }

        let password_hash = password::hash_password(new_password).map_err(|e| {
            tracing::error!("PasswordReset: hash failed: {}", e);
            WishlistError::ResetError
        })?;

        let patch = UserPatch {
            password_hash: Some(password_hash),
            password_reset: Some(false),
            reset: Some(None),
        };
        // Spends the token only if it is still the live one
        let expected = UserCondition::HoldsResetToken {
            token: token.to_string(),
            now: self.clock.now(),
        };
        match self.users.update_user_if(user.id, expected, patch).await {
            Ok(1) => {
                tracing::info!("Password reset for user {}", user.id);
                Ok(())
            }
            Ok(_) => {
                tracing::warn!("PasswordReset: token for user {} was spent or replaced", user.id);
                Err(WishlistError::ValidateError)
            }
            Err(e) => {
                tracing::error!("PasswordReset: failed to update user {}: {}", user.id, e);
                Err(WishlistError::ResetError)
            }
        }
    }
}
