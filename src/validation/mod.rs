/// Request validation
///
/// Request bodies are trimmed (passwords excepted) and then checked with
/// `validator` rules before any workflow sees them.
use crate::{
    error::{WishlistError, WishlistResult},
    metrics,
    store::ResetToken,
};
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Minimum password length, exclusive
pub const PASSWORD_MIN_LEN: usize = 10;

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule("not_blank", "must not be blank"));
    }
    Ok(())
}

pub fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(char::is_alphanumeric) {
        return Err(rule("alphanumeric", "must contain only letters and digits"));
    }
    Ok(())
}

pub fn validate_alphabetic(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || !value.chars().all(char::is_alphabetic) {
        return Err(rule("alphabetic", "must contain only letters"));
    }
    Ok(())
}

/// Longer than ten characters with an upper and a lower case letter, a
/// digit, and a punctuation mark or symbol
pub fn validate_password_complexity(password: &str) -> Result<(), ValidationError> {
    let password = password.trim();

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;
    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_numeric() {
            has_digit = true;
        } else if !c.is_whitespace() && !c.is_control() {
            has_special = true;
        }
    }

    if password.chars().count() > PASSWORD_MIN_LEN && has_upper && has_lower && has_digit && has_special
    {
        Ok(())
    } else {
        Err(rule(
            "password_complexity",
            "must be longer than 10 characters and mix upper case, lower case, digits and symbols",
        ))
    }
}

/// Reset tokens are exactly 40 alphanumeric characters
pub fn validate_reset_token(token: &str) -> WishlistResult<()> {
    let token = token.trim();
    if token.len() == ResetToken::LEN && token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(());
    }

    metrics::record_user_error(metrics::REQUEST_DATA_VALIDATION_ERROR);
    Err(WishlistError::Validation(
        "pwResetToken: must be 40 alphanumeric characters".to_string(),
    ))
}

/// Request bodies that trim their text fields before validation
pub trait Trim {
    fn trimmed(self) -> Self;
}

/// Trim and validate a request body
pub fn accept<T: Trim + Validate>(request: T) -> WishlistResult<T> {
    let request = request.trimmed();
    request.validate().map_err(|e| {
        tracing::debug!("Request failed data validation: {}", e);
        metrics::record_user_error(metrics::REQUEST_DATA_VALIDATION_ERROR);
        WishlistError::Validation(e.to_string())
    })?;
    Ok(request)
}

fn trim(value: String) -> String {
    value.trim().to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl Trim for LoginRequest {
    fn trimmed(self) -> Self {
        Self {
            username: trim(self.username),
            password: self.password,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3), custom(function = "validate_alphanumeric"))]
    pub username: String,
    #[validate(custom(function = "validate_password_complexity"))]
    pub password: String,
    #[validate(email)]
    pub email: String,
    #[serde(rename = "firstname", alias = "first_name")]
    #[validate(custom(function = "validate_alphabetic"))]
    pub first_name: String,
    #[serde(rename = "lastname", alias = "last_name")]
    #[validate(custom(function = "validate_alphabetic"))]
    pub last_name: String,
}

impl Trim for RegisterRequest {
    fn trimmed(self) -> Self {
        Self {
            username: trim(self.username),
            password: self.password,
            email: trim(self.email),
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PasswordForgotRequest {
    #[validate(email)]
    pub email: String,
}

impl Trim for PasswordForgotRequest {
    fn trimmed(self) -> Self {
        Self {
            email: trim(self.email),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(custom(function = "validate_password_complexity"))]
    pub password: String,
    #[validate(email)]
    pub email: String,
}

impl Trim for PasswordResetRequest {
    fn trimmed(self) -> Self {
        Self {
            password: self.password,
            email: trim(self.email),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(url)]
    pub url: String,
    pub rank: i64,
}

impl Trim for AddItemRequest {
    fn trimmed(self) -> Self {
        Self {
            name: trim(self.name),
            url: trim(self.url),
            rank: self.rank,
        }
    }
}
