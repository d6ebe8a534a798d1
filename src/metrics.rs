/// Metrics for the wishlist service
///
/// Prometheus counters for failed logins, registrations, and the error
/// paths of the user and item workflows.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

pub const LOGIN_FAILED_USER: &str = "login_invalid_user";
pub const LOGIN_FAILED_PASSWORD: &str = "login_invalid_password";

pub const REQUEST_DATA_VALIDATION_ERROR: &str = "data_validation_error";
pub const USER_REG_FAILED_ERROR: &str = "user_reg_error";
pub const USER_PASSWORD_FORGOT_ERROR: &str = "user_pwforgot_error";
pub const USER_PASSWORD_RESET_VALIDATE_ERROR: &str = "user_pwresetvalidate_error";
pub const USER_PASSWORD_RESET_ERROR: &str = "user_pwreset_error";

pub const ITEM_GET_ERROR: &str = "item_get_error";
pub const ITEM_ADD_ERROR: &str = "item_add_error";
pub const ITEM_EDIT_ERROR: &str = "item_edit_error";
pub const ITEM_DELETE_ERROR: &str = "item_delete_error";

lazy_static! {
    /// Failed logins by cause; callers never see the distinction
    pub static ref FAILED_LOGIN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "wishlist_api_failed_login_total",
        "The total number of failed logins",
        &["login_error"]
    )
    .unwrap();

    pub static ref USERS_REGISTERED_TOTAL: IntCounter = register_int_counter!(
        "wishlist_api_users_registered_total",
        "The total number of new registered users"
    )
    .unwrap();

    pub static ref USER_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "wishlist_api_user_errors",
        "The total number of errors encountered when dealing with users",
        &["user_error"]
    )
    .unwrap();

    pub static ref ITEM_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "wishlist_api_item_errors",
        "Errors encountered when dealing with items",
        &["item_error"]
    )
    .unwrap();

    /// Total HTTP requests by method and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_failed_login(reason: &str) {
    FAILED_LOGIN_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_user_registered() {
    USERS_REGISTERED_TOTAL.inc();
}

pub fn record_user_error(kind: &str) {
    USER_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_item_error(kind: &str) {
    ITEM_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_http_request(method: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_login_reasons_are_separate_series() {
        let before_user = FAILED_LOGIN_TOTAL.with_label_values(&[LOGIN_FAILED_USER]).get();
        let before_pw = FAILED_LOGIN_TOTAL
            .with_label_values(&[LOGIN_FAILED_PASSWORD])
            .get();

        record_failed_login(LOGIN_FAILED_USER);

        assert!(FAILED_LOGIN_TOTAL.with_label_values(&[LOGIN_FAILED_USER]).get() > before_user);
        assert!(
            FAILED_LOGIN_TOTAL
                .with_label_values(&[LOGIN_FAILED_PASSWORD])
                .get()
                >= before_pw
        );
    }

    #[test]
    fn test_metrics_rendering() {
        record_user_registered();
        record_item_error(ITEM_ADD_ERROR);
        record_http_request("GET", 200);

        let metrics = render_metrics();
        assert!(metrics.contains("wishlist_api_users_registered_total"));
        assert!(metrics.contains("wishlist_api_item_errors"));
        assert!(metrics.contains("http_requests_total"));
    }
}
