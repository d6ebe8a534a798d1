/// API routes and handlers
pub mod item;
pub mod middleware;
pub mod user;

use crate::{
    context::AppContext,
    error::{WishlistError, WishlistResult},
    metrics,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path,
    },
    Json, Router,
};

/// Build API routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .nest("/user", user::routes(ctx))
        .nest("/item", item::routes())
}

/// Unwrap a JSON body, reporting malformed input as a validation failure
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> WishlistResult<T> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e.body_text());
        metrics::record_user_error(metrics::REQUEST_DATA_VALIDATION_ERROR);
        WishlistError::Validation(e.body_text())
    })
}

/// Unwrap path parameters, reporting unparseable ones as a validation failure
pub(crate) fn path_params<T>(params: Result<Path<T>, PathRejection>) -> WishlistResult<T> {
    params.map(|Path(value)| value).map_err(|e| {
        tracing::debug!("Rejected path parameters: {}", e.body_text());
        WishlistError::Validation(e.body_text())
    })
}
