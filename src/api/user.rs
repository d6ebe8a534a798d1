/// User endpoints: login, token refresh, registration and password reset
use crate::{
    api::{json_body, path_params},
    auth::{
        extract::{AuthContext, BearerToken},
        SessionToken,
    },
    context::AppContext,
    error::{GenericResponse, WishlistError, WishlistResult},
    metrics,
    rate_limit::rate_limit_middleware,
    user::Registration,
    validation::{
        accept, validate_reset_token, LoginRequest, PasswordForgotRequest, PasswordResetRequest,
        RegisterRequest,
    },
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Login and refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub code: u16,
    pub message: String,
    pub token: String,
    /// RFC 3339 expiry
    pub expire: String,
}

impl TokenResponse {
    fn new(message: &str, session: SessionToken) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.to_string(),
            token: session.token,
            expire: session.expires_at.to_rfc3339(),
        }
    }
}

/// Build user routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let limited = || middleware::from_fn_with_state(ctx.clone(), rate_limit_middleware);

    Router::new()
        .route(
            "/auth",
            get(check_token).merge(post(login).route_layer(limited())),
        )
        .route("/auth/refresh", post(refresh))
        .route("/register", post(register).route_layer(limited()))
        .route("/password_forgot", post(password_forgot).route_layer(limited()))
        .route(
            "/password_reset/:token",
            get(password_reset_validate).post(password_reset),
        )
}

async fn login(
    State(ctx): State<AppContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> WishlistResult<Json<TokenResponse>> {
    let request = accept(json_body(payload)?)?;
    let session = ctx.auth.login(&request.username, &request.password).await?;
    Ok(Json(TokenResponse::new("Login Successful", session)))
}

async fn check_token(auth: AuthContext) -> Json<GenericResponse> {
    tracing::debug!("Token valid for user {}", auth.claims.id);
    Json(GenericResponse::new(StatusCode::OK, "Token Valid"))
}

async fn refresh(
    State(ctx): State<AppContext>,
    BearerToken(token): BearerToken,
) -> WishlistResult<Json<TokenResponse>> {
    let session = ctx.auth.refresh_token(&token)?;
    Ok(Json(TokenResponse::new("Token Refreshed", session)))
}

async fn register(
    State(ctx): State<AppContext>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let request = accept(json_body(payload)?)?;

    let user = ctx
        .users
        .register_user(Registration {
            username: request.username,
            password: request.password,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
        })
        .await
        .map_err(|e| {
            metrics::record_user_error(metrics::USER_REG_FAILED_ERROR);
            e
        })?;

    tracing::info!("Registered new user: {}:{}", user.username, user.email);
    metrics::record_user_registered();
    Ok(Json(GenericResponse::new(StatusCode::OK, "User Created.")))
}

async fn password_forgot(
    State(ctx): State<AppContext>,
    payload: Result<Json<PasswordForgotRequest>, JsonRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let request = accept(json_body(payload)?)?;

    ctx.users
        .password_forgot(&request.email, &ctx.config.service.public_host)
        .await
        .map_err(|e| {
            metrics::record_user_error(metrics::USER_PASSWORD_FORGOT_ERROR);
            e
        })?;

    Ok(Json(GenericResponse::new(
        StatusCode::OK,
        "Sending an Email to the provided address.",
    )))
}

async fn password_reset_validate(
    State(ctx): State<AppContext>,
    token: Result<Path<String>, PathRejection>,
) -> WishlistResult<(StatusCode, Json<GenericResponse>)> {
    let token = path_params(token)?;
    validate_reset_token(&token)?;

    let valid = ctx
        .users
        .password_reset_token_validate(token.trim())
        .await
        .map_err(|e| {
            metrics::record_user_error(metrics::USER_PASSWORD_RESET_VALIDATE_ERROR);
            e
        })?;

    if !valid {
        let status = StatusCode::BAD_REQUEST;
        return Ok((
            status,
            Json(GenericResponse::new(
                status,
                "Password reset token is invalid or expired.",
            )),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(GenericResponse::new(StatusCode::OK, "Token Valid")),
    ))
}

async fn password_reset(
    State(ctx): State<AppContext>,
    token: Result<Path<String>, PathRejection>,
    payload: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let token = path_params(token)?;
    validate_reset_token(&token)?;
    let request = accept(json_body(payload)?)?;

    ctx.users
        .password_reset(&request.email, &request.password, token.trim())
        .await
        .map_err(|e| {
            if !matches!(e, WishlistError::ValidateError) {
                metrics::record_user_error(metrics::USER_PASSWORD_RESET_ERROR);
            }
            e
        })?;

    Ok(Json(GenericResponse::new(StatusCode::OK, "Password Reset")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::test_context,
        store::{UserFilter, UserStore},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn alice() -> Value {
        json!({
            "username": "Alice",
            "password": "Sup3r$ecret1",
            "email": "a@x.com",
            "firstname": "Alice",
            "lastname": "Liddell"
        })
    }

    #[tokio::test]
    async fn test_register_login_and_check_token() {
        let t = test_context();

        let (status, body) = send(t.router(), post_json("/user/register", alice())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User Created.");

        let (status, _) = send(t.router(), post_json("/user/register", alice())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            t.router(),
            post_json("/user/auth", json!({"username": "alice", "password": "Sup3r$ecret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert!(body["expire"].is_string());

        let (status, _) = send(
            t.router(),
            Request::get("/user/auth")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            t.router(),
            Request::post("/user/auth/refresh")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let t = test_context();
        send(t.router(), post_json("/user/register", alice())).await;

        let (wrong_status, wrong_body) = send(
            t.router(),
            post_json("/user/auth", json!({"username": "alice", "password": "nope"})),
        )
        .await;
        let (unknown_status, unknown_body) = send(
            t.router(),
            post_json("/user/auth", json!({"username": "mallory", "password": "nope"})),
        )
        .await;

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_status, unknown_status);
        assert_eq!(wrong_body, unknown_body);
    }

    #[tokio::test]
    async fn test_register_validation_failure() {
        let t = test_context();
        let mut weak = alice();
        weak["password"] = json!("password");

        let (status, body) = send(t.router(), post_json("/user/register", weak)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);

        let (status, _) = send(
            t.router(),
            Request::post("/user/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let t = test_context();
        send(t.router(), post_json("/user/register", alice())).await;

        let (status, _) = send(
            t.router(),
            post_json("/user/password_forgot", json!({"email": "A@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let sent = t.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("https://wishlist.example.com/password_reset/"));

        let token = t
            .store
            .find_user(&UserFilter::Email("a@x.com".to_string()))
            .await
            .unwrap()
            .unwrap()
            .reset
            .unwrap()
            .token;
        let reset_uri = format!("/user/password_reset/{}", token);

        let (status, _) = send(
            t.router(),
            Request::get(reset_uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            t.router(),
            post_json(
                &reset_uri,
                json!({"email": "a@x.com", "password": "N3w$ecretPass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            t.router(),
            Request::get(reset_uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password reset token is invalid or expired.");

        let (status, _) = send(
            t.router(),
            post_json(
                "/user/auth",
                json!({"username": "alice", "password": "N3w$ecretPass"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_reset_token_is_rejected() {
        let t = test_context();
        let (status, _) = send(
            t.router(),
            Request::get("/user/password_reset/short")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_password_forgot_unknown_email_is_generic() {
        let t = test_context();
        let (status, body) = send(
            t.router(),
            post_json("/user/password_forgot", json!({"email": "nobody@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to complete password reset process");
    }

    #[tokio::test]
    async fn test_reset_link_ignores_request_host() {
        let t = test_context();
        send(t.router(), post_json("/user/register", alice())).await;

        let request = Request::post("/user/password_forgot")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "evil.example")
            .body(Body::from(json!({"email": "a@x.com"}).to_string()))
            .unwrap();
        let (status, _) = send(t.router(), request).await;
        assert_eq!(status, StatusCode::OK);

        let sent = t.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("https://wishlist.example.com/password_reset/"));
        assert!(!sent[0].body.contains("evil.example"));
    }
}
