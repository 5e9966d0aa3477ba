//! Authentication handlers.
//!
//! Every route is also mounted at the bare `/login` and `/register` aliases.
//! Successful logins and refreshes return the token pair in the body and as
//! `HttpOnly` cookies.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    audit::{AuditAction, ResourceType},
    auth::{
        cookies::{read_cookie, CookieSettings, ACCESS_COOKIE, REFRESH_COOKIE},
        jwt::Claims,
        service::{Credentials, IssuedSession, NewAccount},
    },
    error::{validation_error, ApiError, ApiResult},
    helpers::{audit, blocking, ClientContext},
    models::User,
    response::ApiResponse,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "Valid email is required"))]
    #[schema(example = "admin@akibeks.co.ke")]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "Admin123!")]
    pub password: String,
    #[schema(example = "123456")]
    pub two_factor_code: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Valid email is required"))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "S3cure!pass", min_length = 8)]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    #[schema(example = "Jane")]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    #[schema(example = "Wanjiru")]
    pub last_name: String,
    #[validate(length(max = 20, message = "Phone number is too long"))]
    #[schema(example = "+254712345678")]
    pub phone: Option<String>,
}

/// The refresh token may come in the body or the `refreshToken` cookie.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Verification token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(email(message = "Valid email is required"))]
    #[schema(example = "jane@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub user: User,
    /// Only returned outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestData {
    /// Only returned outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct Empty {}

fn session_response(
    cookies: &CookieSettings,
    message: &str,
    issued: IssuedSession,
) -> impl IntoResponse {
    let headers = AppendHeaders([
        (
            header::SET_COOKIE,
            cookies.build(ACCESS_COOKIE, &issued.access_token, issued.access_max_age),
        ),
        (
            header::SET_COOKIE,
            cookies.build(REFRESH_COOKIE, &issued.refresh_token, issued.refresh_max_age),
        ),
    ]);

    let body = ApiResponse::ok(
        message,
        AuthData {
            user: issued.user,
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
        },
    );

    (headers, Json(body))
}

fn refresh_token_from(headers: &HeaderMap, body: &Bytes) -> Option<String> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .ok()
            .and_then(|req| req.refresh_token)
    };

    from_body
        .filter(|token| !token.trim().is_empty())
        .or_else(|| read_cookie(headers, REFRESH_COOKIE))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending email verification", body = RegisterData),
        (status = 400, description = "Validation or password policy error", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RegisterData>>)> {
    payload.validate().map_err(|e| validation_error(&e))?;

    let account = NewAccount {
        email: payload.email,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
    };

    let auth = state.auth.clone();
    let registration = blocking(move || auth.register(&account)).await?;

    audit(
        state.store.clone(),
        ctx.anonymous(),
        AuditAction::UserRegistered,
        ResourceType::User,
        registration.user.id.clone(),
        serde_json::json!({ "email": registration.user.email }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Registration successful. Please verify your email.",
            RegisterData {
                user: registration.user,
                verification_token: registration.verification_token,
            },
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, cookies set", body = AuthData),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials, unverified, suspended or locked", body = ApiError),
        (status = 429, description = "Too many attempts", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ClientContext(meta): ClientContext,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate().map_err(|e| validation_error(&e))?;

    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
        two_factor_code: payload.two_factor_code,
        remember_me: payload.remember_me,
    };

    let auth = state.auth.clone();
    let issued = blocking(move || auth.login(&credentials, &meta)).await?;

    Ok(session_response(&state.cookies, "Login successful", issued))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Authentication",
    request_body(content = RefreshRequest, description = "Optional when the refreshToken cookie is sent"),
    responses(
        (status = 200, description = "Session rotated, cookies replaced", body = AuthData),
        (status = 401, description = "Invalid or expired refresh token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ClientContext(meta): ClientContext,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let token = refresh_token_from(&headers, &body).ok_or_else(|| {
        ApiError::unauthorized("Refresh token is required", "INVALID_REFRESH_TOKEN")
    })?;

    let auth = state.auth.clone();
    let issued = blocking(move || auth.refresh(&token, &meta)).await?;

    Ok(session_response(&state.cookies, "Token refreshed", issued))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Authentication",
    request_body(content = RefreshRequest, description = "Optional when the refreshToken cookie is sent"),
    responses(
        (status = 200, description = "Session ended, cookies cleared", body = Empty),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let token = refresh_token_from(&headers, &body);

    let auth = state.auth.clone();
    blocking(move || auth.logout(token.as_deref())).await?;

    let cleared = AppendHeaders([
        (header::SET_COOKIE, state.cookies.clear(ACCESS_COOKIE)),
        (header::SET_COOKIE, state.cookies.clear(REFRESH_COOKIE)),
    ]);

    Ok((cleared, Json(ApiResponse::ok("Logged out", Empty::default()))))
}

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    tag = "Authentication",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified and account activated", body = User),
        (status = 400, description = "Invalid or used token", body = ApiError)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<VerifyEmailRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    payload.validate().map_err(|e| validation_error(&e))?;

    let auth = state.auth.clone();
    let token = payload.token;
    let user = blocking(move || auth.verify_email(&token)).await?;

    audit(
        state.store.clone(),
        ctx.anonymous(),
        AuditAction::EmailVerified,
        ResourceType::User,
        user.id.clone(),
        serde_json::json!({}),
    )
    .await;

    Ok(Json(ApiResponse::ok("Email verified", user)))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same response whether or not the email exists", body = ResetRequestData),
        (status = 400, description = "Validation error", body = ApiError)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ApiResponse<ResetRequestData>>> {
    payload.validate().map_err(|e| validation_error(&e))?;

    let auth = state.auth.clone();
    let email = payload.email;
    let reset_token = blocking(move || auth.request_password_reset(&email)).await?;

    Ok(Json(ApiResponse::ok(
        "If an account exists for this email, a password reset link has been sent",
        ResetRequestData { reset_token },
    )))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed, all sessions ended", body = Empty),
        (status = 400, description = "Invalid token or password policy violation", body = ApiError)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<ApiResponse<Empty>>> {
    payload.validate().map_err(|e| validation_error(&e))?;

    let auth = state.auth.clone();
    let ResetPasswordRequest { token, password } = payload;
    let user = blocking(move || auth.reset_password(&token, &password)).await?;

    audit(
        state.store.clone(),
        ctx.anonymous(),
        AuditAction::PasswordReset,
        ResourceType::User,
        user.id,
        serde_json::json!({ "sessionsEnded": true }),
    )
    .await;

    Ok(Json(ApiResponse::ok(
        "Password has been reset. Please log in again.",
        Empty::default(),
    )))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 404, description = "User no longer exists", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ApiResponse<User>>> {
    debug!(user_id = %claims.sub, "Loading current user");
    let auth = state.auth.clone();
    let user = blocking(move || auth.current_user(&claims.sub)).await?;
    info!(user_id = %user.id, "Current user loaded");
    Ok(Json(ApiResponse::ok("OK", user)))
}
