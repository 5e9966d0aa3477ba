//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::auth::cookies::{read_cookie, ACCESS_COOKIE};
use crate::auth::jwt::Claims;
use crate::error::ApiError;
use crate::AppState;

/// `Authorization: Bearer` wins over the `accessToken` cookie.
fn access_token(headers: &HeaderMap) -> Result<Option<String>, Response> {
    match headers.get(header::AUTHORIZATION) {
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    ApiError::unauthorized(
                        "Invalid authorization header format",
                        "INVALID_AUTH_FORMAT",
                    )
                    .into_response()
                })?;
            Ok(Some(token.to_string()))
        }
        None => Ok(read_cookie(headers, ACCESS_COOKIE)),
    }
}

/// Validates the access token and stores its claims in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = access_token(req.headers())?.ok_or_else(|| {
        ApiError::unauthorized("Authentication required", "MISSING_TOKEN").into_response()
    })?;

    let claims = state.jwt_config.verify_access_token(&token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run inside `auth_middleware`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => Ok(next.run(req).await),
        Some(claims) => {
            warn!(user_id = %claims.sub, path = %req.uri().path(), "Non-admin denied");
            Err(ApiError::forbidden("Admin access required", "FORBIDDEN").into_response())
        }
        None => Err(
            ApiError::unauthorized("Authentication required", "MISSING_TOKEN").into_response(),
        ),
    }
}
