//! Shared helper functions for handlers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use tracing::error;

use crate::audit::{Actor, AuditAction, AuditLog, ResourceType};
use crate::auth::jwt::Claims;
use crate::auth::service::ClientMeta;
use crate::error::{ApiError, ApiResult};
use crate::models::AuditEntry;
use crate::store::Store;

/// Runs synchronous store or bcrypt work off the async executor.
pub async fn blocking<T, E, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<(StatusCode, Json<ApiError>)> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => {
            error!(error = %e, "Blocking task failed");
            Err(ApiError::internal("Internal server error", "INTERNAL_ERROR"))
        }
    }
}

/// Appends an audit row on the blocking pool. Failures are logged, never
/// surfaced to the caller.
pub async fn audit(
    store: Arc<dyn Store>,
    actor: Actor,
    action: AuditAction,
    resource_type: ResourceType,
    resource_id: String,
    details: serde_json::Value,
) -> Option<AuditEntry> {
    let task = tokio::task::spawn_blocking(move || {
        AuditLog::record_or_log(
            store.as_ref(),
            &actor,
            action,
            resource_type,
            &resource_id,
            details,
        )
    });

    match task.await {
        Ok(entry) => entry,
        Err(e) => {
            error!(error = %e, "Audit task failed");
            None
        }
    }
}

/// First hop of `X-Forwarded-For`, falling back to the socket peer.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect_info.map(|ci| ci.0.ip().to_string()))
}

pub fn client_meta(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> ClientMeta {
    ClientMeta {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        ip_address: client_ip(headers, connect_info),
    }
}

/// User agent and address of the caller, for sessions and audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientContext(pub ClientMeta);

impl ClientContext {
    pub fn actor(&self, claims: &Claims) -> Actor {
        Actor::user(claims.sub.clone(), self.0.ip_address.clone())
    }

    pub fn anonymous(&self) -> Actor {
        Actor::anonymous(self.0.ip_address.clone())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self(client_meta(&parts.headers, connect_info)))
    }
}
