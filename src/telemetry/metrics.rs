//! Application metrics using the metrics crate.

use std::sync::OnceLock;

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

use crate::models::SubmissionType;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    /// Installs the global Prometheus recorder on first use.
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        if let Some(handle) = PROMETHEUS_HANDLE.get() {
            return Self {
                handle: Some(handle.clone()),
            };
        }

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Self {
                handle: Some(PROMETHEUS_HANDLE.get_or_init(|| handle).clone()),
            },
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.render())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<MetricsState>,
) -> impl IntoResponse {
    match state.render() {
        Some(metrics) => (StatusCode::OK, metrics),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not enabled".to_string(),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthOutcome {
    Success,
    InvalidCredentials,
    AccountLocked,
    AccountPending,
    AccountSuspended,
    EmailNotVerified,
    TokenInvalid,
}

impl AuthOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::InvalidCredentials => "invalid_credentials",
            AuthOutcome::AccountLocked => "account_locked",
            AuthOutcome::AccountPending => "account_pending",
            AuthOutcome::AccountSuspended => "account_suspended",
            AuthOutcome::EmailNotVerified => "email_not_verified",
            AuthOutcome::TokenInvalid => "token_invalid",
        }
    }
}

pub fn record_auth_attempt(action: &str, outcome: AuthOutcome) {
    counter!(
        "auth_attempts_total",
        "action" => action.to_string(),
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

pub fn record_intake_submission(kind: SubmissionType) {
    counter!("intake_submissions_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_request_latency(
    method: &str,
    path: &str,
    status: u16,
    duration: std::time::Duration,
) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}
