//! Shared error handling utilities.

use std::collections::BTreeMap;

use axum::{http::StatusCode, Json};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::store::RepoError;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: code.into(),
            errors: None,
            requires_verification: None,
            locked_until: None,
        }
    }

    pub fn bad_request(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(message, code)))
    }

    pub fn unauthorized(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(message, code)))
    }

    pub fn forbidden(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(message, code)))
    }

    pub fn not_found(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(message, code)))
    }

    pub fn conflict(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(message, code)))
    }

    pub fn unprocessable(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(Self::new(message, code)),
        )
    }

    pub fn internal(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(message, code)),
        )
    }

    pub fn service_unavailable(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Self::new(message, code)),
        )
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error", "DB_ERROR")
    }

    /// 400 carrying one entry per failed field.
    pub fn validation(errors: Vec<FieldError>) -> (StatusCode, Json<Self>) {
        let mut body = Self::new("Validation failed", "VALIDATION_ERROR");
        body.errors = Some(errors);
        (StatusCode::BAD_REQUEST, Json(body))
    }

    pub fn with_verification_flag(mut self) -> Self {
        self.requires_verification = Some(true);
        self
    }

    pub fn with_locked_until(mut self, until: NaiveDateTime) -> Self {
        self.locked_until = Some(until);
        self
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Flattens `validator` output into a stable, field-sorted list.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut sorted: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (field, errs) in errors.field_errors() {
        let messages = sorted.entry(to_camel_case(field.as_ref())).or_default();
        for err in errs {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            messages.push(message);
        }
    }

    sorted
        .into_iter()
        .flat_map(|(field, messages)| {
            messages.into_iter().map(move |message| FieldError {
                field: field.clone(),
                message,
            })
        })
        .collect()
}

pub fn validation_error(errors: &ValidationErrors) -> (StatusCode, Json<ApiError>) {
    ApiError::validation(field_errors(errors))
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<RepoError> for (StatusCode, Json<ApiError>) {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::not_found("Resource not found", "NOT_FOUND"),
            RepoError::Conflict(detail) => {
                ApiError::conflict(format!("Resource already exists: {}", detail), "CONFLICT")
            }
            RepoError::Pool(e) => {
                error!(error = %e, "Database connection error");
                ApiError::internal("Database connection error", "DB_CONNECTION_ERROR")
            }
            other => {
                error!(error = %other, "Database error");
                ApiError::db_error()
            }
        }
    }
}
