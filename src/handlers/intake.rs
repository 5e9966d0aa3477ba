//! Public intake endpoints: quote requests, job applications and the
//! contact form. Each stores one `contact_submissions` row.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    audit::{AuditAction, ResourceType},
    error::{validation_error, ApiError, ApiResult},
    helpers::{audit, blocking, ClientContext},
    intake::{ApplicationSubmission, IntakeForm, IntakeSession, QuoteSubmission},
    models::{new_id, now, Submission, SubmissionStatus, SubmissionType},
    response::ApiResponse,
    telemetry::record_intake_submission,
    AppState,
};

pub const THANK_YOU_MESSAGE: &str = "Thank you! We will get back to you within 24 hours.";

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[serde(default)]
    #[validate(
        email(message = "Valid email is required"),
        length(max = 255, message = "Valid email is required")
    )]
    pub email: String,
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: Option<String>,
    #[validate(length(max = 255, message = "Subject is too long"))]
    pub subject: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    #[schema(example = "I would like a site visit next week.")]
    pub message: String,
}

impl ContactRequest {
    fn into_submission(self) -> Submission {
        let ts = now();
        let trimmed = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Submission {
            id: new_id(),
            submission_type: SubmissionType::Contact,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: trimmed(self.phone),
            subject: trimmed(self.subject),
            message: Some(self.message.trim().to_string()),
            details: None,
            status: SubmissionStatus::New,
            responded_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }
}

async fn store_submission(
    state: &AppState,
    ctx: &ClientContext,
    submission: Submission,
) -> ApiResult<(StatusCode, Json<ApiResponse<Submission>>)> {
    let store = state.store.clone();
    let row = submission.clone();
    blocking(move || store.insert_submission(&row)).await?;

    audit(
        state.store.clone(),
        ctx.anonymous(),
        AuditAction::SubmissionCreated,
        ResourceType::Submission,
        submission.id.clone(),
        serde_json::json!({
            "type": submission.submission_type,
            "email": submission.email,
        }),
    )
    .await;

    record_intake_submission(submission.submission_type);
    info!(
        submission_id = %submission.id,
        kind = %submission.submission_type,
        "Submission received"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(THANK_YOU_MESSAGE, submission)),
    ))
}

/// Re-runs every step validator on the consolidated wizard payload.
fn finalize<F: IntakeForm>(session: IntakeSession<F>) -> ApiResult<Submission> {
    session.to_submission().map_err(Into::into)
}

#[utoipa::path(
    post,
    path = "/quote-requests",
    tag = "Intake",
    request_body = QuoteSubmission,
    responses(
        (status = 201, description = "Quote request stored", body = Submission),
        (status = 400, description = "One or more steps are incomplete", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn submit_quote(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<QuoteSubmission>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Submission>>)> {
    let submission = finalize(payload.into_session())?;
    store_submission(&state, &ctx, submission).await
}

#[utoipa::path(
    post,
    path = "/applications",
    tag = "Intake",
    request_body = ApplicationSubmission,
    responses(
        (status = 201, description = "Application stored", body = Submission),
        (status = 400, description = "One or more steps are incomplete", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn submit_application(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<ApplicationSubmission>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Submission>>)> {
    let submission = finalize(payload.into_session())?;
    store_submission(&state, &ctx, submission).await
}

#[utoipa::path(
    post,
    path = "/contact",
    tag = "Intake",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message stored", body = Submission),
        (status = 400, description = "Validation error", body = ApiError)
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ctx: ClientContext,
    Json(payload): Json<ContactRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Submission>>)> {
    payload.validate().map_err(|e| validation_error(&e))?;
    store_submission(&state, &ctx, payload.into_submission()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_request_normalizes() {
        let req: ContactRequest = serde_json::from_value(serde_json::json!({
            "firstName": " Jane ",
            "lastName": "Wanjiru",
            "email": "Jane@Example.com",
            "phone": "  ",
            "message": "Hello"
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let submission = req.into_submission();
        assert_eq!(submission.first_name, "Jane");
        assert_eq!(submission.email, "jane@example.com");
        assert!(submission.phone.is_none());
        assert_eq!(submission.submission_type, SubmissionType::Contact);
        assert_eq!(submission.status, SubmissionStatus::New);
    }

    #[test]
    fn test_incomplete_quote_is_rejected() {
        let payload: QuoteSubmission = serde_json::from_value(serde_json::json!({
            "firstName": "Jane",
            "email": "jane@example.com"
        }))
        .unwrap();

        let (status, Json(body)) = finalize(payload.into_session()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<_> = body
            .errors
            .unwrap()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert!(fields.contains(&"lastName".to_string()));
        assert!(fields.contains(&"services".to_string()));
    }
}
