//! Back-office handlers. Mounted behind `auth_middleware` and `require_admin`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    audit::{AuditAction, ResourceType},
    auth::jwt::Claims,
    error::{validation_error, ApiError, ApiResult, FieldError},
    helpers::{audit, blocking, ClientContext},
    models::{
        new_id, now, quotation_number, quotation_prefix, AuditEntry, BlogPost, DocumentTotals,
        LineItem, Project, ProjectStatus, Quotation, QuotationStatus, Submission,
        SubmissionStatus, User, UserStatus,
    },
    pagination::{PaginatedResponse, PaginationParams},
    response::ApiResponse,
    store::RepoError,
    AppState,
};

/// Numbering collisions are retried this many times before giving up.
const QUOTATION_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubmissionFilter {
    /// Only submissions in this status.
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmissionStatusRequest {
    pub status: SubmissionStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Client name is required"))]
    #[schema(example = "Jane Wanjiru")]
    pub client_name: String,
    #[serde(default)]
    #[validate(email(message = "Valid client email is required"))]
    #[schema(example = "jane@example.com")]
    pub client_email: String,
    pub project_id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<LineItem>,
    /// Percentage, e.g. `16` for 16% VAT.
    #[serde(default)]
    #[schema(value_type = String, example = "16")]
    pub tax_rate: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "0")]
    pub discount: Decimal,
    pub valid_until: Option<NaiveDate>,
}

impl CreateQuotationRequest {
    /// Numeric checks `validator` cannot express on `Decimal`.
    fn amount_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if self
            .items
            .iter()
            .any(|item| item.description.trim().is_empty())
        {
            push("items", "Every line item needs a description");
        }
        if self.items.iter().any(|item| item.quantity <= Decimal::ZERO) {
            push("items", "Quantities must be greater than zero");
        }
        if self.items.iter().any(|item| item.unit_price < Decimal::ZERO) {
            push("items", "Unit prices cannot be negative");
        }
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            push("taxRate", "Tax rate must be between 0 and 100");
        }
        if self.discount < Decimal::ZERO {
            push("discount", "Discount cannot be negative");
        }
        errors
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotationData {
    pub quotation: Quotation,
    pub totals: DocumentTotals,
}

fn not_found(what: &str) -> (StatusCode, Json<ApiError>) {
    ApiError::not_found(format!("{} not found", what), "NOT_FOUND")
}

fn invalid_transition(
    from: impl std::fmt::Display,
    to: impl std::fmt::Display,
) -> (StatusCode, Json<ApiError>) {
    ApiError::unprocessable(
        format!("Cannot change status from {} to {}", from, to),
        "INVALID_STATUS_TRANSITION",
    )
}

#[utoipa::path(
    get,
    path = "/admin/verify",
    tag = "Admin",
    responses(
        (status = 200, description = "Decoded claims of the admin token", body = Claims),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Valid token without the admin role", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify(Extension(claims): Extension<Claims>) -> Json<ApiResponse<Claims>> {
    Json(ApiResponse::ok("Admin access granted", claims))
}

#[utoipa::path(
    get,
    path = "/admin/submissions",
    tag = "Admin",
    params(PaginationParams, SubmissionFilter),
    responses(
        (status = 200, description = "Newest submissions first", body = [Submission]),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<SubmissionFilter>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<Submission>>>> {
    let store = state.store.clone();
    let (offset, limit) = (params.offset(), params.limit());
    let page = blocking(move || store.list_submissions(filter.status, offset, limit)).await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        PaginatedResponse::from_page(page, &params),
    )))
}

#[utoipa::path(
    put,
    path = "/admin/submissions/{id}/status",
    tag = "Admin",
    params(("id" = String, Path, description = "Submission id")),
    request_body = SubmissionStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Submission),
        (status = 404, description = "Submission not found", body = ApiError),
        (status = 422, description = "Status can only move forward", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_submission_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ctx: ClientContext,
    Path(id): Path<String>,
    Json(payload): Json<SubmissionStatusRequest>,
) -> ApiResult<Json<ApiResponse<Submission>>> {
    let store = state.store.clone();
    let to = payload.status;
    let (from, updated) = blocking(move || -> ApiResult<_> {
        let current = store
            .find_submission(&id)?
            .ok_or_else(|| not_found("Submission"))?;

        if !SubmissionStatus::can_transition(current.status, to) {
            return Err(invalid_transition(current.status, to));
        }

        // The first contact or response is stamped once and kept.
        let responded_at = match current.responded_at {
            Some(at) => Some(at),
            None if to.is_response() => Some(now()),
            None => None,
        };
        store.update_submission_status(&id, to, responded_at)?;

        let updated = store
            .find_submission(&id)?
            .ok_or_else(|| not_found("Submission"))?;
        Ok((current.status, updated))
    })
    .await?;

    audit(
        state.store.clone(),
        ctx.actor(&claims),
        AuditAction::SubmissionStatusChanged,
        ResourceType::Submission,
        updated.id.clone(),
        serde_json::json!({ "from": from, "to": to }),
    )
    .await;

    info!(submission_id = %updated.id, from = %from, to = %to, "Submission status changed");
    Ok(Json(ApiResponse::ok("Submission status updated", updated)))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    params(PaginationParams),
    responses(
        (status = 200, description = "Registered users", body = [User]),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<User>>>> {
    let store = state.store.clone();
    let (offset, limit) = (params.offset(), params.limit());
    let page = blocking(move || store.list_users(offset, limit)).await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        PaginatedResponse::from_page(page, &params),
    )))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = User),
        (status = 400, description = "Admins cannot suspend themselves", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 422, description = "Transition not allowed", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ctx: ClientContext,
    Path(id): Path<String>,
    Json(payload): Json<UserStatusRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let to = payload.status;
    if id == claims.sub && to == UserStatus::Suspended {
        warn!(user_id = %id, "Admin attempted to suspend own account");
        return Err(ApiError::bad_request(
            "You cannot suspend your own account",
            "CANNOT_SUSPEND_SELF",
        ));
    }

    let store = state.store.clone();
    let (from, updated) = blocking(move || -> ApiResult<_> {
        let current = store.find_user_by_id(&id)?.ok_or_else(|| not_found("User"))?;

        if !UserStatus::can_transition(current.status, to, true) {
            return Err(invalid_transition(current.status, to));
        }
        store.set_user_status(&id, to)?;

        let updated = store.find_user_by_id(&id)?.ok_or_else(|| not_found("User"))?;
        Ok((current.status, updated))
    })
    .await?;

    audit(
        state.store.clone(),
        ctx.actor(&claims),
        AuditAction::UserStatusChanged,
        ResourceType::User,
        updated.id.clone(),
        serde_json::json!({ "from": from, "to": to }),
    )
    .await;

    info!(user_id = %updated.id, from = %from, to = %to, "User status changed");
    Ok(Json(ApiResponse::ok("User status updated", updated)))
}

#[utoipa::path(
    put,
    path = "/admin/projects/{id}/status",
    tag = "Admin",
    params(("id" = String, Path, description = "Project id")),
    request_body = ProjectStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Project),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 422, description = "Transition not allowed", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ctx: ClientContext,
    Path(id): Path<String>,
    Json(payload): Json<ProjectStatusRequest>,
) -> ApiResult<Json<ApiResponse<Project>>> {
    let store = state.store.clone();
    let to = payload.status;
    let (from, updated) = blocking(move || -> ApiResult<_> {
        let current = store.find_project(&id)?.ok_or_else(|| not_found("Project"))?;

        if !ProjectStatus::can_transition(current.status, to) {
            return Err(invalid_transition(current.status, to));
        }
        store.update_project_status(&id, to)?;

        let updated = store.find_project(&id)?.ok_or_else(|| not_found("Project"))?;
        Ok((current.status, updated))
    })
    .await?;

    audit(
        state.store.clone(),
        ctx.actor(&claims),
        AuditAction::ProjectStatusChanged,
        ResourceType::Project,
        updated.id.clone(),
        serde_json::json!({ "from": from, "to": to }),
    )
    .await;

    info!(project_id = %updated.id, from = %from, to = %to, "Project status changed");
    Ok(Json(ApiResponse::ok("Project status updated", updated)))
}

#[utoipa::path(
    post,
    path = "/admin/quotations",
    tag = "Admin",
    request_body = CreateQuotationRequest,
    responses(
        (status = 201, description = "Draft quotation created", body = QuotationData),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Referenced project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_quotation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ctx: ClientContext,
    Json(payload): Json<CreateQuotationRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<QuotationData>>)> {
    payload.validate().map_err(|e| validation_error(&e))?;
    let amount_errors = payload.amount_errors();
    if !amount_errors.is_empty() {
        return Err(ApiError::validation(amount_errors));
    }

    let totals = DocumentTotals::compute(
        &payload.items,
        payload.tax_rate,
        payload.discount,
        Decimal::ZERO,
    );
    let items = serde_json::to_value(&payload.items).map_err(|e| {
        warn!(error = %e, "Line items could not be serialized");
        ApiError::internal("Failed to store line items", "SERIALIZATION_ERROR")
    })?;

    let store = state.store.clone();
    let created_by = claims.sub.clone();
    let quotation = blocking(move || -> ApiResult<Quotation> {
        if let Some(project_id) = payload.project_id.as_deref() {
            store
                .find_project(project_id)?
                .ok_or_else(|| not_found("Project"))?;
        }

        let ts = now();
        let prefix = quotation_prefix(ts.date());
        let mut last_conflict = None;

        for _ in 0..QUOTATION_NUMBER_ATTEMPTS {
            let sequence = store.max_quotation_sequence(&prefix)? + 1;
            let quotation = Quotation {
                id: new_id(),
                quotation_number: quotation_number(ts.date(), sequence),
                client_name: payload.client_name.trim().to_string(),
                client_email: payload.client_email.trim().to_lowercase(),
                project_id: payload.project_id.clone(),
                items: items.clone(),
                subtotal: totals.subtotal,
                tax_rate: payload.tax_rate,
                tax_amount: totals.tax_amount,
                discount: payload.discount,
                total: totals.total,
                status: QuotationStatus::Draft,
                valid_until: payload.valid_until,
                created_by: Some(created_by.clone()),
                created_at: ts,
                updated_at: ts,
            };

            match store.insert_quotation(&quotation) {
                Ok(()) => return Ok(quotation),
                Err(RepoError::Conflict(detail)) => {
                    warn!(number = %quotation.quotation_number, "Quotation number taken, retrying");
                    last_conflict = Some(RepoError::Conflict(detail));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .unwrap_or_else(|| RepoError::Conflict(prefix))
            .into())
    })
    .await?;

    audit(
        state.store.clone(),
        ctx.actor(&claims),
        AuditAction::QuotationCreated,
        ResourceType::Quotation,
        quotation.id.clone(),
        serde_json::json!({
            "quotationNumber": quotation.quotation_number,
            "total": quotation.total.to_string(),
        }),
    )
    .await;

    info!(
        quotation_id = %quotation.id,
        number = %quotation.quotation_number,
        total = %quotation.total,
        "Quotation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Quotation created",
            QuotationData { quotation, totals },
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/admin/blog/{id}/publish",
    tag = "Admin",
    params(("id" = String, Path, description = "Blog post id")),
    responses(
        (status = 200, description = "Post is published", body = BlogPost),
        (status = 404, description = "Post not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn publish_blog_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ctx: ClientContext,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<BlogPost>>> {
    let store = state.store.clone();
    let (first_publish, post) = blocking(move || -> ApiResult<_> {
        let current = store.find_blog_post(&id)?.ok_or_else(|| not_found("Blog post"))?;
        let first_publish = current.published_at.is_none();

        store.publish_blog_post(&id, current.publication_time(now()))?;

        let post = store.find_blog_post(&id)?.ok_or_else(|| not_found("Blog post"))?;
        Ok((first_publish, post))
    })
    .await?;

    audit(
        state.store.clone(),
        ctx.actor(&claims),
        AuditAction::BlogPostPublished,
        ResourceType::BlogPost,
        post.id.clone(),
        serde_json::json!({ "firstPublish": first_publish, "slug": post.slug }),
    )
    .await;

    info!(post_id = %post.id, first_publish, "Blog post published");
    Ok(Json(ApiResponse::ok("Blog post published", post)))
}

#[utoipa::path(
    get,
    path = "/admin/audit-logs",
    tag = "Admin",
    params(PaginationParams),
    responses(
        (status = 200, description = "Newest entries first", body = [AuditEntry]),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<AuditEntry>>>> {
    let store = state.store.clone();
    let (offset, limit) = (params.offset(), params.limit());
    let page = blocking(move || store.list_audit(offset, limit)).await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        PaginatedResponse::from_page(page, &params),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: serde_json::Value) -> CreateQuotationRequest {
        serde_json::from_value(serde_json::json!({
            "clientName": "Jane Wanjiru",
            "clientEmail": "jane@example.com",
            "items": items,
            "taxRate": "16",
        }))
        .unwrap()
    }

    #[test]
    fn test_quotation_amount_checks() {
        let ok = request(serde_json::json!([
            {"description": "Excavation", "quantity": "2", "unitPrice": "15000"}
        ]));
        assert!(ok.validate().is_ok());
        assert!(ok.amount_errors().is_empty());

        let bad = request(serde_json::json!([
            {"description": " ", "quantity": "0", "unitPrice": "-1"}
        ]));
        assert_eq!(bad.amount_errors().len(), 3);
    }

    #[test]
    fn test_quotation_requires_items() {
        let empty = request(serde_json::json!([]));
        let errors = crate::error::field_errors(&empty.validate().unwrap_err());
        assert_eq!(errors[0].field, "items");
    }
}
