//! OpenAPI documentation configuration.
//!
//! Served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::{ApiError, FieldError};
use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Akibeks API",
        version = "1.0.0",
        description = "Back office for a construction company.\n\n\
        ## Features\n\
        - Account registration, email verification and password recovery\n\
        - JWT access and refresh tokens, also delivered as HttpOnly cookies\n\
        - Quote request, job application and contact intake\n\
        - Admin review of submissions, users, projects, quotations and blog posts\n\
        - Append-only audit trail of every admin mutation\n\n\
        ## Authentication\n\
        Admin endpoints require an access token with the `admin` role.\n\
        1. Login at `/auth/login` to get a token pair\n\
        2. Send `Authorization: Bearer <token>` or the `accessToken` cookie\n\
        3. Use `/auth/refresh` to rotate the pair before the access token expires",
        contact(
            name = "Akibeks Engineering"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Accounts, sessions and recovery"),
        (name = "Intake", description = "Quote requests, applications and contact messages"),
        (name = "Public", description = "Read-only site content"),
        (name = "Admin", description = "Back-office operations, admin role required")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::verify_email,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,
        crate::handlers::auth::me,

        crate::handlers::intake::submit_quote,
        crate::handlers::intake::submit_application,
        crate::handlers::intake::submit_contact,

        crate::handlers::public::list_services,
        crate::handlers::public::list_projects,
        crate::handlers::public::list_blog_posts,
        crate::handlers::public::get_settings,

        crate::handlers::admin::verify,
        crate::handlers::admin::list_submissions,
        crate::handlers::admin::update_submission_status,
        crate::handlers::admin::list_users,
        crate::handlers::admin::update_user_status,
        crate::handlers::admin::update_project_status,
        crate::handlers::admin::create_quotation,
        crate::handlers::admin::publish_blog_post,
        crate::handlers::admin::list_audit_logs,
    ),
    components(
        schemas(
            ApiError,
            FieldError,
            PaginationMeta,

            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::VerifyEmailRequest,
            crate::handlers::auth::ForgotPasswordRequest,
            crate::handlers::auth::ResetPasswordRequest,
            crate::handlers::auth::AuthData,
            crate::handlers::auth::RegisterData,
            crate::handlers::auth::ResetRequestData,
            crate::handlers::auth::Empty,
            crate::auth::jwt::Claims,

            crate::intake::QuoteSubmission,
            crate::intake::QuoteForm,
            crate::intake::ApplicationSubmission,
            crate::intake::ApplicationForm,
            crate::intake::Attachment,
            crate::handlers::intake::ContactRequest,

            crate::handlers::admin::SubmissionStatusRequest,
            crate::handlers::admin::UserStatusRequest,
            crate::handlers::admin::ProjectStatusRequest,
            crate::handlers::admin::CreateQuotationRequest,
            crate::handlers::admin::QuotationData,

            crate::models::User,
            crate::models::Role,
            crate::models::UserStatus,
            crate::models::Service,
            crate::models::Project,
            crate::models::ProjectStatus,
            crate::models::BlogPost,
            crate::models::BlogStatus,
            crate::models::Submission,
            crate::models::SubmissionStatus,
            crate::models::SubmissionType,
            crate::models::Quotation,
            crate::models::QuotationStatus,
            crate::models::LineItem,
            crate::models::DocumentTotals,
            crate::models::AuditEntry,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token obtained from /auth/login.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_generation() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Akibeks API");
        assert_eq!(doc.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.components.is_some());
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let doc = ApiDoc::openapi();
        assert!(doc.tags.is_some());
        let tags = doc.tags.unwrap();
        assert!(tags.iter().any(|t| t.name == "Authentication"));
        assert!(tags.iter().any(|t| t.name == "Intake"));
        assert!(tags.iter().any(|t| t.name == "Admin"));
    }

    #[test]
    fn test_openapi_documents_intake_and_admin_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/quote-requests"));
        assert!(doc.paths.paths.contains_key("/admin/submissions/{id}/status"));
        assert!(doc.paths.paths.contains_key("/auth/verify-email"));
    }
}
