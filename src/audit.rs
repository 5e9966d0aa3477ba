//! Audit trail for administrative and intake mutations.

use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::models::{new_id, now, AuditEntry};
use crate::store::{AuditRepository, RepoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuditAction {
    UserRegistered,
    UserStatusChanged,
    EmailVerified,
    PasswordReset,
    SubmissionCreated,
    SubmissionStatusChanged,
    ProjectStatusChanged,
    QuotationCreated,
    BlogPostPublished,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "user.registered",
            AuditAction::UserStatusChanged => "user.status_changed",
            AuditAction::EmailVerified => "user.email_verified",
            AuditAction::PasswordReset => "auth.password.reset_completed",
            AuditAction::SubmissionCreated => "submission.created",
            AuditAction::SubmissionStatusChanged => "submission.status_changed",
            AuditAction::ProjectStatusChanged => "project.status_changed",
            AuditAction::QuotationCreated => "quotation.created",
            AuditAction::BlogPostPublished => "blog_post.published",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceType {
    User,
    Submission,
    Project,
    Quotation,
    BlogPost,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Submission => "contact_submission",
            ResourceType::Project => "project",
            ResourceType::Quotation => "quotation",
            ResourceType::BlogPost => "blog_post",
        }
    }
}

/// Who did it and from where.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>, ip_address: Option<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ip_address,
        }
    }

    pub fn anonymous(ip_address: Option<String>) -> Self {
        Self {
            user_id: None,
            ip_address,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog;

impl AuditLog {
    #[instrument(skip(repo, actor, details), fields(action = %action, resource_id = %resource_id))]
    pub fn record<R: AuditRepository + ?Sized>(
        repo: &R,
        actor: &Actor,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: &str,
        details: serde_json::Value,
    ) -> RepoResult<AuditEntry> {
        let entry = AuditEntry {
            id: new_id(),
            user_id: actor.user_id.clone(),
            action: action.as_str().to_string(),
            resource_type: resource_type.as_str().to_string(),
            resource_id: Some(resource_id.to_string()),
            details: Some(details),
            ip_address: actor.ip_address.clone(),
            created_at: now(),
        };

        repo.append_audit(&entry)?;
        debug!(entry_id = %entry.id, "Audit entry written");
        Ok(entry)
    }

    /// Like [`AuditLog::record`], but a failed append is logged instead of
    /// returned. The mutation it describes has already been committed.
    pub fn record_or_log<R: AuditRepository + ?Sized>(
        repo: &R,
        actor: &Actor,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: &str,
        details: serde_json::Value,
    ) -> Option<AuditEntry> {
        match Self::record(repo, actor, action, resource_type, resource_id, details) {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!(
                    error = %e,
                    action = %action,
                    resource_id = %resource_id,
                    "Failed to write audit entry"
                );
                None
            }
        }
    }
}
