//! Repository traits over the relational store.
//!
//! Handlers and services only see `dyn Store`. `MysqlStore` is the production
//! backend; `MemoryStore` backs the integration tests and local demos.

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MysqlStore;

use chrono::NaiveDateTime;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::models::{
    AuditEntry, BlogPost, Permission, Project, ProjectStatus, Quotation, Service, Session,
    Setting, Submission, SubmissionStatus, User, UserPermission, UserStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("stored data is invalid: {0}")]
    Corrupt(String),
}

impl From<DieselError> for RepoError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => RepoError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                RepoError::Conflict(info.message().to_string())
            }
            DieselError::DeserializationError(e) => RepoError::Corrupt(e.to_string()),
            other => RepoError::Database(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// One page of rows plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

pub trait UserRepository: Send + Sync {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    fn find_user_by_id(&self, id: &str) -> RepoResult<Option<User>>;
    fn find_user_by_verification_token(&self, token_hash: &str) -> RepoResult<Option<User>>;
    fn find_user_by_reset_token(&self, token_hash: &str) -> RepoResult<Option<User>>;
    fn insert_user(&self, user: &User) -> RepoResult<()>;
    /// Replaces the hash and clears any outstanding reset token.
    fn update_password(&self, id: &str, password_hash: &str) -> RepoResult<()>;
    fn record_failed_login(
        &self,
        id: &str,
        attempts: i32,
        locked_until: Option<NaiveDateTime>,
    ) -> RepoResult<()>;
    /// Zeroes the failure counter, clears the lock and stamps `last_login`.
    fn record_successful_login(&self, id: &str, at: NaiveDateTime) -> RepoResult<()>;
    fn set_user_status(&self, id: &str, status: UserStatus) -> RepoResult<()>;
    /// Marks the email verified, activates a pending account and drops the token.
    fn mark_email_verified(&self, id: &str) -> RepoResult<()>;
    fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: NaiveDateTime,
    ) -> RepoResult<()>;
    fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Page<User>>;
}

pub trait SessionRepository: Send + Sync {
    fn create_session(&self, session: &Session) -> RepoResult<()>;
    fn find_session(&self, token_hash: &str) -> RepoResult<Option<Session>>;
    fn delete_session(&self, token_hash: &str) -> RepoResult<bool>;
    fn delete_user_sessions(&self, user_id: &str) -> RepoResult<usize>;
}

pub trait SubmissionRepository: Send + Sync {
    fn insert_submission(&self, submission: &Submission) -> RepoResult<()>;
    fn find_submission(&self, id: &str) -> RepoResult<Option<Submission>>;
    fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Page<Submission>>;
    fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> RepoResult<()>;
}

/// Audit rows are append-only.
pub trait AuditRepository: Send + Sync {
    fn append_audit(&self, entry: &AuditEntry) -> RepoResult<()>;
    fn list_audit(&self, offset: i64, limit: i64) -> RepoResult<Page<AuditEntry>>;
}

pub trait SettingsRepository: Send + Sync {
    fn list_settings(&self) -> RepoResult<Vec<Setting>>;
}

pub trait CatalogRepository: Send + Sync {
    fn find_permission_by_name(&self, name: &str) -> RepoResult<Option<Permission>>;
    fn insert_permission(&self, permission: &Permission) -> RepoResult<()>;
    fn has_user_permission(&self, user_id: &str, permission_id: &str) -> RepoResult<bool>;
    fn grant_permission(&self, grant: &UserPermission) -> RepoResult<()>;
    fn find_service_by_slug(&self, slug: &str) -> RepoResult<Option<Service>>;
    fn insert_service(&self, service: &Service) -> RepoResult<()>;
    fn list_active_services(&self) -> RepoResult<Vec<Service>>;
}

pub trait ProjectRepository: Send + Sync {
    fn find_project(&self, id: &str) -> RepoResult<Option<Project>>;
    fn find_project_by_slug(&self, slug: &str) -> RepoResult<Option<Project>>;
    fn insert_project(&self, project: &Project) -> RepoResult<()>;
    fn list_projects(&self, offset: i64, limit: i64) -> RepoResult<Page<Project>>;
    fn update_project_status(&self, id: &str, status: ProjectStatus) -> RepoResult<()>;
}

pub trait ContentRepository: Send + Sync {
    fn find_blog_post(&self, id: &str) -> RepoResult<Option<BlogPost>>;
    fn insert_blog_post(&self, post: &BlogPost) -> RepoResult<()>;
    fn list_published_posts(&self, offset: i64, limit: i64) -> RepoResult<Page<BlogPost>>;
    fn publish_blog_post(&self, id: &str, published_at: NaiveDateTime) -> RepoResult<()>;
}

pub trait FinanceRepository: Send + Sync {
    fn insert_quotation(&self, quotation: &Quotation) -> RepoResult<()>;
    fn find_quotation(&self, id: &str) -> RepoResult<Option<Quotation>>;
    /// Highest numeric suffix among quotation numbers starting with `prefix`,
    /// or 0 when there are none.
    fn max_quotation_sequence(&self, prefix: &str) -> RepoResult<i64>;
}

pub trait Store:
    UserRepository
    + SessionRepository
    + SubmissionRepository
    + AuditRepository
    + SettingsRepository
    + CatalogRepository
    + ProjectRepository
    + ContentRepository
    + FinanceRepository
{
    /// Cheap round trip used by readiness probes.
    fn ping(&self) -> RepoResult<()>;

    fn backend(&self) -> &'static str;
}
