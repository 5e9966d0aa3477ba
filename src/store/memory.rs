use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;

use super::*;
use crate::migrate::DEFAULT_SETTINGS;
use crate::models::{max_quotation_sequence, new_id, now, BlogStatus};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<Session>,
    submissions: Vec<Submission>,
    audit: Vec<AuditEntry>,
    settings: Vec<Setting>,
    permissions: Vec<Permission>,
    user_permissions: Vec<UserPermission>,
    services: Vec<Service>,
    projects: Vec<Project>,
    blog_posts: Vec<BlogPost>,
    quotations: Vec<Quotation>,
}

/// In-process store with the same uniqueness rules as the MySQL schema.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Starts with the default settings rows, like a freshly migrated database.
    pub fn new() -> Self {
        let ts = now();
        let settings = DEFAULT_SETTINGS
            .iter()
            .map(|(key, value)| Setting {
                id: new_id(),
                setting_key: key.to_string(),
                setting_value: value.to_string(),
                created_at: ts,
                updated_at: ts,
            })
            .collect();

        Self {
            tables: Mutex::new(Tables {
                settings,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| RepoError::Database("memory store mutex poisoned".to_string()))
    }
}

fn page<T: Clone>(rows: Vec<&T>, offset: i64, limit: i64) -> Page<T> {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    Page { items, total }
}

fn user_mut<'a>(tables: &'a mut Tables, id: &str) -> RepoResult<&'a mut User> {
    tables
        .users
        .iter_mut()
        .find(|u| u.id == id)
        .ok_or(RepoError::NotFound)
}

impl UserRepository for MemoryStore {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    fn find_user_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_user_by_verification_token(&self, token_hash: &str) -> RepoResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.verification_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    fn find_user_by_reset_token(&self, token_hash: &str) -> RepoResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    fn insert_user(&self, user: &User) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'users.email'",
                user.email
            )));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    fn update_password(&self, id: &str, password_hash: &str) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.password_hash = password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = now();
        Ok(())
    }

    fn record_failed_login(
        &self,
        id: &str,
        attempts: i32,
        locked_until: Option<NaiveDateTime>,
    ) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.failed_login_attempts = attempts;
        user.locked_until = locked_until;
        user.updated_at = now();
        Ok(())
    }

    fn record_successful_login(&self, id: &str, at: NaiveDateTime) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login = Some(at);
        user.updated_at = at;
        Ok(())
    }

    fn set_user_status(&self, id: &str, status: UserStatus) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.status = status;
        user.updated_at = now();
        Ok(())
    }

    fn mark_email_verified(&self, id: &str) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.email_verified = true;
        user.verification_token_hash = None;
        if user.status == UserStatus::Pending {
            user.status = UserStatus::Active;
        }
        user.updated_at = now();
        Ok(())
    }

    fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: NaiveDateTime,
    ) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let user = user_mut(&mut tables, id)?;
        user.reset_token_hash = Some(token_hash.to_string());
        user.reset_token_expires_at = Some(expires_at);
        user.updated_at = now();
        Ok(())
    }

    fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Page<User>> {
        let tables = self.lock()?;
        let mut rows: Vec<&User> = tables.users.iter().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }
}

impl SessionRepository for MemoryStore {
    fn create_session(&self, session: &Session) -> RepoResult<()> {
        self.lock()?.sessions.push(session.clone());
        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> RepoResult<Option<Session>> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| s.refresh_token_hash == token_hash)
            .cloned())
    }

    fn delete_session(&self, token_hash: &str) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.refresh_token_hash != token_hash);
        Ok(tables.sessions.len() < before)
    }

    fn delete_user_sessions(&self, user_id: &str) -> RepoResult<usize> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != user_id);
        Ok(before - tables.sessions.len())
    }
}

impl SubmissionRepository for MemoryStore {
    fn insert_submission(&self, submission: &Submission) -> RepoResult<()> {
        self.lock()?.submissions.push(submission.clone());
        Ok(())
    }

    fn find_submission(&self, id: &str) -> RepoResult<Option<Submission>> {
        Ok(self
            .lock()?
            .submissions
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Page<Submission>> {
        let tables = self.lock()?;
        let mut rows: Vec<&Submission> = tables
            .submissions
            .iter()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, offset, limit))
    }

    fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let submission = tables
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepoError::NotFound)?;
        submission.status = status;
        submission.responded_at = responded_at;
        submission.updated_at = now();
        Ok(())
    }
}

impl AuditRepository for MemoryStore {
    fn append_audit(&self, entry: &AuditEntry) -> RepoResult<()> {
        self.lock()?.audit.push(entry.clone());
        Ok(())
    }

    fn list_audit(&self, offset: i64, limit: i64) -> RepoResult<Page<AuditEntry>> {
        let tables = self.lock()?;
        // Newest first; insertion order breaks ties within the same second.
        let rows: Vec<&AuditEntry> = tables.audit.iter().rev().collect();
        Ok(page(rows, offset, limit))
    }
}

impl SettingsRepository for MemoryStore {
    fn list_settings(&self) -> RepoResult<Vec<Setting>> {
        let mut rows = self.lock()?.settings.clone();
        rows.sort_by(|a, b| a.setting_key.cmp(&b.setting_key));
        Ok(rows)
    }
}

impl CatalogRepository for MemoryStore {
    fn find_permission_by_name(&self, name: &str) -> RepoResult<Option<Permission>> {
        Ok(self
            .lock()?
            .permissions
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    fn insert_permission(&self, permission: &Permission) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables.permissions.iter().any(|p| p.name == permission.name) {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'permissions.name'",
                permission.name
            )));
        }
        tables.permissions.push(permission.clone());
        Ok(())
    }

    fn has_user_permission(&self, user_id: &str, permission_id: &str) -> RepoResult<bool> {
        Ok(self
            .lock()?
            .user_permissions
            .iter()
            .any(|g| g.user_id == user_id && g.permission_id == permission_id))
    }

    fn grant_permission(&self, grant: &UserPermission) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables
            .user_permissions
            .iter()
            .any(|g| g.user_id == grant.user_id && g.permission_id == grant.permission_id)
        {
            return Err(RepoError::Conflict(
                "Duplicate entry for key 'user_permissions.uq_user_permission'".to_string(),
            ));
        }
        tables.user_permissions.push(grant.clone());
        Ok(())
    }

    fn find_service_by_slug(&self, slug: &str) -> RepoResult<Option<Service>> {
        Ok(self
            .lock()?
            .services
            .iter()
            .find(|s| s.slug == slug)
            .cloned())
    }

    fn insert_service(&self, service: &Service) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables.services.iter().any(|s| s.slug == service.slug) {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'services.slug'",
                service.slug
            )));
        }
        tables.services.push(service.clone());
        Ok(())
    }

    fn list_active_services(&self) -> RepoResult<Vec<Service>> {
        let mut rows: Vec<Service> = self
            .lock()?
            .services
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(rows)
    }
}

impl ProjectRepository for MemoryStore {
    fn find_project(&self, id: &str) -> RepoResult<Option<Project>> {
        Ok(self.lock()?.projects.iter().find(|p| p.id == id).cloned())
    }

    fn find_project_by_slug(&self, slug: &str) -> RepoResult<Option<Project>> {
        Ok(self
            .lock()?
            .projects
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    fn insert_project(&self, project: &Project) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables.projects.iter().any(|p| p.slug == project.slug) {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'projects.slug'",
                project.slug
            )));
        }
        tables.projects.push(project.clone());
        Ok(())
    }

    fn list_projects(&self, offset: i64, limit: i64) -> RepoResult<Page<Project>> {
        let tables = self.lock()?;
        let mut rows: Vec<&Project> = tables.projects.iter().collect();
        rows.sort_by(|a, b| {
            b.is_featured
                .cmp(&a.is_featured)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(page(rows, offset, limit))
    }

    fn update_project_status(&self, id: &str, status: ProjectStatus) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let project = tables
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        project.status = status;
        project.updated_at = now();
        Ok(())
    }
}

impl ContentRepository for MemoryStore {
    fn find_blog_post(&self, id: &str) -> RepoResult<Option<BlogPost>> {
        Ok(self
            .lock()?
            .blog_posts
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    fn insert_blog_post(&self, post: &BlogPost) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables.blog_posts.iter().any(|p| p.slug == post.slug) {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'blog_posts.slug'",
                post.slug
            )));
        }
        tables.blog_posts.push(post.clone());
        Ok(())
    }

    fn list_published_posts(&self, offset: i64, limit: i64) -> RepoResult<Page<BlogPost>> {
        let tables = self.lock()?;
        let mut rows: Vec<&BlogPost> = tables
            .blog_posts
            .iter()
            .filter(|p| p.status == BlogStatus::Published)
            .collect();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(page(rows, offset, limit))
    }

    fn publish_blog_post(&self, id: &str, published_at: NaiveDateTime) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let post = tables
            .blog_posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        post.status = BlogStatus::Published;
        post.published_at = Some(published_at);
        post.updated_at = now();
        Ok(())
    }
}

impl FinanceRepository for MemoryStore {
    fn insert_quotation(&self, quotation: &Quotation) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if tables
            .quotations
            .iter()
            .any(|q| q.quotation_number == quotation.quotation_number)
        {
            return Err(RepoError::Conflict(format!(
                "Duplicate entry '{}' for key 'quotations.quotation_number'",
                quotation.quotation_number
            )));
        }
        tables.quotations.push(quotation.clone());
        Ok(())
    }

    fn find_quotation(&self, id: &str) -> RepoResult<Option<Quotation>> {
        Ok(self
            .lock()?
            .quotations
            .iter()
            .find(|q| q.id == id)
            .cloned())
    }

    fn max_quotation_sequence(&self, prefix: &str) -> RepoResult<i64> {
        let tables = self.lock()?;
        Ok(max_quotation_sequence(
            prefix,
            tables.quotations.iter().map(|q| q.quotation_number.as_str()),
        ))
    }
}

impl Store for MemoryStore {
    fn ping(&self) -> RepoResult<()> {
        self.lock().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
