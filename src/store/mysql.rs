use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use super::*;
use crate::models::{max_quotation_sequence, now, BlogStatus};
use crate::schema::{
    audit_logs, blog_posts, contact_submissions, permissions, projects, quotations, services,
    settings, user_permissions, user_sessions, users,
};
use crate::DbPool;

type Conn = PooledConnection<ConnectionManager<MysqlConnection>>;

/// Diesel-backed store. Calls are blocking, matching the r2d2 pool.
#[derive(Clone)]
pub struct MysqlStore {
    pool: DbPool,
}

impl MysqlStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn conn(&self) -> RepoResult<Conn> {
        self.pool.get().map_err(|e| RepoError::Pool(e.to_string()))
    }
}

fn expect_one(affected: usize) -> RepoResult<()> {
    if affected == 0 {
        Err(RepoError::NotFound)
    } else {
        Ok(())
    }
}

impl UserRepository for MysqlStore {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_user_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_user_by_verification_token(&self, token_hash: &str) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::verification_token_hash.eq(token_hash))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_user_by_reset_token(&self, token_hash: &str) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::reset_token_hash.eq(token_hash))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_user(&self, user: &User) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table)
            .values(user)
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_password(&self, id: &str, password_hash: &str) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(users::table.find(id))
            .set((
                users::password_hash.eq(password_hash),
                users::reset_token_hash.eq(None::<String>),
                users::reset_token_expires_at.eq(None::<NaiveDateTime>),
                users::updated_at.eq(now()),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }

    fn record_failed_login(
        &self,
        id: &str,
        attempts: i32,
        locked_until: Option<NaiveDateTime>,
    ) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(users::table.find(id))
            .set((
                users::failed_login_attempts.eq(attempts),
                users::locked_until.eq(locked_until),
                users::updated_at.eq(now()),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }

    fn record_successful_login(&self, id: &str, at: NaiveDateTime) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(users::table.find(id))
            .set((
                users::failed_login_attempts.eq(0),
                users::locked_until.eq(None::<NaiveDateTime>),
                users::last_login.eq(Some(at)),
                users::updated_at.eq(at),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }

    fn set_user_status(&self, id: &str, status: UserStatus) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(users::table.find(id))
            .set((users::status.eq(status), users::updated_at.eq(now())))
            .execute(&mut conn)?;
        expect_one(affected)
    }

    fn mark_email_verified(&self, id: &str) -> RepoResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, RepoError, _>(|conn| {
            let affected = diesel::update(users::table.find(id))
                .set((
                    users::email_verified.eq(true),
                    users::verification_token_hash.eq(None::<String>),
                    users::updated_at.eq(now()),
                ))
                .execute(conn)?;
            if affected == 0 {
                return Err(RepoError::NotFound);
            }
            diesel::update(
                users::table
                    .find(id)
                    .filter(users::status.eq(UserStatus::Pending)),
            )
            .set(users::status.eq(UserStatus::Active))
            .execute(conn)?;
            Ok(())
        })
    }

    fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: NaiveDateTime,
    ) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(users::table.find(id))
            .set((
                users::reset_token_hash.eq(Some(token_hash)),
                users::reset_token_expires_at.eq(Some(expires_at)),
                users::updated_at.eq(now()),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }

    fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Page<User>> {
        let mut conn = self.conn()?;
        let total: i64 = users::table.count().get_result(&mut conn)?;
        let items = users::table
            .order(users::created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(User::as_select())
            .load(&mut conn)?;
        Ok(Page { items, total })
    }
}

impl SessionRepository for MysqlStore {
    fn create_session(&self, session: &Session) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(user_sessions::table)
            .values(session)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> RepoResult<Option<Session>> {
        let mut conn = self.conn()?;
        Ok(user_sessions::table
            .filter(user_sessions::refresh_token_hash.eq(token_hash))
            .select(Session::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn delete_session(&self, token_hash: &str) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        let affected = diesel::delete(
            user_sessions::table.filter(user_sessions::refresh_token_hash.eq(token_hash)),
        )
        .execute(&mut conn)?;
        Ok(affected > 0)
    }

    fn delete_user_sessions(&self, user_id: &str) -> RepoResult<usize> {
        let mut conn = self.conn()?;
        Ok(
            diesel::delete(user_sessions::table.filter(user_sessions::user_id.eq(user_id)))
                .execute(&mut conn)?,
        )
    }
}

impl SubmissionRepository for MysqlStore {
    fn insert_submission(&self, submission: &Submission) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(contact_submissions::table)
            .values(submission)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_submission(&self, id: &str) -> RepoResult<Option<Submission>> {
        let mut conn = self.conn()?;
        Ok(contact_submissions::table
            .find(id)
            .select(Submission::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
        offset: i64,
        limit: i64,
    ) -> RepoResult<Page<Submission>> {
        let mut conn = self.conn()?;

        let mut count_query = contact_submissions::table.into_boxed();
        let mut page_query = contact_submissions::table.into_boxed();
        if let Some(status) = status {
            count_query = count_query.filter(contact_submissions::status.eq(status));
            page_query = page_query.filter(contact_submissions::status.eq(status));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let items = page_query
            .order(contact_submissions::created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(Submission::as_select())
            .load(&mut conn)?;
        Ok(Page { items, total })
    }

    fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(contact_submissions::table.find(id))
            .set((
                contact_submissions::status.eq(status),
                contact_submissions::responded_at.eq(responded_at),
                contact_submissions::updated_at.eq(now()),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }
}

impl AuditRepository for MysqlStore {
    fn append_audit(&self, entry: &AuditEntry) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(audit_logs::table)
            .values(entry)
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_audit(&self, offset: i64, limit: i64) -> RepoResult<Page<AuditEntry>> {
        let mut conn = self.conn()?;
        let total: i64 = audit_logs::table.count().get_result(&mut conn)?;
        let items = audit_logs::table
            .order(audit_logs::created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(AuditEntry::as_select())
            .load(&mut conn)?;
        Ok(Page { items, total })
    }
}

impl SettingsRepository for MysqlStore {
    fn list_settings(&self) -> RepoResult<Vec<Setting>> {
        let mut conn = self.conn()?;
        Ok(settings::table
            .order(settings::setting_key.asc())
            .select(Setting::as_select())
            .load(&mut conn)?)
    }
}

impl CatalogRepository for MysqlStore {
    fn find_permission_by_name(&self, name: &str) -> RepoResult<Option<Permission>> {
        let mut conn = self.conn()?;
        Ok(permissions::table
            .filter(permissions::name.eq(name))
            .select(Permission::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_permission(&self, permission: &Permission) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(permissions::table)
            .values(permission)
            .execute(&mut conn)?;
        Ok(())
    }

    fn has_user_permission(&self, user_id: &str, permission_id: &str) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = user_permissions::table
            .filter(user_permissions::user_id.eq(user_id))
            .filter(user_permissions::permission_id.eq(permission_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    fn grant_permission(&self, grant: &UserPermission) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(user_permissions::table)
            .values(grant)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_service_by_slug(&self, slug: &str) -> RepoResult<Option<Service>> {
        let mut conn = self.conn()?;
        Ok(services::table
            .filter(services::slug.eq(slug))
            .select(Service::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_service(&self, service: &Service) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(services::table)
            .values(service)
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_active_services(&self) -> RepoResult<Vec<Service>> {
        let mut conn = self.conn()?;
        Ok(services::table
            .filter(services::is_active.eq(true))
            .order((services::sort_order.asc(), services::title.asc()))
            .select(Service::as_select())
            .load(&mut conn)?)
    }
}

impl ProjectRepository for MysqlStore {
    fn find_project(&self, id: &str) -> RepoResult<Option<Project>> {
        let mut conn = self.conn()?;
        Ok(projects::table
            .find(id)
            .select(Project::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn find_project_by_slug(&self, slug: &str) -> RepoResult<Option<Project>> {
        let mut conn = self.conn()?;
        Ok(projects::table
            .filter(projects::slug.eq(slug))
            .select(Project::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_project(&self, project: &Project) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(projects::table)
            .values(project)
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_projects(&self, offset: i64, limit: i64) -> RepoResult<Page<Project>> {
        let mut conn = self.conn()?;
        let total: i64 = projects::table.count().get_result(&mut conn)?;
        let items = projects::table
            .order((projects::is_featured.desc(), projects::created_at.desc()))
            .offset(offset)
            .limit(limit)
            .select(Project::as_select())
            .load(&mut conn)?;
        Ok(Page { items, total })
    }

    fn update_project_status(&self, id: &str, status: ProjectStatus) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(projects::table.find(id))
            .set((projects::status.eq(status), projects::updated_at.eq(now())))
            .execute(&mut conn)?;
        expect_one(affected)
    }
}

impl ContentRepository for MysqlStore {
    fn find_blog_post(&self, id: &str) -> RepoResult<Option<BlogPost>> {
        let mut conn = self.conn()?;
        Ok(blog_posts::table
            .find(id)
            .select(BlogPost::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_blog_post(&self, post: &BlogPost) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(blog_posts::table)
            .values(post)
            .execute(&mut conn)?;
        Ok(())
    }

    fn list_published_posts(&self, offset: i64, limit: i64) -> RepoResult<Page<BlogPost>> {
        let mut conn = self.conn()?;
        let total: i64 = blog_posts::table
            .filter(blog_posts::status.eq(BlogStatus::Published))
            .count()
            .get_result(&mut conn)?;
        let items = blog_posts::table
            .filter(blog_posts::status.eq(BlogStatus::Published))
            .order(blog_posts::published_at.desc())
            .offset(offset)
            .limit(limit)
            .select(BlogPost::as_select())
            .load(&mut conn)?;
        Ok(Page { items, total })
    }

    fn publish_blog_post(&self, id: &str, published_at: NaiveDateTime) -> RepoResult<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(blog_posts::table.find(id))
            .set((
                blog_posts::status.eq(BlogStatus::Published),
                blog_posts::published_at.eq(Some(published_at)),
                blog_posts::updated_at.eq(now()),
            ))
            .execute(&mut conn)?;
        expect_one(affected)
    }
}

impl FinanceRepository for MysqlStore {
    fn insert_quotation(&self, quotation: &Quotation) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(quotations::table)
            .values(quotation)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_quotation(&self, id: &str) -> RepoResult<Option<Quotation>> {
        let mut conn = self.conn()?;
        Ok(quotations::table
            .find(id)
            .select(Quotation::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn max_quotation_sequence(&self, prefix: &str) -> RepoResult<i64> {
        let mut conn = self.conn()?;
        let numbers: Vec<String> = quotations::table
            .filter(quotations::quotation_number.like(format!("{}%", prefix)))
            .select(quotations::quotation_number)
            .load(&mut conn)?;
        Ok(max_quotation_sequence(
            prefix,
            numbers.iter().map(String::as_str),
        ))
    }
}

impl Store for MysqlStore {
    fn ping(&self) -> RepoResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mysql"
    }
}
