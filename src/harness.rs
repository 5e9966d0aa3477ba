//! CRUD verification harness.
//!
//! For every table: insert a row, read it back by id, update one column,
//! read again, delete, and confirm nothing is left. Each assertion is tallied
//! under a label; a table that errors out is recorded as a failure and the
//! run moves on to the next table.

use chrono::Duration;
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::models::{
    new_id, now, AuditEntry, BlogPost, BlogStatus, Invoice, InvoiceStatus, Milestone,
    Permission, Project, ProjectMedia, ProjectStatus, Quotation, QuotationStatus, Role, Service,
    Session, Setting, StoredFile, Submission, SubmissionStatus, SubmissionType, SystemLog, User,
    UserPermission, UserStatus,
};
use crate::schema;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type HarnessResult = Result<(), HarnessError>;

/// Pass/fail counts per labelled assertion.
#[derive(Debug, Default, Clone)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

impl Tally {
    pub fn check(&mut self, label: impl Into<String>, ok: bool) -> bool {
        let label = label.into();
        if ok {
            self.passed += 1;
            info!(assertion = %label, "PASS");
        } else {
            self.failed += 1;
            error!(assertion = %label, "FAIL");
            self.failures.push(label);
        }
        ok
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} assertions: {} passed, {} failed",
            self.total(),
            self.passed,
            self.failed
        )
    }
}

/// One table's round trip over a connection of type `C`.
pub trait CrudCase<C> {
    fn table(&self) -> &'static str;
    fn run(&self, conn: &mut C, tally: &mut Tally) -> HarnessResult;
}

pub struct FnCase<C> {
    pub table: &'static str,
    pub run: fn(&mut C, &mut Tally) -> HarnessResult,
}

impl<C> CrudCase<C> for FnCase<C> {
    fn table(&self) -> &'static str {
        self.table
    }

    fn run(&self, conn: &mut C, tally: &mut Tally) -> HarnessResult {
        (self.run)(conn, tally)
    }
}

/// Runs one case; an error becomes a failed assertion instead of aborting.
pub fn run_case<C>(case: &dyn CrudCase<C>, conn: &mut C, tally: &mut Tally) {
    info!(table = case.table(), "Checking table");
    if let Err(e) = case.run(conn, tally) {
        tally.check(format!("{}: round trip completed ({})", case.table(), e), false);
    }
}

pub fn run_all<C>(cases: &[Box<dyn CrudCase<C>>], conn: &mut C) -> Tally {
    let mut tally = Tally::default();
    for case in cases {
        run_case(case.as_ref(), conn, &mut tally);
    }
    info!(
        passed = tally.passed,
        failed = tally.failed,
        "CRUD verification finished"
    );
    tally
}

// ============================================================================
// MySQL cases
// ============================================================================

/// insert → read → update → read → delete → read for one model row.
macro_rules! round_trip {
    ($conn:expr, $tally:expr, $table:ident, $model:ty, $row:expr, $changes:expr, |$expected:ident| $apply:block) => {{
        let name = stringify!($table);
        let row: $model = $row;

        let inserted = diesel::insert_into(schema::$table::table)
            .values(&row)
            .execute($conn)?;
        $tally.check(format!("{}: insert affects one row", name), inserted == 1);

        let read = schema::$table::table
            .find(row.id.clone())
            .select(<$model>::as_select())
            .first::<$model>($conn)
            .optional()?;
        $tally.check(
            format!("{}: read-after-write equals written values", name),
            read.as_ref() == Some(&row),
        );

        let updated = diesel::update(schema::$table::table.find(row.id.clone()))
            .set($changes)
            .execute($conn)?;
        $tally.check(format!("{}: update affects one row", name), updated == 1);

        #[allow(unused_mut)]
        let mut $expected = row.clone();
        $apply
        let after = schema::$table::table
            .find(row.id.clone())
            .select(<$model>::as_select())
            .first::<$model>($conn)
            .optional()?;
        $tally.check(
            format!("{}: update changes only the updated fields", name),
            after.as_ref() == Some(&$expected),
        );

        let deleted = diesel::delete(schema::$table::table.find(row.id.clone())).execute($conn)?;
        $tally.check(format!("{}: delete affects one row", name), deleted == 1);

        let remaining: i64 = schema::$table::table
            .find(row.id.clone())
            .count()
            .get_result($conn)?;
        $tally.check(
            format!("{}: delete-after-write reads zero rows", name),
            remaining == 0,
        );
    }};
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &new_id()[..8])
}

fn fixture_user(conn: &mut MysqlConnection) -> QueryResult<User> {
    let mut user = User::new(
        format!("{}@harness.local", unique("crud")),
        "$2b$04$harnessharnessharnessharnessharnessharnessharnessharn".to_string(),
        "Crud".to_string(),
        "Harness".to_string(),
    );
    user.status = UserStatus::Active;
    diesel::insert_into(schema::users::table)
        .values(&user)
        .execute(conn)?;
    Ok(user)
}

fn fixture_project(conn: &mut MysqlConnection) -> QueryResult<Project> {
    let project = project_row(unique("harness-project"));
    diesel::insert_into(schema::projects::table)
        .values(&project)
        .execute(conn)?;
    Ok(project)
}

fn fixture_permission(conn: &mut MysqlConnection) -> QueryResult<Permission> {
    let permission = Permission {
        id: new_id(),
        name: unique("harness.permission"),
        category: "harness".to_string(),
        description: None,
        created_at: now(),
    };
    diesel::insert_into(schema::permissions::table)
        .values(&permission)
        .execute(conn)?;
    Ok(permission)
}

fn fixture_file(conn: &mut MysqlConnection) -> QueryResult<StoredFile> {
    let file = file_row();
    diesel::insert_into(schema::files::table)
        .values(&file)
        .execute(conn)?;
    Ok(file)
}

fn project_row(slug: String) -> Project {
    let ts = now();
    Project {
        id: new_id(),
        title: "Harness Project".to_string(),
        slug,
        description: Some("Created by the CRUD harness".to_string()),
        category: Some("residential".to_string()),
        location: Some("Nairobi".to_string()),
        status: ProjectStatus::Planning,
        budget: Some(Decimal::new(1_250_000_00, 2)),
        start_date: Some(ts.date()),
        end_date: None,
        is_featured: false,
        created_by: None,
        created_at: ts,
        updated_at: ts,
    }
}

fn file_row() -> StoredFile {
    StoredFile {
        id: new_id(),
        original_name: "site-plan.pdf".to_string(),
        stored_name: format!("{}.pdf", new_id()),
        mime_type: "application/pdf".to_string(),
        size_bytes: 48_213,
        uploaded_by: None,
        created_at: now(),
    }
}

fn line_items() -> serde_json::Value {
    serde_json::json!([
        {"description": "Foundation", "quantity": "1", "unitPrice": "250000.00"}
    ])
}

/// Runs `body`, then `cleanup`, and returns the body's result.
fn guarded<F, G>(conn: &mut MysqlConnection, cleanup: G, body: F) -> HarnessResult
where
    F: FnOnce(&mut MysqlConnection) -> HarnessResult,
    G: FnOnce(&mut MysqlConnection) -> QueryResult<usize>,
{
    let outcome = body(conn);
    if let Err(e) = cleanup(conn) {
        error!(error = %e, "Harness fixture cleanup failed");
    }
    outcome
}

fn users(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let mut row = User::new(
        format!("{}@harness.local", unique("users")),
        "$2b$04$harnessharnessharnessharnessharnessharnessharnessharn".to_string(),
        "Amani".to_string(),
        "Kamau".to_string(),
    );
    row.role = Role::Admin;
    round_trip!(
        conn,
        tally,
        users,
        User,
        row,
        schema::users::first_name.eq("Updated"),
        |expected| {
            expected.first_name = "Updated".to_string();
        }
    );
    Ok(())
}

fn permissions(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    round_trip!(
        conn,
        tally,
        permissions,
        Permission,
        Permission {
            id: new_id(),
            name: unique("harness.check"),
            category: "harness".to_string(),
            description: Some("Original".to_string()),
            created_at: now(),
        },
        schema::permissions::description.eq(Some("Changed")),
        |expected| {
            expected.description = Some("Changed".to_string());
        }
    );
    Ok(())
}

fn user_permissions(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let user = fixture_user(conn)?;
    let permission = match fixture_permission(conn) {
        Ok(p) => p,
        Err(e) => {
            let _ = diesel::delete(schema::users::table.find(&user.id)).execute(conn);
            return Err(e.into());
        }
    };
    let (user_id, permission_id) = (user.id.clone(), permission.id.clone());
    let granted_at = now() - Duration::days(1);

    guarded(
        conn,
        |c| {
            diesel::delete(schema::users::table.find(&user_id)).execute(c)?;
            diesel::delete(schema::permissions::table.find(&permission_id)).execute(c)
        },
        |conn| {
            round_trip!(
                conn,
                tally,
                user_permissions,
                UserPermission,
                UserPermission {
                    id: new_id(),
                    user_id: user.id.clone(),
                    permission_id: permission.id.clone(),
                    granted_by: None,
                    granted_at: now(),
                },
                schema::user_permissions::granted_at.eq(granted_at),
                |expected| {
                    expected.granted_at = granted_at;
                }
            );
            Ok(())
        },
    )
}

fn services(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    let price = Decimal::new(4_500_000, 2);
    round_trip!(
        conn,
        tally,
        services,
        Service,
        Service {
            id: new_id(),
            title: "Harness Service".to_string(),
            slug: unique("harness-service"),
            description: "Created by the CRUD harness".to_string(),
            starting_price: Some(Decimal::new(3_000_000, 2)),
            currency: "KES".to_string(),
            is_active: true,
            sort_order: 99,
            created_at: ts,
            updated_at: ts,
        },
        schema::services::starting_price.eq(Some(price)),
        |expected| {
            expected.starting_price = Some(price);
        }
    );
    Ok(())
}

fn projects(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    round_trip!(
        conn,
        tally,
        projects,
        Project,
        project_row(unique("harness-projects")),
        schema::projects::status.eq(ProjectStatus::InProgress),
        |expected| {
            expected.status = ProjectStatus::InProgress;
        }
    );
    Ok(())
}

fn project_milestones(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let project = fixture_project(conn)?;
    let project_id = project.id.clone();
    guarded(
        conn,
        |c| diesel::delete(schema::projects::table.find(&project_id)).execute(c),
        |conn| {
            round_trip!(
                conn,
                tally,
                project_milestones,
                Milestone,
                Milestone {
                    id: new_id(),
                    project_id: project.id.clone(),
                    title: "Foundation poured".to_string(),
                    due_date: Some(now().date()),
                    completed: false,
                    sort_order: 1,
                    created_at: now(),
                },
                schema::project_milestones::completed.eq(true),
                |expected| {
                    expected.completed = true;
                }
            );
            Ok(())
        },
    )
}

fn quotations(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    round_trip!(
        conn,
        tally,
        quotations,
        Quotation,
        Quotation {
            id: new_id(),
            quotation_number: unique("QT-HARNESS"),
            client_name: "Harness Client".to_string(),
            client_email: "client@harness.local".to_string(),
            project_id: None,
            items: line_items(),
            subtotal: Decimal::new(25_000_000, 2),
            tax_rate: Decimal::new(16, 0),
            tax_amount: Decimal::new(4_000_000, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(29_000_000, 2),
            status: QuotationStatus::Draft,
            valid_until: Some(ts.date()),
            created_by: None,
            created_at: ts,
            updated_at: ts,
        },
        schema::quotations::status.eq(QuotationStatus::Sent),
        |expected| {
            expected.status = QuotationStatus::Sent;
        }
    );
    Ok(())
}

fn invoices(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    let paid = Decimal::new(10_000_000, 2);
    let balance = Decimal::new(19_000_000, 2);
    round_trip!(
        conn,
        tally,
        invoices,
        Invoice,
        Invoice {
            id: new_id(),
            invoice_number: unique("INV-HARNESS"),
            quotation_id: None,
            client_name: "Harness Client".to_string(),
            client_email: "client@harness.local".to_string(),
            items: line_items(),
            subtotal: Decimal::new(25_000_000, 2),
            tax_rate: Decimal::new(16, 0),
            tax_amount: Decimal::new(4_000_000, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(29_000_000, 2),
            amount_paid: Decimal::ZERO,
            balance: Decimal::new(29_000_000, 2),
            status: InvoiceStatus::Sent,
            due_date: Some(ts.date()),
            created_by: None,
            created_at: ts,
            updated_at: ts,
        },
        (
            schema::invoices::amount_paid.eq(paid),
            schema::invoices::balance.eq(balance),
        ),
        |expected| {
            expected.amount_paid = paid;
            expected.balance = balance;
        }
    );
    Ok(())
}

fn blog_posts(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    round_trip!(
        conn,
        tally,
        blog_posts,
        BlogPost,
        BlogPost {
            id: new_id(),
            title: "Harness Post".to_string(),
            slug: unique("harness-post"),
            excerpt: None,
            content: "Body".to_string(),
            status: BlogStatus::Draft,
            author_id: None,
            published_at: None,
            created_at: ts,
            updated_at: ts,
        },
        (
            schema::blog_posts::status.eq(BlogStatus::Published),
            schema::blog_posts::published_at.eq(Some(ts)),
        ),
        |expected| {
            expected.status = BlogStatus::Published;
            expected.published_at = Some(ts);
        }
    );
    Ok(())
}

fn contact_submissions(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    round_trip!(
        conn,
        tally,
        contact_submissions,
        Submission,
        Submission {
            id: new_id(),
            submission_type: SubmissionType::Quote,
            first_name: "Harness".to_string(),
            last_name: "Client".to_string(),
            email: "client@harness.local".to_string(),
            phone: Some("0700000000".to_string()),
            subject: Some("Quote request: residential".to_string()),
            message: Some("Three-bedroom bungalow".to_string()),
            details: Some(serde_json::json!({"services": ["residential-construction"]})),
            status: SubmissionStatus::New,
            responded_at: None,
            created_at: ts,
            updated_at: ts,
        },
        (
            schema::contact_submissions::status.eq(SubmissionStatus::Contacted),
            schema::contact_submissions::responded_at.eq(Some(ts)),
        ),
        |expected| {
            expected.status = SubmissionStatus::Contacted;
            expected.responded_at = Some(ts);
        }
    );
    Ok(())
}

fn settings(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let ts = now();
    round_trip!(
        conn,
        tally,
        settings,
        Setting,
        Setting {
            id: new_id(),
            setting_key: unique("harness_key"),
            setting_value: "before".to_string(),
            created_at: ts,
            updated_at: ts,
        },
        schema::settings::setting_value.eq("after"),
        |expected| {
            expected.setting_value = "after".to_string();
        }
    );
    Ok(())
}

fn system_logs(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    round_trip!(
        conn,
        tally,
        system_logs,
        SystemLog,
        SystemLog {
            id: new_id(),
            level: "info".to_string(),
            message: "harness entry".to_string(),
            context: Some(serde_json::json!({"source": "crud-check"})),
            created_at: now(),
        },
        schema::system_logs::level.eq("warn"),
        |expected| {
            expected.level = "warn".to_string();
        }
    );
    Ok(())
}

fn audit_logs(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    round_trip!(
        conn,
        tally,
        audit_logs,
        AuditEntry,
        AuditEntry {
            id: new_id(),
            user_id: None,
            action: "harness.created".to_string(),
            resource_type: "harness".to_string(),
            resource_id: Some(new_id()),
            details: None,
            ip_address: Some("127.0.0.1".to_string()),
            created_at: now(),
        },
        schema::audit_logs::action.eq("harness.updated"),
        |expected| {
            expected.action = "harness.updated".to_string();
        }
    );
    Ok(())
}

fn files(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    round_trip!(
        conn,
        tally,
        files,
        StoredFile,
        file_row(),
        schema::files::original_name.eq("renamed.pdf"),
        |expected| {
            expected.original_name = "renamed.pdf".to_string();
        }
    );
    Ok(())
}

fn project_media(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let project = fixture_project(conn)?;
    let file = match fixture_file(conn) {
        Ok(f) => f,
        Err(e) => {
            let _ = diesel::delete(schema::projects::table.find(&project.id)).execute(conn);
            return Err(e.into());
        }
    };
    let (project_id, file_id) = (project.id.clone(), file.id.clone());

    guarded(
        conn,
        |c| {
            diesel::delete(schema::projects::table.find(&project_id)).execute(c)?;
            diesel::delete(schema::files::table.find(&file_id)).execute(c)
        },
        |conn| {
            round_trip!(
                conn,
                tally,
                project_media,
                ProjectMedia,
                ProjectMedia {
                    id: new_id(),
                    project_id: project.id.clone(),
                    file_id: file.id.clone(),
                    caption: Some("Front elevation".to_string()),
                    sort_order: 0,
                    created_at: now(),
                },
                schema::project_media::caption.eq(Some("Rear elevation")),
                |expected| {
                    expected.caption = Some("Rear elevation".to_string());
                }
            );
            Ok(())
        },
    )
}

fn user_sessions(conn: &mut MysqlConnection, tally: &mut Tally) -> HarnessResult {
    let user = fixture_user(conn)?;
    let user_id = user.id.clone();
    guarded(
        conn,
        |c| diesel::delete(schema::users::table.find(&user_id)).execute(c),
        |conn| {
            round_trip!(
                conn,
                tally,
                user_sessions,
                Session,
                Session {
                    id: new_id(),
                    user_id: user.id.clone(),
                    refresh_token_hash: crate::auth::service::hash_token(&new_id()),
                    user_agent: Some("crud-check/1".to_string()),
                    ip_address: Some("127.0.0.1".to_string()),
                    expires_at: now() + Duration::days(7),
                    created_at: now(),
                },
                schema::user_sessions::user_agent.eq(Some("crud-check/2")),
                |expected| {
                    expected.user_agent = Some("crud-check/2".to_string());
                }
            );
            Ok(())
        },
    )
}

/// One case per table, in foreign-key order.
pub fn mysql_cases() -> Vec<Box<dyn CrudCase<MysqlConnection>>> {
    let cases: [(&'static str, fn(&mut MysqlConnection, &mut Tally) -> HarnessResult); 16] = [
        ("users", users),
        ("permissions", permissions),
        ("user_permissions", user_permissions),
        ("services", services),
        ("projects", projects),
        ("project_milestones", project_milestones),
        ("quotations", quotations),
        ("invoices", invoices),
        ("blog_posts", blog_posts),
        ("contact_submissions", contact_submissions),
        ("settings", settings),
        ("system_logs", system_logs),
        ("audit_logs", audit_logs),
        ("files", files),
        ("project_media", project_media),
        ("user_sessions", user_sessions),
    ];

    cases
        .into_iter()
        .map(|(table, run)| Box::new(FnCase { table, run }) as Box<dyn CrudCase<MysqlConnection>>)
        .collect()
}
