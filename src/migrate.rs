//! Idempotent schema creation.
//!
//! Every table is created with `CREATE TABLE IF NOT EXISTS`, columns added
//! after the initial release are patched in only when `information_schema`
//! says they are missing, and default settings use `INSERT IGNORE` against the
//! unique key. The first failing statement aborts the run; nothing is rolled
//! back.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use tracing::{debug, info};

pub type ExecError = Box<dyn std::error::Error + Send + Sync>;

/// The two primitives the migrator needs from a database connection.
pub trait SchemaExecutor {
    fn run_statement(&mut self, sql: &str) -> Result<usize, ExecError>;
    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, ExecError>;
}

#[derive(QueryableByName)]
struct ColumnCount {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

impl SchemaExecutor for MysqlConnection {
    fn run_statement(&mut self, sql: &str) -> Result<usize, ExecError> {
        Ok(diesel::sql_query(sql).execute(self)?)
    }

    fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, ExecError> {
        let row: ColumnCount = diesel::sql_query(
            "SELECT COUNT(*) AS n FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?",
        )
        .bind::<Text, _>(table)
        .bind::<Text, _>(column)
        .get_result(self)?;
        Ok(row.n > 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("failed to create table `{table}`: {source}")]
    CreateTable {
        table: &'static str,
        source: ExecError,
    },
    #[error("failed to inspect column `{table}.{column}`: {source}")]
    InspectColumn {
        table: &'static str,
        column: &'static str,
        source: ExecError,
    },
    #[error("failed to add column `{table}.{column}`: {source}")]
    AddColumn {
        table: &'static str,
        column: &'static str,
        source: ExecError,
    },
    #[error("failed to insert default setting `{key}`: {source}")]
    DefaultSetting { key: &'static str, source: ExecError },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigrationReport {
    pub tables_ensured: usize,
    pub columns_added: Vec<String>,
    pub settings_inserted: usize,
}

pub struct TableDef {
    pub name: &'static str,
    pub ddl: &'static str,
}

/// A column that older deployments may lack.
pub struct ColumnPatch {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("company_name", "Akibeks Engineering Solutions"),
    ("company_email", "info@akibeks.co.ke"),
    ("company_phone", "+254 710 245 118"),
    ("company_address", "Nairobi, Kenya"),
    ("website_title", "Akibeks Engineering Solutions"),
    (
        "website_description",
        "Construction, renovation and civil engineering services across Kenya",
    ),
];

/// Creation order respects foreign keys.
pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "users",
        ddl: r#"CREATE TABLE IF NOT EXISTS users (
    id CHAR(36) NOT NULL PRIMARY KEY,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    phone VARCHAR(30) NULL,
    role VARCHAR(20) NOT NULL DEFAULT 'user',
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    email_verified TINYINT(1) NOT NULL DEFAULT 0,
    verification_token_hash VARCHAR(64) NULL,
    reset_token_hash VARCHAR(64) NULL,
    reset_token_expires_at DATETIME NULL,
    failed_login_attempts INT NOT NULL DEFAULT 0,
    locked_until DATETIME NULL,
    two_factor_secret VARCHAR(255) NULL,
    last_login DATETIME NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_users_email (email),
    KEY idx_users_status (status)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "permissions",
        ddl: r#"CREATE TABLE IF NOT EXISTS permissions (
    id CHAR(36) NOT NULL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    category VARCHAR(50) NOT NULL,
    description VARCHAR(255) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_permissions_name (name)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "user_permissions",
        ddl: r#"CREATE TABLE IF NOT EXISTS user_permissions (
    id CHAR(36) NOT NULL PRIMARY KEY,
    user_id CHAR(36) NOT NULL,
    permission_id CHAR(36) NOT NULL,
    granted_by CHAR(36) NULL,
    granted_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_user_permission (user_id, permission_id),
    CONSTRAINT fk_user_permissions_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
    CONSTRAINT fk_user_permissions_permission FOREIGN KEY (permission_id) REFERENCES permissions (id) ON DELETE CASCADE,
    CONSTRAINT fk_user_permissions_granter FOREIGN KEY (granted_by) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "services",
        ddl: r#"CREATE TABLE IF NOT EXISTS services (
    id CHAR(36) NOT NULL PRIMARY KEY,
    title VARCHAR(150) NOT NULL,
    slug VARCHAR(150) NOT NULL,
    description TEXT NOT NULL,
    starting_price DECIMAL(12,2) NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'KES',
    is_active TINYINT(1) NOT NULL DEFAULT 1,
    sort_order INT NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_services_slug (slug)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "projects",
        ddl: r#"CREATE TABLE IF NOT EXISTS projects (
    id CHAR(36) NOT NULL PRIMARY KEY,
    title VARCHAR(200) NOT NULL,
    slug VARCHAR(200) NOT NULL,
    description TEXT NULL,
    category VARCHAR(100) NULL,
    location VARCHAR(150) NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'planning',
    budget DECIMAL(14,2) NULL,
    start_date DATE NULL,
    end_date DATE NULL,
    is_featured TINYINT(1) NOT NULL DEFAULT 0,
    created_by CHAR(36) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_projects_slug (slug),
    KEY idx_projects_status (status),
    CONSTRAINT fk_projects_creator FOREIGN KEY (created_by) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "project_milestones",
        ddl: r#"CREATE TABLE IF NOT EXISTS project_milestones (
    id CHAR(36) NOT NULL PRIMARY KEY,
    project_id CHAR(36) NOT NULL,
    title VARCHAR(200) NOT NULL,
    due_date DATE NULL,
    completed TINYINT(1) NOT NULL DEFAULT 0,
    sort_order INT NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_milestones_project FOREIGN KEY (project_id) REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "quotations",
        ddl: r#"CREATE TABLE IF NOT EXISTS quotations (
    id CHAR(36) NOT NULL PRIMARY KEY,
    quotation_number VARCHAR(30) NOT NULL,
    client_name VARCHAR(200) NOT NULL,
    client_email VARCHAR(255) NOT NULL,
    project_id CHAR(36) NULL,
    items JSON NOT NULL,
    subtotal DECIMAL(14,2) NOT NULL DEFAULT 0,
    tax_rate DECIMAL(5,2) NOT NULL DEFAULT 16,
    tax_amount DECIMAL(14,2) NOT NULL DEFAULT 0,
    discount DECIMAL(14,2) NOT NULL DEFAULT 0,
    total DECIMAL(14,2) NOT NULL DEFAULT 0,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    valid_until DATE NULL,
    created_by CHAR(36) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_quotations_number (quotation_number),
    CONSTRAINT fk_quotations_project FOREIGN KEY (project_id) REFERENCES projects (id) ON DELETE SET NULL,
    CONSTRAINT fk_quotations_creator FOREIGN KEY (created_by) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "invoices",
        ddl: r#"CREATE TABLE IF NOT EXISTS invoices (
    id CHAR(36) NOT NULL PRIMARY KEY,
    invoice_number VARCHAR(30) NOT NULL,
    quotation_id CHAR(36) NULL,
    client_name VARCHAR(200) NOT NULL,
    client_email VARCHAR(255) NOT NULL,
    items JSON NOT NULL,
    subtotal DECIMAL(14,2) NOT NULL DEFAULT 0,
    tax_rate DECIMAL(5,2) NOT NULL DEFAULT 16,
    tax_amount DECIMAL(14,2) NOT NULL DEFAULT 0,
    discount DECIMAL(14,2) NOT NULL DEFAULT 0,
    total DECIMAL(14,2) NOT NULL DEFAULT 0,
    amount_paid DECIMAL(14,2) NOT NULL DEFAULT 0,
    balance DECIMAL(14,2) NOT NULL DEFAULT 0,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    due_date DATE NULL,
    created_by CHAR(36) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_invoices_number (invoice_number),
    CONSTRAINT fk_invoices_quotation FOREIGN KEY (quotation_id) REFERENCES quotations (id) ON DELETE SET NULL,
    CONSTRAINT fk_invoices_creator FOREIGN KEY (created_by) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "blog_posts",
        ddl: r#"CREATE TABLE IF NOT EXISTS blog_posts (
    id CHAR(36) NOT NULL PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    slug VARCHAR(255) NOT NULL,
    excerpt VARCHAR(500) NULL,
    content LONGTEXT NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    author_id CHAR(36) NULL,
    published_at DATETIME NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_blog_posts_slug (slug),
    CONSTRAINT fk_blog_posts_author FOREIGN KEY (author_id) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "contact_submissions",
        ddl: r#"CREATE TABLE IF NOT EXISTS contact_submissions (
    id CHAR(36) NOT NULL PRIMARY KEY,
    submission_type VARCHAR(20) NOT NULL DEFAULT 'contact',
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL,
    phone VARCHAR(30) NULL,
    subject VARCHAR(255) NULL,
    message TEXT NULL,
    details JSON NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'new',
    responded_at DATETIME NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    KEY idx_contact_submissions_status (status)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "settings",
        ddl: r#"CREATE TABLE IF NOT EXISTS settings (
    id CHAR(36) NOT NULL PRIMARY KEY,
    setting_key VARCHAR(100) NOT NULL,
    setting_value TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_settings_key (setting_key)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "system_logs",
        ddl: r#"CREATE TABLE IF NOT EXISTS system_logs (
    id CHAR(36) NOT NULL PRIMARY KEY,
    level VARCHAR(10) NOT NULL,
    message TEXT NOT NULL,
    context JSON NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    KEY idx_system_logs_created (created_at)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "audit_logs",
        ddl: r#"CREATE TABLE IF NOT EXISTS audit_logs (
    id CHAR(36) NOT NULL PRIMARY KEY,
    user_id CHAR(36) NULL,
    action VARCHAR(100) NOT NULL,
    resource_type VARCHAR(50) NOT NULL,
    resource_id VARCHAR(64) NULL,
    details JSON NULL,
    ip_address VARCHAR(45) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    KEY idx_audit_logs_created (created_at),
    CONSTRAINT fk_audit_logs_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "files",
        ddl: r#"CREATE TABLE IF NOT EXISTS files (
    id CHAR(36) NOT NULL PRIMARY KEY,
    original_name VARCHAR(255) NOT NULL,
    stored_name VARCHAR(255) NOT NULL,
    mime_type VARCHAR(100) NOT NULL,
    size_bytes BIGINT NOT NULL,
    uploaded_by CHAR(36) NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_files_stored_name (stored_name),
    CONSTRAINT fk_files_uploader FOREIGN KEY (uploaded_by) REFERENCES users (id) ON DELETE SET NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "project_media",
        ddl: r#"CREATE TABLE IF NOT EXISTS project_media (
    id CHAR(36) NOT NULL PRIMARY KEY,
    project_id CHAR(36) NOT NULL,
    file_id CHAR(36) NOT NULL,
    caption VARCHAR(255) NULL,
    sort_order INT NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_project_media_project FOREIGN KEY (project_id) REFERENCES projects (id) ON DELETE CASCADE,
    CONSTRAINT fk_project_media_file FOREIGN KEY (file_id) REFERENCES files (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
    TableDef {
        name: "user_sessions",
        ddl: r#"CREATE TABLE IF NOT EXISTS user_sessions (
    id CHAR(36) NOT NULL PRIMARY KEY,
    user_id CHAR(36) NOT NULL,
    refresh_token_hash VARCHAR(64) NOT NULL,
    user_agent VARCHAR(255) NULL,
    ip_address VARCHAR(45) NULL,
    expires_at DATETIME NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_user_sessions_token (refresh_token_hash),
    CONSTRAINT fk_user_sessions_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"#,
    },
];

pub const COLUMN_PATCHES: &[ColumnPatch] = &[
    ColumnPatch {
        table: "users",
        column: "two_factor_secret",
        definition: "VARCHAR(255) NULL",
    },
    ColumnPatch {
        table: "users",
        column: "last_login",
        definition: "DATETIME NULL",
    },
    ColumnPatch {
        table: "users",
        column: "reset_token_hash",
        definition: "VARCHAR(64) NULL",
    },
    ColumnPatch {
        table: "users",
        column: "reset_token_expires_at",
        definition: "DATETIME NULL",
    },
    ColumnPatch {
        table: "projects",
        column: "is_featured",
        definition: "TINYINT(1) NOT NULL DEFAULT 0",
    },
    ColumnPatch {
        table: "contact_submissions",
        column: "submission_type",
        definition: "VARCHAR(20) NOT NULL DEFAULT 'contact'",
    },
    ColumnPatch {
        table: "contact_submissions",
        column: "details",
        definition: "JSON NULL",
    },
];

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

pub fn default_setting_sql(key: &str, value: &str) -> String {
    format!(
        "INSERT IGNORE INTO settings (id, setting_key, setting_value, created_at, updated_at) \
         VALUES (UUID(), {}, {}, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
        quote(key),
        quote(value)
    )
}

/// Brings the schema up to date. Safe to run on every startup.
pub fn run_migrations<E>(exec: &mut E) -> Result<MigrationReport, MigrationError>
where
    E: SchemaExecutor + ?Sized,
{
    let mut report = MigrationReport::default();

    for table in TABLES {
        exec.run_statement(table.ddl)
            .map_err(|source| MigrationError::CreateTable {
                table: table.name,
                source,
            })?;
        debug!(table = table.name, "Table ensured");
        report.tables_ensured += 1;
    }

    for patch in COLUMN_PATCHES {
        let exists = exec
            .column_exists(patch.table, patch.column)
            .map_err(|source| MigrationError::InspectColumn {
                table: patch.table,
                column: patch.column,
                source,
            })?;
        if exists {
            continue;
        }

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            patch.table, patch.column, patch.definition
        );
        exec.run_statement(&sql)
            .map_err(|source| MigrationError::AddColumn {
                table: patch.table,
                column: patch.column,
                source,
            })?;
        info!(table = patch.table, column = patch.column, "Column added");
        report
            .columns_added
            .push(format!("{}.{}", patch.table, patch.column));
    }

    for &(key, value) in DEFAULT_SETTINGS {
        let inserted = exec
            .run_statement(&default_setting_sql(key, value))
            .map_err(|source| MigrationError::DefaultSetting { key, source })?;
        report.settings_inserted += inserted;
    }

    info!(
        tables = report.tables_ensured,
        columns_added = report.columns_added.len(),
        settings_inserted = report.settings_inserted,
        "Migrations complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Records statements and models just enough state to exercise the migrator.
    #[derive(Default)]
    struct FakeExecutor {
        statements: Vec<String>,
        tables: HashSet<String>,
        columns: HashSet<(String, String)>,
        settings: HashSet<String>,
        fail_on: Option<&'static str>,
    }

    impl SchemaExecutor for FakeExecutor {
        fn run_statement(&mut self, sql: &str) -> Result<usize, ExecError> {
            if let Some(needle) = self.fail_on {
                if sql.contains(needle) {
                    return Err("simulated failure".into());
                }
            }
            self.statements.push(sql.to_string());

            if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
                let name = rest.split_whitespace().next().unwrap_or_default();
                self.tables.insert(name.to_string());
                return Ok(0);
            }
            if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                self.columns
                    .insert((parts[0].to_string(), parts[3].to_string()));
                return Ok(0);
            }
            if sql.starts_with("INSERT IGNORE INTO settings") {
                let key = sql.split('\'').nth(1).unwrap_or_default().to_string();
                return Ok(usize::from(self.settings.insert(key)));
            }
            Ok(0)
        }

        fn column_exists(&mut self, table: &str, column: &str) -> Result<bool, ExecError> {
            Ok(self
                .columns
                .contains(&(table.to_string(), column.to_string())))
        }
    }

    #[test]
    fn test_fresh_database_creates_everything() {
        let mut exec = FakeExecutor::default();

        let report = run_migrations(&mut exec).unwrap();

        assert_eq!(report.tables_ensured, 16);
        assert_eq!(exec.tables.len(), 16);
        assert_eq!(report.settings_inserted, DEFAULT_SETTINGS.len());
        assert_eq!(report.columns_added.len(), COLUMN_PATCHES.len());
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut exec = FakeExecutor::default();
        run_migrations(&mut exec).unwrap();

        let report = run_migrations(&mut exec).unwrap();

        assert_eq!(report.tables_ensured, 16);
        assert!(report.columns_added.is_empty());
        assert_eq!(report.settings_inserted, 0);
        assert_eq!(exec.settings.len(), DEFAULT_SETTINGS.len());
    }

    #[test]
    fn test_existing_columns_are_not_altered() {
        let mut exec = FakeExecutor::default();
        for patch in COLUMN_PATCHES {
            exec.columns
                .insert((patch.table.to_string(), patch.column.to_string()));
        }

        let report = run_migrations(&mut exec).unwrap();

        assert!(report.columns_added.is_empty());
        assert!(!exec.statements.iter().any(|s| s.starts_with("ALTER TABLE")));
    }

    #[test]
    fn test_first_failure_aborts() {
        let mut exec = FakeExecutor {
            fail_on: Some("CREATE TABLE IF NOT EXISTS projects"),
            ..Default::default()
        };

        let err = run_migrations(&mut exec).unwrap_err();

        assert!(matches!(err, MigrationError::CreateTable { table: "projects", .. }));
        assert!(exec.tables.contains("services"));
        assert!(!exec.tables.contains("project_milestones"));
        assert!(exec.settings.is_empty());
    }

    #[test]
    fn test_tables_are_created_in_foreign_key_order() {
        let names: Vec<&str> = TABLES.iter().map(|t| t.name).collect();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();

        assert!(pos("users") < pos("user_permissions"));
        assert!(pos("permissions") < pos("user_permissions"));
        assert!(pos("projects") < pos("project_milestones"));
        assert!(pos("quotations") < pos("invoices"));
        assert!(pos("files") < pos("project_media"));
        assert!(pos("users") < pos("user_sessions"));
    }

    #[test]
    fn test_setting_values_are_escaped() {
        let sql = default_setting_sql("motto", "We build, you're home");
        assert!(sql.contains("'We build, you''re home'"));
        assert!(sql.starts_with("INSERT IGNORE INTO settings"));
    }
}
