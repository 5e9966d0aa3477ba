//! Baseline reference data.
//!
//! Each row is looked up before it is inserted, so running the loader again
//! against a seeded database is a no-op.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::auth::password::PasswordService;
use crate::config::SeedConfig;
use crate::models::{
    new_id, now, Permission, Project, ProjectStatus, Role, Service, User, UserPermission,
    UserStatus,
};
use crate::store::{RepoError, Store};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to hash admin password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeedReport {
    pub admin_created: bool,
    pub permissions_created: usize,
    pub grants_created: usize,
    pub services_created: usize,
    pub projects_created: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Display for SeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "admin created: {}, permissions: {}, grants: {}, services: {}, projects: {}",
            self.admin_created,
            self.permissions_created,
            self.grants_created,
            self.services_created,
            self.projects_created
        )
    }
}

/// (name, category, description)
pub const PERMISSIONS: &[(&str, &str, &str)] = &[
    ("users.view", "users", "View user accounts"),
    ("users.manage", "users", "Create, update and suspend user accounts"),
    ("projects.view", "projects", "View projects"),
    ("projects.manage", "projects", "Create and update projects"),
    ("quotations.manage", "finance", "Create and send quotations"),
    ("invoices.manage", "finance", "Create invoices and record payments"),
    ("blog.manage", "content", "Write and publish blog posts"),
    ("submissions.manage", "intake", "Respond to quote requests and applications"),
    ("settings.manage", "system", "Change site settings"),
    ("reports.view", "system", "View reports and audit logs"),
];

pub struct ServiceSeed {
    pub title: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub starting_price: i64,
}

pub const SERVICES: &[ServiceSeed] = &[
    ServiceSeed {
        title: "Residential Construction",
        slug: "residential-construction",
        description: "Custom homes, maisonettes and apartment blocks built from foundation to finish.",
        starting_price: 2_500_000,
    },
    ServiceSeed {
        title: "Commercial Construction",
        slug: "commercial-construction",
        description: "Offices, retail space and warehouses delivered to schedule.",
        starting_price: 10_000_000,
    },
    ServiceSeed {
        title: "Renovation & Remodeling",
        slug: "renovation-remodeling",
        description: "Extensions, refurbishments and structural alterations.",
        starting_price: 350_000,
    },
    ServiceSeed {
        title: "Civil Engineering",
        slug: "civil-engineering",
        description: "Roads, drainage, retaining walls and site works.",
        starting_price: 5_000_000,
    },
    ServiceSeed {
        title: "Project Management",
        slug: "project-management",
        description: "Planning, procurement and site supervision for client-led builds.",
        starting_price: 150_000,
    },
    ServiceSeed {
        title: "Interior Design & Finishing",
        slug: "interior-design",
        description: "Joinery, tiling, painting and fit-out.",
        starting_price: 200_000,
    },
];

pub struct ProjectSeed {
    pub title: &'static str,
    pub slug: &'static str,
    pub category: &'static str,
    pub location: &'static str,
    pub status: ProjectStatus,
    pub budget: i64,
    pub start: (i32, u32, u32),
    pub featured: bool,
}

pub const PROJECTS: &[ProjectSeed] = &[
    ProjectSeed {
        title: "Karen Family Residence",
        slug: "karen-family-residence",
        category: "residential",
        location: "Karen, Nairobi",
        status: ProjectStatus::Completed,
        budget: 18_500_000,
        start: (2023, 2, 6),
        featured: true,
    },
    ProjectSeed {
        title: "Westlands Office Block",
        slug: "westlands-office-block",
        category: "commercial",
        location: "Westlands, Nairobi",
        status: ProjectStatus::InProgress,
        budget: 96_000_000,
        start: (2024, 5, 13),
        featured: true,
    },
    ProjectSeed {
        title: "Thika Road Warehouse",
        slug: "thika-road-warehouse",
        category: "industrial",
        location: "Ruiru, Kiambu",
        status: ProjectStatus::Planning,
        budget: 42_000_000,
        start: (2025, 1, 20),
        featured: false,
    },
];

pub fn run_seed<S: Store + ?Sized>(
    store: &S,
    config: &SeedConfig,
    hash_cost: u32,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    let ts = now();

    let email = config.admin_email.trim().to_lowercase();
    let admin = match store.find_user_by_email(&email)? {
        Some(existing) => {
            debug!(user_id = %existing.id, "Admin account already present");
            existing
        }
        None => {
            let hash = PasswordService::hash_password_with_cost(&config.admin_password, hash_cost)?;
            let mut admin = User::new(
                email,
                hash,
                config.admin_first_name.clone(),
                config.admin_last_name.clone(),
            );
            admin.role = Role::Admin;
            admin.status = UserStatus::Active;
            admin.email_verified = true;
            store.insert_user(&admin)?;
            info!(user_id = %admin.id, email = %admin.email, "Admin account created");
            report.admin_created = true;
            admin
        }
    };

    for &(name, category, description) in PERMISSIONS {
        let permission = match store.find_permission_by_name(name)? {
            Some(existing) => existing,
            None => {
                let permission = Permission {
                    id: new_id(),
                    name: name.to_string(),
                    category: category.to_string(),
                    description: Some(description.to_string()),
                    created_at: ts,
                };
                store.insert_permission(&permission)?;
                report.permissions_created += 1;
                permission
            }
        };

        if !store.has_user_permission(&admin.id, &permission.id)? {
            store.grant_permission(&UserPermission {
                id: new_id(),
                user_id: admin.id.clone(),
                permission_id: permission.id.clone(),
                granted_by: None,
                granted_at: ts,
            })?;
            report.grants_created += 1;
        }
    }

    for (position, seed) in SERVICES.iter().enumerate() {
        if store.find_service_by_slug(seed.slug)?.is_some() {
            continue;
        }
        store.insert_service(&Service {
            id: new_id(),
            title: seed.title.to_string(),
            slug: seed.slug.to_string(),
            description: seed.description.to_string(),
            starting_price: Some(Decimal::from(seed.starting_price)),
            currency: "KES".to_string(),
            is_active: true,
            sort_order: position as i32 + 1,
            created_at: ts,
            updated_at: ts,
        })?;
        report.services_created += 1;
    }

    for seed in PROJECTS {
        if store.find_project_by_slug(seed.slug)?.is_some() {
            continue;
        }
        let (y, m, d) = seed.start;
        store.insert_project(&Project {
            id: new_id(),
            title: seed.title.to_string(),
            slug: seed.slug.to_string(),
            description: None,
            category: Some(seed.category.to_string()),
            location: Some(seed.location.to_string()),
            status: seed.status,
            budget: Some(Decimal::from(seed.budget)),
            start_date: NaiveDate::from_ymd_opt(y, m, d),
            end_date: None,
            is_featured: seed.featured,
            created_by: Some(admin.id.clone()),
            created_at: ts,
            updated_at: ts,
        })?;
        report.projects_created += 1;
    }

    info!(
        admin_created = report.admin_created,
        permissions = report.permissions_created,
        grants = report.grants_created,
        services = report.services_created,
        projects = report.projects_created,
        "Seed complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogRepository, MemoryStore, ProjectRepository, UserRepository};

    fn seed_config() -> SeedConfig {
        SeedConfig {
            run_on_startup: true,
            admin_email: "Admin@Akibeks.co.ke".to_string(),
            admin_password: "Admin123!".to_string(),
            admin_first_name: "System".to_string(),
            admin_last_name: "Administrator".to_string(),
        }
    }

    #[test]
    fn test_first_run_inserts_everything() {
        let store = MemoryStore::new();
        let report = run_seed(&store, &seed_config(), 4).unwrap();

        assert!(report.admin_created);
        assert_eq!(report.permissions_created, PERMISSIONS.len());
        assert_eq!(report.grants_created, PERMISSIONS.len());
        assert_eq!(report.services_created, SERVICES.len());
        assert_eq!(report.projects_created, PROJECTS.len());

        let admin = store
            .find_user_by_email("admin@akibeks.co.ke")
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.status, UserStatus::Active);
        assert!(admin.email_verified);
        assert!(PasswordService::verify_password("Admin123!", &admin.password_hash).unwrap());
    }

    #[test]
    fn test_second_run_is_noop() {
        let store = MemoryStore::new();
        run_seed(&store, &seed_config(), 4).unwrap();
        let again = run_seed(&store, &seed_config(), 4).unwrap();

        assert!(again.is_noop());
        assert_eq!(store.list_active_services().unwrap().len(), SERVICES.len());
        assert_eq!(store.list_projects(0, 100).unwrap().total, PROJECTS.len() as i64);
    }

    #[test]
    fn test_existing_admin_is_left_alone() {
        let store = MemoryStore::new();
        let existing = User::new(
            "admin@akibeks.co.ke".into(),
            "existing-hash".into(),
            "Someone".into(),
            "Else".into(),
        );
        store.insert_user(&existing).unwrap();

        // Cost 2 is rejected by bcrypt, so any hashing attempt would fail the run.
        let report = run_seed(&store, &seed_config(), 2).unwrap();
        assert!(!report.admin_created);

        let admin = store
            .find_user_by_email("admin@akibeks.co.ke")
            .unwrap()
            .unwrap();
        assert_eq!(admin.password_hash, "existing-hash");
        assert_eq!(report.grants_created, PERMISSIONS.len());
    }

    #[test]
    fn test_catalog_slugs_are_unique() {
        let mut slugs: Vec<_> = SERVICES.iter().map(|s| s.slug).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), SERVICES.len());
    }
}
