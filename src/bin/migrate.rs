//! Creates or upgrades the schema, then loads seed data.
//!
//! Usage: `akibeks-migrate [--skip-seed]`

use std::process::ExitCode;

use akibeks::{
    create_db_pool, init_tracing, migrate::run_migrations, seed::run_seed, store::MysqlStore,
    Config,
};
use tracing::{error, info};

fn main() -> ExitCode {
    let skip_seed = std::env::args().skip(1).any(|a| a == "--skip-seed");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    info!(database = %config.database.redacted(), "Running migrations");

    let pool = match create_db_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    let report = match pool.get() {
        Ok(mut conn) => run_migrations(&mut *conn),
        Err(e) => {
            error!(error = %e, "Failed to check out a connection");
            return ExitCode::FAILURE;
        }
    };

    match report {
        Ok(report) => {
            println!("Tables ensured:    {}", report.tables_ensured);
            println!("Settings inserted: {}", report.settings_inserted);
            if report.columns_added.is_empty() {
                println!("Columns added:     none");
            } else {
                println!("Columns added:     {}", report.columns_added.join(", "));
            }
        }
        Err(e) => {
            error!(error = %e, "Migration failed");
            return ExitCode::FAILURE;
        }
    }

    if skip_seed {
        info!("Skipping seed data");
        return ExitCode::SUCCESS;
    }

    let store = MysqlStore::new(pool);
    match run_seed(&store, &config.seed, config.security.password_hash_cost) {
        Ok(report) if report.is_noop() => println!("Seed data already present"),
        Ok(report) => println!("Seeded: {report}"),
        Err(e) => {
            error!(error = %e, "Seeding failed");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
