//! Round-trips every table against a live database and exits non-zero if
//! any assertion fails. Point `DATABASE_URL` at a scratch schema.

use std::process::ExitCode;

use akibeks::{
    create_db_pool, harness, init_tracing, migrate::run_migrations, Config,
};
use tracing::error;

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    let pool = match create_db_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "Failed to check out a connection");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run_migrations(&mut *conn) {
        error!(error = %e, "Migration failed");
        return ExitCode::FAILURE;
    }

    let tally = harness::run_all(&harness::mysql_cases(), &mut *conn);

    println!("{tally}");
    for failure in &tally.failures {
        println!("  FAIL {failure}");
    }

    if tally.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
