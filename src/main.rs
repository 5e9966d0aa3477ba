use std::net::SocketAddr;
use std::sync::Arc;

use akibeks::{
    auth::jwt::JwtConfig,
    create_db_pool, create_router, init_tracing, migrate, seed, shutdown_telemetry,
    store::{MysqlStore, Store},
    AppState, Config,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config);

    info!(
        service = "akibeks",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    let jwt_config = JwtConfig::from_env(&config.jwt).unwrap_or_else(|e| {
        error!(error = %e, "Failed to load signing key");
        std::process::exit(1);
    });

    info!(
        database = %config.database.redacted(),
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let db_pool = create_db_pool(&config).unwrap_or_else(|e| {
        error!(error = %e, "Failed to create database pool");
        std::process::exit(1);
    });

    info!("Database connection pool created");

    if config.run_migrations {
        let result = db_pool
            .get()
            .map_err(|e| e.to_string())
            .and_then(|mut conn| migrate::run_migrations(&mut *conn).map_err(|e| e.to_string()));
        match result {
            Ok(report) => info!(
                tables = report.tables_ensured,
                columns_added = report.columns_added.len(),
                settings_inserted = report.settings_inserted,
                "Schema up to date"
            ),
            Err(e) => {
                error!(error = %e, "Migration failed");
                std::process::exit(1);
            }
        }
    }

    let store: Arc<dyn Store> = Arc::new(MysqlStore::new(db_pool));

    if config.seed.run_on_startup {
        let seed_store = store.clone();
        let seed_config = config.seed.clone();
        let cost = config.security.password_hash_cost;
        let result = tokio::task::spawn_blocking(move || {
            seed::run_seed(seed_store.as_ref(), &seed_config, cost)
        })
        .await;
        match result {
            Ok(Ok(report)) if report.is_noop() => info!("Seed data already present"),
            Ok(Ok(report)) => info!(%report, "Seed data loaded"),
            Ok(Err(e)) => warn!(error = %e, "Seeding failed"),
            Err(e) => warn!(error = %e, "Seed task panicked"),
        }
    }

    let state = AppState::new(store, jwt_config, &config);
    let app = create_router(state, &config);

    let http_addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, address = %http_addr, "Failed to bind HTTP server");
            std::process::exit(1);
        });

    info!(
        http_address = %http_addr,
        docs_url = %format!("http://{}/swagger-ui", http_addr),
        "HTTP server ready"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    if let Err(e) = served {
        error!(error = %e, "HTTP server error");
    }

    shutdown_telemetry();

    info!("Server shutdown complete");
}
