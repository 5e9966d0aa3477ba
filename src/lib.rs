//! Akibeks - back office for a construction company: accounts, intake
//! wizards, admin review and the schema and seed tooling behind them.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod harness;
pub mod helpers;
pub mod intake;
pub mod middleware;
pub mod migrate;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod response;
pub mod schema;
pub mod seed;
pub mod store;
pub mod telemetry;

use axum::{
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::MysqlConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::cookies::CookieSettings;
use auth::jwt::JwtConfig;
use auth::lockout::LockoutPolicy;
use auth::password::PasswordPolicy;
use auth::AuthService;
use error::ApiError;
use middleware::{
    auth::{auth_middleware, require_admin},
    metrics::metrics_middleware,
    rate_limit::{
        auth_rate_limit_middleware, rate_limit_middleware, RateLimitConfig, RateLimitState,
    },
    request_id::request_id_middleware,
};
use store::Store;
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub jwt_config: Arc<JwtConfig>,
    pub cookies: CookieSettings,
    pub rate_limit: RateLimitState,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt_config: JwtConfig, config: &Config) -> Self {
        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::with_config(
                RateLimitConfig::new(config.security.rate_limit_requests_per_minute, 60),
                RateLimitConfig::strict(),
            )
        } else {
            RateLimitState::disabled()
        };

        let password_policy = if config.security.require_password_complexity {
            PasswordPolicy::complex(config.security.min_password_length)
        } else {
            PasswordPolicy {
                min_length: config.security.min_password_length,
                ..Default::default()
            }
        };

        let lockout = LockoutPolicy::new(
            config.security.max_failed_login_attempts,
            config.security.lockout_duration_mins,
        );

        let jwt_config = Arc::new(jwt_config);
        let auth = AuthService::new(
            store.clone(),
            jwt_config.clone(),
            password_policy,
            lockout,
            config.security.password_hash_cost,
            config.security.expose_tokens,
        );

        let metrics = MetricsState::new(config.telemetry.metrics_enabled);

        Self {
            store,
            auth,
            jwt_config,
            cookies: CookieSettings {
                secure: config.security.secure_cookies,
            },
            rate_limit,
            metrics,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let rate_limit_state = state.rate_limit.clone();

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .route("/services", get(handlers::public::list_services))
        .route("/projects", get(handlers::public::list_projects))
        .route("/blog", get(handlers::public::list_blog_posts))
        .route("/settings", get(handlers::public::get_settings))
        .route("/quote-requests", post(handlers::intake::submit_quote))
        .route("/applications", post(handlers::intake::submit_application))
        .route("/contact", post(handlers::intake::submit_contact))
        .with_state(state.clone());

    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/verify-email", post(handlers::auth::verify_email))
        .route(
            "/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .layer(axum_middleware::from_fn(auth_rate_limit_middleware))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/verify", get(handlers::admin::verify))
        .route("/admin/submissions", get(handlers::admin::list_submissions))
        .route(
            "/admin/submissions/{id}/status",
            put(handlers::admin::update_submission_status),
        )
        .route("/admin/users", get(handlers::admin::list_users))
        .route(
            "/admin/users/{id}/status",
            put(handlers::admin::update_user_status),
        )
        .route(
            "/admin/projects/{id}/status",
            put(handlers::admin::update_project_status),
        )
        .route("/admin/quotations", post(handlers::admin::create_quotation))
        .route(
            "/admin/blog/{id}/publish",
            post(handlers::admin::publish_blog_post),
        )
        .route("/admin/audit-logs", get(handlers::admin::list_audit_logs))
        .layer(axum_middleware::from_fn(require_admin))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(auth_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(rate_limit_state))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    ApiError::not_found("Not found", "NOT_FOUND")
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    if config.cors.allow_credentials && is_wildcard_origin {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else if config.cors.allow_credentials {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else {
        let cors = if is_wildcard_origin {
            CorsLayer::new().allow_origin(Any)
        } else {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    }
}

pub fn create_db_pool(config: &config::Config) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<MysqlConnection>::new(config.database.url());
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
}

/// Small pool for tools and tests pointed at an explicit URL.
pub fn create_db_pool_with_url(database_url: &str) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<MysqlConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(4)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_app_state_wires_memory_store() {
        let config = Config::default_for_testing();
        let jwt = JwtConfig::from_key_pair(jwt_simple::prelude::Ed25519KeyPair::generate());
        let state = AppState::new(Arc::new(store::MemoryStore::new()), jwt, &config);

        assert_eq!(state.store.backend(), "memory");
        assert!(!state.cookies.secure);
        assert!(!state.metrics.is_enabled());
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}
