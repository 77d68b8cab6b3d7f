//! Docwell API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod auth;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use docwell_application::{
    DocumentService, IdentityService, SecurityAdminRepository, SecurityAdminService, UserService,
};
use docwell_core::AppError;
use docwell_domain::TransitionTable;
use docwell_infrastructure::{
    Argon2PasswordHasher, InMemoryIdentityCache, PostgresAuditLogRepository,
    PostgresAuditRepository, PostgresDocumentHistoryRepository, PostgresDocumentRepository,
    PostgresIdentityRepository, PostgresNotificationRepository, PostgresSecurityAdminRepository,
    PostgresUserRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let session_store = PostgresStore::new(pool.clone())
        .with_table_name("tower_sessions")
        .map_err(|error| {
            AppError::Validation(format!("invalid session table name configuration: {error}"))
        })?;
    session_store.migrate().await.map_err(|error| {
        AppError::Internal(format!("failed to initialize session store: {error}"))
    })?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(30)));

    let identity_repository = Arc::new(PostgresIdentityRepository::new(pool.clone()));
    let identity_cache = Arc::new(InMemoryIdentityCache::new());
    let identity_service = IdentityService::new(identity_repository)
        .with_cache(identity_cache, config.identity_cache_ttl_seconds);

    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let audit_log_repository = Arc::new(PostgresAuditLogRepository::new(pool.clone()));

    let document_service = DocumentService::new(
        identity_service.clone(),
        Arc::new(PostgresDocumentRepository::new(pool.clone())),
        Arc::new(PostgresDocumentHistoryRepository::new(pool.clone())),
        Arc::new(PostgresNotificationRepository::new(pool.clone())),
        audit_repository.clone(),
        Arc::new(TransitionTable::standard()),
    );

    let security_admin_repository: Arc<dyn SecurityAdminRepository> =
        Arc::new(PostgresSecurityAdminRepository::new(pool.clone()));
    let security_admin_service = SecurityAdminService::new(
        identity_service.clone(),
        security_admin_repository.clone(),
        audit_log_repository,
        audit_repository,
    );

    let user_service = UserService::new(
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(Argon2PasswordHasher::new()),
    );

    let app_state = AppState {
        document_service,
        security_admin_service,
        identity_service,
        user_service,
        security_admin_repository,
        frontend_url: config.frontend_url.clone(),
        bootstrap_token: config.bootstrap_token.clone(),
    };

    if config.dev_seed {
        dev_seed::seed_demo_data(&app_state, &pool).await?;
    }

    let protected_routes = Router::new()
        .route(
            "/api/documents",
            get(handlers::documents::list_documents_handler)
                .post(handlers::documents::create_document_handler),
        )
        .route(
            "/api/documents/{document_id}",
            get(handlers::documents::get_document_handler),
        )
        .route(
            "/api/documents/{document_id}/transitions",
            get(handlers::documents::allowed_transitions_handler),
        )
        .route(
            "/api/documents/{document_id}/status",
            post(handlers::documents::change_status_handler),
        )
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/role-assignments",
            get(handlers::security::list_role_assignments_handler)
                .post(handlers::security::assign_role_handler),
        )
        .route(
            "/api/security/role-unassignments",
            post(handlers::security::unassign_role_handler),
        )
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route("/auth/me", get(auth::me_handler))
        .route_layer(from_fn(middleware::require_auth));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/bootstrap", post(auth::bootstrap_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(session_layer)
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "docwell-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
