//! # Server Configuration
//!
//! Router, shared state and OpenAPI document for the activity sync API.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::github::GraphQlClient;
use crate::handlers;
use crate::repositories::{ActivityRepository, WatermarkRepository};
use crate::sync::SyncEngine;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    /// Wires the GraphQL data source and SeaORM repositories into a sync engine.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Result<Self, FetchError> {
        let engine = build_engine(&config, db.clone())?;
        Ok(Self {
            config: Arc::new(config),
            db,
            engine: Arc::new(engine),
        })
    }
}

/// Production sync engine for `config`
pub fn build_engine(config: &AppConfig, db: DatabaseConnection) -> Result<SyncEngine, FetchError> {
    let source =
        GraphQlClient::with_timeout(&config.github_graphql_url, config.sync.fetch_timeout())?;
    Ok(SyncEngine::new(
        Arc::new(source),
        Arc::new(WatermarkRepository::new(db.clone())),
        Arc::new(ActivityRepository::new(db)),
        config.sync.clone(),
    ))
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/users/{username}/repos/{owner}/{name}/sync",
            post(handlers::sync::sync_activity).delete(handlers::sync::reset_watermark),
        )
        .route(
            "/users/{username}/repos/{owner}/{name}/watermark",
            get(handlers::sync::get_watermark),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::sync::sync_activity,
        crate::handlers::sync::get_watermark,
        crate::handlers::sync::reset_watermark,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::sync::WatermarkResponse,
            crate::sync::SyncOutcome,
            crate::sync::SyncMode,
            crate::sync::ActivityTotals,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "root", description = "Service metadata"),
        (name = "sync", description = "Per-user repository activity sync"),
    ),
    info(
        title = "Activity Sync API",
        description = "Incremental GitHub activity totals per user and repository",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
