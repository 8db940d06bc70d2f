//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{LogMailer, PgAdapter, QrRenderer, RqrrDecoder},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, AppState, Backends},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use checkin_core::memory::InMemoryStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Connects the storage ports to Postgres, or to the in-memory store when no database is configured.
async fn storage_backends(config: &Config) -> Result<Backends, ApiError> {
    let renderer = Arc::new(QrRenderer::new(config.qr_min_size));
    let decoder = Arc::new(RqrrDecoder::new());
    let mailer = Arc::new(LogMailer::new());

    match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(PgAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");

            Ok(Backends {
                registrants: db_adapter.clone(),
                attendance: db_adapter.clone(),
                staff: db_adapter,
                renderer,
                decoder,
                mailer,
            })
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory store. Data is lost on restart.");
            let store = Arc::new(InMemoryStore::new());
            Ok(Backends {
                registrants: store.clone(),
                attendance: store.clone(),
                staff: store,
                renderer,
                decoder,
                mailer,
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    if config.staff_signup_code.is_none() {
        warn!("STAFF_SIGNUP_CODE is not set; staff signup is disabled.");
    }

    // --- 2. Connect Storage & Build the Shared AppState ---
    let backends = storage_backends(&config).await?;
    let bind_address = config.bind_address;
    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let app_state = Arc::new(AppState::new(config, backends));

    // --- 3. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 4. Start the Server ---
    info!("Starting server on {}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
