//! services/timeline_api/src/bin/timeline_api.rs

use medical_timeline_core::{
    registry::{medical_timeline_descriptor, MEDICAL_TIMELINE_KEY},
    FieldWidgetRegistry, NoteStore, PatientStore, RecordLoader,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use timeline_api_lib::{
    adapters::{ChannelDispatcher, MemoryStore, PgStore},
    config::Config,
    error::ApiError,
    web::{
        build_router, navigation_process, rest::ApiDoc, session_reaper_process, state::AppState,
    },
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting timeline service...");

    // --- 2. Connect the Record Stores ---
    let (notes, patients): (Arc<dyn NoteStore>, Arc<dyn PatientStore>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let store = Arc::new(PgStore::new(db_pool));
                info!("Running database migrations...");
                store.run_migrations().await?;
                info!("Database migrations complete.");
                let notes: Arc<dyn NoteStore> = store.clone();
                let patients: Arc<dyn PatientStore> = store;
                (notes, patients)
            }
            None => {
                warn!("DATABASE_URL is not set, serving an empty in-memory store.");
                let store = Arc::new(MemoryStore::new());
                let notes: Arc<dyn NoteStore> = store.clone();
                let patients: Arc<dyn PatientStore> = store;
                (notes, patients)
            }
        };

    // --- 3. Start the Navigation Worker ---
    let shutdown = CancellationToken::new();
    let (dispatcher, navigation_rx) = ChannelDispatcher::channel();
    let navigation = tokio::spawn(navigation_process(navigation_rx, shutdown.clone()));

    // --- 4. Register Field Widgets ---
    let mut registry = FieldWidgetRegistry::new();
    registry.register(MEDICAL_TIMELINE_KEY, medical_timeline_descriptor())?;

    // --- 5. Build the Shared AppState ---
    let loader = RecordLoader::new(notes, patients, config.loader_options());
    let app_state = Arc::new(AppState::new(
        config.clone(),
        loader,
        Arc::new(dispatcher),
        registry,
    ));
    let reaper = tokio::spawn(session_reaper_process(
        app_state.clone(),
        config.widget_idle_timeout / 2,
        shutdown.clone(),
    ));

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let app = build_router(app_state)
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Server stopped, shutting down background workers.");
    shutdown.cancel();
    let evicted = reaper
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Session reaper evicted {} idle timelines.", evicted);
    let handled = navigation
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Navigation worker handled {} requests.", handled);

    Ok(())
}
