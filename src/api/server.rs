use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use super::{
    services::{create_profile, export_csv, health, list_profiles, upload_images},
    state::AppState,
    ws::ws_handler,
};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::observability::Metrics;
use crate::pipeline::{
    ClientHub, ClientRateLimiter, ContentCache, ImagePreprocessor, JobBroker, OpenAiGenerator,
    ProcessingPipeline, spawn_workers,
};
use crate::profiles::ProfileRegistry;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Assemble all shared components and start the worker pool
pub fn build_state(config: Config) -> Result<AppState, AnyError> {
    let clock = Arc::new(SystemClock);

    let profiles = Arc::new(
        ProfileRegistry::load(&config.profiles.path)
            .map_err(|e| format!("Failed to load profile registry: {e}"))?,
    );

    let cache = Arc::new(ContentCache::new(
        Duration::from_secs(config.cache.ttl_secs),
        clock.clone(),
    ));

    let limiter = Arc::new(ClientRateLimiter::new(
        config.limits.rate_limit,
        Duration::from_secs(config.limits.rate_window_secs),
        clock,
    ));

    let generator = Arc::new(OpenAiGenerator::new(&config.model));
    let preprocessor = ImagePreprocessor::new(config.image.max_dimension, config.image.jpeg_quality);
    let metrics = Arc::new(Metrics::new());

    let pipeline = Arc::new(ProcessingPipeline::new(
        profiles.clone(),
        cache.clone(),
        generator,
        preprocessor,
        metrics.clone(),
    ));

    let (broker, worker_receivers) =
        JobBroker::new(config.limits.workers, config.limits.channel_size);
    spawn_workers(pipeline, worker_receivers);

    Ok(AppState::new(
        Arc::new(config),
        profiles,
        cache,
        limiter,
        Arc::new(ClientHub::new()),
        Arc::new(broker),
        metrics,
    ))
}

pub fn build_router(state: AppState) -> Router {
    // A batch body can hold several files, so the body cap is a multiple of
    // the per-file limit
    let body_limit = state.config.server.max_upload_bytes.as_usize() * 10;
    let upload_dir = state.config.server.upload_dir.clone();

    Router::new()
        .route("/upload", post(upload_images))
        .route("/export", post(export_csv))
        .route("/profiles", get(list_profiles).post(create_profile))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .nest_service("/static/images", ServeDir::new(upload_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr;

    info!(dir = %config.server.upload_dir.display(), "Preparing upload directory");
    tokio::fs::create_dir_all(&config.server.upload_dir).await?;
    if let Some(parent) = config.profiles.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let state = build_state(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Tagmill API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
