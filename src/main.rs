// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;

use crate::application::boundary_cache::BoundaryCache;
use crate::application::layer_service::LayerService;
use crate::application::map_service::MapService;
use crate::application::streaming_service::StreamingMapService;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::hxl_proxy_repository::HxlProxyRepository;
use crate::infrastructure::itos_repository::ItosRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    clear_boundary_cache, health_check, render_map, render_map_from_query, stream_map,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_app_config().context("Failed to load configuration")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sources.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    // Create repositories (infrastructure layer)
    let datasets = Arc::new(HxlProxyRepository::new(
        client.clone(),
        config.sources.dataset_url.clone(),
    ));
    let boundaries = Arc::new(ItosRepository::new(
        client,
        config.sources.boundary_metadata_url.clone(),
        config.sources.boundary_geometry_url.clone(),
    ));

    // Create services (application layer); the boundary cache lives as long as the process
    let boundary_cache = BoundaryCache::new(boundaries);
    let layer_service = LayerService::new(datasets, boundary_cache.clone());
    let basemaps = config.basemaps.iter().map(|b| b.to_tile_layer()).collect();
    let map_service = MapService::new(layer_service.clone(), boundary_cache.clone(), basemaps);
    let streaming_service = StreamingMapService::new(layer_service);

    // Create application state
    let state = Arc::new(AppState {
        map_service,
        streaming_service,
        boundary_cache,
    });

    // Build router (presentation layer)
    // Compression is handled in the response builders, not by a layer
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/maps", get(render_map_from_query).post(render_map))
        .route("/maps/stream", post(stream_map))
        .route("/boundaries/cache", delete(clear_boundary_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind_address))?;
    tracing::info!("Starting hxlmaps service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
