// HTTP request handlers
use crate::application::map_service::{FailedLayer, MapError};
use crate::domain::layer::MapConfig;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::scene_recorder::SceneRecorder;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct MapQuery {
    pub config: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_layers: Vec<FailedLayer>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Drop every cached boundary, including cached failures
pub async fn clear_boundary_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.boundary_cache.clear().await;
    tracing::info!("Boundary cache cleared");
    StatusCode::NO_CONTENT
}

/// Render the map described by the request body
pub async fn render_map(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(config): Json<MapConfig>,
) -> Response {
    render(&state, config, accepts_brotli(&headers)).await
}

/// Render the map described by the `config` query parameter
pub async fn render_map_from_query(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Response {
    let compress = accepts_brotli(&headers);
    match serde_json::from_str::<MapConfig>(&query.config) {
        Ok(config) => render(&state, config, compress).await,
        Err(e) => {
            tracing::warn!("Rejecting map configuration: {}", e);
            let body = ErrorBody {
                error: format!("invalid map configuration: {}", e),
                failed_layers: Vec::new(),
            };
            respond(StatusCode::BAD_REQUEST, &body, compress).await
        }
    }
}

/// Stream the map progressively, one frame per settled layer
pub async fn stream_map(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(config): Json<MapConfig>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let rx = state.streaming_service.stream_map(config);
    stream_from_receiver(rx, compress)
}

async fn render(state: &AppState, config: MapConfig, compress: bool) -> Response {
    let mut recorder = SceneRecorder::new();
    match state.map_service.render(&config, &mut recorder).await {
        Ok(summary) => {
            let scene = recorder.into_scene(summary);
            respond(StatusCode::OK, &scene, compress).await
        }
        Err(e) => {
            let message = e.to_string();
            let MapError::NoDataLoaded { failed_layers } = e;
            let body = ErrorBody {
                error: message,
                failed_layers,
            };
            respond(StatusCode::UNPROCESSABLE_ENTITY, &body, compress).await
        }
    }
}

async fn respond<T: Serialize>(status: StatusCode, body: &T, compress: bool) -> Response {
    match json_response(status, body, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
