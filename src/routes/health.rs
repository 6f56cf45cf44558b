use axum::{extract::State, routing::get, Json, Router};

use crate::models::HealthResponse;
use crate::utils::check_ffmpeg_available;

#[derive(Clone)]
pub struct HealthState {
    pub ffmpeg_path: String,
}

pub fn router(ffmpeg_path: String) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .with_state(HealthState { ffmpeg_path })
}

/// Health check dell'API
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "API funzionante", body = HealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let ffmpeg_path = state.ffmpeg_path.clone();
    // `-version` è un processo bloccante
    let ffmpeg_available = tokio::task::spawn_blocking(move || check_ffmpeg_available(&ffmpeg_path))
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ffmpeg_available,
    })
}
