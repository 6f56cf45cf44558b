pub mod health;
pub mod ingest;

use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::services::queue::QueueContext;

pub fn create_router(queue: Arc<QueueContext>, config: &Config) -> Router {
    Router::new()
        .merge(health::router(config.ffmpeg_path.clone()))
        .merge(ingest::router(queue))
}
