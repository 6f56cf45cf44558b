//! Ingress: una richiesta di transcodifica diventa un job per profilo

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

use crate::db::jobs as db_jobs;
use crate::error::{AppError, Result};
use crate::models::{AcceptedResponse, ErrorResponse, ProcessVideoRequest};
use crate::services::queue::QueueContext;
use crate::utils::validate_process_request;

pub fn router(queue: Arc<QueueContext>) -> Router {
    Router::new()
        .route("/process-video", post(process_video))
        .with_state(queue)
}

/// Accoda una richiesta di transcodifica (fire-and-forget)
///
/// L'esito viene notificato solo tramite il webhook al `callbackUrl`.
#[utoipa::path(
    post,
    path = "/process-video",
    request_body = ProcessVideoRequest,
    responses(
        (status = 200, description = "Richiesta accettata", body = AcceptedResponse),
        (status = 400, description = "JSON non valido o campi mancanti", body = ErrorResponse),
        (status = 500, description = "Errore database", body = ErrorResponse),
    ),
    tag = "Video"
)]
pub async fn process_video(
    State(queue): State<Arc<QueueContext>>,
    payload: std::result::Result<Json<ProcessVideoRequest>, JsonRejection>,
) -> Result<Json<AcceptedResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidJson(e.body_text()))?;

    validate_process_request(&request)?;

    for profile in &request.profiles {
        if profile.parsed_resolution() == 0 {
            tracing::warn!(
                "Risoluzione non numerica '{}' per video {}, usata 0",
                profile.resolution,
                request.video_id
            );
        }
    }

    let ids = db_jobs::create_jobs(&queue.db, &request.to_new_jobs()).await?;
    tracing::info!(
        "Video {}: creati {} job ({} -> s3://{}/{})",
        request.video_id,
        ids.len(),
        request.input.key,
        request.output.bucket,
        request.output.base_path
    );

    queue.wake_encoders();

    Ok(Json(AcceptedResponse::accepted()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::queue::testing::Harness;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process-video")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn job_count(harness: &Harness) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&harness.ctx.db)
            .await
            .unwrap();
        count
    }

    const VALID: &str = r#"{
        "videoId": "vid123",
        "input": {"bucket": "raw", "key": "uploads/vid123/source.mov"},
        "output": {"bucket": "cdn", "basePath": "videos/vid123"},
        "profiles": [{"resolution": "720", "crf": 23}, {"resolution": "1080", "crf": 20}],
        "callbackUrl": "https://api.example.com/hooks/video"
    }"#;

    #[tokio::test]
    async fn test_one_job_per_profile() {
        let harness = Harness::new().await;
        let response = router(harness.ctx.clone())
            .oneshot(post_json(VALID))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "accepted");
        assert!(json.get("jobId").is_none());

        let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT resolution, crf, callback_url, status FROM jobs ORDER BY resolution",
        )
        .fetch_all(&harness.ctx.db)
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].0, rows[0].1), (720, 23));
        assert_eq!((rows[1].0, rows[1].1), (1080, 20));
        for row in &rows {
            assert_eq!(row.2, "https://api.example.com/hooks/video");
            assert_eq!(row.3, "encoding_pending");
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let harness = Harness::new().await;
        let response = router(harness.ctx.clone())
            .oneshot(post_json("{\"videoId\": "))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert_eq!(job_count(&harness).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_callback_url_creates_nothing() {
        let harness = Harness::new().await;
        let body = VALID.replace("https://api.example.com/hooks/video", "not a url");
        let response = router(harness.ctx.clone())
            .oneshot(post_json(&body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(job_count(&harness).await, 0);
    }

    #[tokio::test]
    async fn test_missing_profiles_is_rejected() {
        let harness = Harness::new().await;
        let body = VALID.replace(
            r#"[{"resolution": "720", "crf": 23}, {"resolution": "1080", "crf": 20}]"#,
            "[]",
        );
        let response = router(harness.ctx.clone())
            .oneshot(post_json(&body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(job_count(&harness).await, 0);
    }
}
