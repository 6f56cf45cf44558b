use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use video_processor::config::Config;
use video_processor::db;
use video_processor::models::*;
use video_processor::routes;
use video_processor::services::queue::{self, HttpWebhookSender, QueueContext};
use video_processor::services::recovery;
use video_processor::services::storage::S3Storage;
use video_processor::services::transcoder::FfmpegTranscoder;
use video_processor::utils::check_ffmpeg_available;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Video Processor API",
        version = "1.0.0",
        description = "Coda persistente per la transcodifica video con notifica via webhook",
    ),
    paths(
        video_processor::routes::ingest::process_video,
        video_processor::routes::health::health_check,
    ),
    components(schemas(
        ProcessVideoRequest,
        InputLocation,
        OutputLocation,
        Profile,
        AcceptedResponse,
        ErrorResponse,
        HealthResponse,
        CallbackPayload,
        OutputResult,
    )),
    tags(
        (name = "Video", description = "Richieste di transcodifica"),
        (name = "Sistema", description = "Health check e info"),
    ),
    servers(
        (url = "http://localhost:3000", description = "Server locale"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Carica variabili da .env
    dotenvy::dotenv().ok();

    // Inizializza logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_processor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Carica configurazione
    let config = Config::from_env();

    tracing::info!("Connessione al database: {}", config.database_url);

    let db_pool = match db::init_db(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("Database SQLite inizializzato");
            pool
        }
        Err(e) => {
            tracing::error!("Errore inizializzazione database: {}", e);
            std::process::exit(1);
        }
    };

    // Recovery dei job orfani, prima di avviare qualsiasi worker
    if let Err(e) = recovery::reconcile(&db_pool).await {
        tracing::error!("Errore recovery job orfani: {}", e);
        std::process::exit(1);
    }

    match db::jobs::count_jobs_by_status(&db_pool).await {
        Ok(counts) => {
            for (status, count) in counts {
                tracing::info!("  {:<18} {}", status, count);
            }
        }
        Err(e) => tracing::warn!("Impossibile contare i job: {}", e),
    }

    // Verifica FFmpeg
    if check_ffmpeg_available(&config.ffmpeg_path) {
        tracing::info!("FFmpeg disponibile ({})", config.ffmpeg_path);
    } else {
        tracing::warn!(
            "FFmpeg non trovato ({}) - i job di encoding falliranno",
            config.ffmpeg_path
        );
    }

    // Crea directory di staging
    for dir in [
        &config.local_raw_video_path,
        &config.local_processed_video_path,
    ] {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::error!("Impossibile creare {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    let storage = Arc::new(S3Storage::new(&config.s3, config.storage_timeout));
    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        config.transcode_timeout,
    ));
    let webhooks = match HttpWebhookSender::new(config.webhook_timeout) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let queue_ctx = Arc::new(QueueContext::new(
        db_pool,
        config.clone(),
        storage,
        transcoder,
        webhooks,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = queue::start_worker_pools(queue_ctx.clone(), shutdown_rx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Costruisci router completo con Swagger
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::create_router(queue_ctx, &config))
        .layer(RequestBodyLimitLayer::new(config.max_request_size_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Indirizzo non valido {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("========================================");
    tracing::info!("  Video Processor v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================================");
    tracing::info!("Server: http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    tracing::info!("----------------------------------------");
    tracing::info!("Endpoints:");
    tracing::info!("  POST /process-video           - Accoda transcodifica");
    tracing::info!("  GET  /api/v1/health           - Health check");
    tracing::info!("----------------------------------------");
    tracing::info!(
        "Worker: {} encoding, {} callback (poll ogni {:?})",
        config.encoder_worker_count,
        config.callback_worker_count,
        config.poll_interval
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Impossibile aprire {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Errore attesa segnale: {}", e);
        }
        tracing::info!("Shutdown richiesto, attendo i worker...");
        shutdown_tx.send(true).ok();
    });

    if let Err(e) = server.await {
        tracing::error!("Errore server: {}", e);
    }

    // I job in corso vengono completati; quelli interrotti li recupera il prossimo avvio
    for handle in workers {
        if let Err(e) = handle.await {
            tracing::error!("Worker terminato in modo anomalo: {}", e);
        }
    }

    tracing::info!("Arrivederci");
}
