use std::path::PathBuf;
use std::time::Duration;

/// Estensione dei file prodotti dal transcoder
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Politica di retry per la fase di encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingRetryPolicy {
    /// I job falliti restano sempre riprendibili
    #[default]
    Unbounded,
    /// Raggiunto `max_encoding_failures` il job non viene più preso in carico
    Bounded,
}

impl EncodingRetryPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unbounded" => Some(Self::Unbounded),
            "bounded" => Some(Self::Bounded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3: S3Config,
    pub local_raw_video_path: PathBuf,
    pub local_processed_video_path: PathBuf,
    pub encoder_worker_count: usize,
    pub callback_worker_count: usize,
    pub max_encoding_failures: i64,
    pub max_callback_failures: i64,
    pub encoding_retry_policy: EncodingRetryPolicy,
    pub poll_interval: Duration,
    pub transcode_timeout: Duration,
    pub webhook_timeout: Duration,
    pub storage_timeout: Duration,
    pub ffmpeg_path: String,
    pub max_request_size_kb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite:video-processor.db?mode=rwc".to_string(),
            s3: S3Config {
                region: "us-east-1".to_string(),
                ..S3Config::default()
            },
            local_raw_video_path: PathBuf::from("app/data/tmp/raw-videos"),
            local_processed_video_path: PathBuf::from("app/data/tmp/processed-videos"),
            encoder_worker_count: 2,
            callback_worker_count: 1,
            max_encoding_failures: 3,
            max_callback_failures: 3,
            encoding_retry_policy: EncodingRetryPolicy::Unbounded,
            poll_interval: Duration::from_secs(2),
            transcode_timeout: Duration::from_secs(3600),
            webhook_timeout: Duration::from_secs(10),
            storage_timeout: Duration::from_secs(300),
            ffmpeg_path: "ffmpeg".to_string(),
            max_request_size_kb: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Costruisce la configurazione da una sorgente chiave/valore qualsiasi
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }

        if let Some(p) = lookup("PORT").and_then(|v| v.parse().ok()) {
            config.port = p;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }

        // DB_PATH ha la precedenza: percorso del file SQLite
        if let Some(path) = lookup("DB_PATH").filter(|p| !p.is_empty()) {
            config.database_url = format!("sqlite:{}?mode=rwc", path);
        }

        if let Some(endpoint) = lookup("S3_ENDPOINT").filter(|e| !e.is_empty()) {
            config.s3.endpoint = Some(endpoint);
        }

        if let Some(region) = lookup("S3_REGION").filter(|r| !r.is_empty()) {
            config.s3.region = region;
        }

        if let Some(key) = lookup("S3_ACCESS_KEY") {
            config.s3.access_key_id = key;
        }

        if let Some(secret) = lookup("S3_SECRET_KEY") {
            config.s3.secret_access_key = secret;
        }

        if let Some(dir) = lookup("LOCAL_RAW_VIDEO_PATH") {
            config.local_raw_video_path = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("LOCAL_PROCESSED_VIDEO_PATH") {
            config.local_processed_video_path = PathBuf::from(dir);
        }

        if let Some(n) = positive(&lookup, "WORKER_COUNT") {
            config.encoder_worker_count = n as usize;
        }

        if let Some(n) = positive(&lookup, "CALLBACK_WORKER_COUNT") {
            config.callback_worker_count = n as usize;
        }

        if let Some(n) = positive(&lookup, "MAX_ENCODING_FAILURES") {
            config.max_encoding_failures = n;
        }

        if let Some(n) = positive(&lookup, "MAX_CALLBACK_FAILURES") {
            config.max_callback_failures = n;
        }

        if let Some(policy) = lookup("ENCODING_RETRY_POLICY") {
            match EncodingRetryPolicy::parse(&policy) {
                Some(p) => config.encoding_retry_policy = p,
                None => tracing::warn!(
                    "ENCODING_RETRY_POLICY non valida: {} (uso {:?})",
                    policy,
                    config.encoding_retry_policy
                ),
            }
        }

        if let Some(secs) = positive(&lookup, "POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs as u64);
        }

        if let Some(secs) = positive(&lookup, "TRANSCODE_TIMEOUT_SECS") {
            config.transcode_timeout = Duration::from_secs(secs as u64);
        }

        if let Some(secs) = positive(&lookup, "WEBHOOK_TIMEOUT_SECS") {
            config.webhook_timeout = Duration::from_secs(secs as u64);
        }

        if let Some(secs) = positive(&lookup, "STORAGE_TIMEOUT_SECS") {
            config.storage_timeout = Duration::from_secs(secs as u64);
        }

        if let Some(path) = lookup("FFMPEG_PATH").filter(|p| !p.is_empty()) {
            config.ffmpeg_path = path;
        }

        if let Some(kb) = positive(&lookup, "MAX_REQUEST_SIZE_KB") {
            config.max_request_size_kb = kb as usize;
        }

        config
    }

    /// Tetto di fallimenti da applicare al claim di encoding, se la politica è bounded
    pub fn encoding_failure_ceiling(&self) -> Option<i64> {
        match self.encoding_retry_policy {
            EncodingRetryPolicy::Unbounded => None,
            EncodingRetryPolicy::Bounded => Some(self.max_encoding_failures),
        }
    }

    pub fn max_request_size_bytes(&self) -> usize {
        self.max_request_size_kb * 1024
    }
}

/// Intero positivo da variabile d'ambiente; valori non validi vengono ignorati
fn positive<F>(lookup: &F, key: &str) -> Option<i64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
}
