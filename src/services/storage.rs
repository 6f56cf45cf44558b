//! Object storage S3-compatibile (primitive di download e upload)

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::S3Config;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Oggetto non trovato: {key} nel bucket {bucket}")]
    NotFound { bucket: String, key: String },

    #[error("Errore di trasporto: {0}")]
    Transport(String),

    #[error("Argomenti non validi: {0}")]
    InvalidArgument(String),

    #[error("Errore di I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Scarica `bucket/key` nel file locale `local_path`
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()>;

    /// Carica il file locale `local_path` in `bucket/key`
    async fn upload(&self, bucket: &str, local_path: &Path, key: &str) -> StorageResult<()>;
}

/// Client S3 (AWS, MinIO, R2...)
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(config: &S3Config, operation_timeout: Duration) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "static",
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(operation_timeout)
            .build();

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .force_path_style(true); // Necessario per MinIO

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            "Client S3 configurato (endpoint: {}, region: {})",
            config.endpoint.as_deref().unwrap_or("default"),
            config.region
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        if bucket.is_empty() || key.is_empty() {
            return Err(StorageError::InvalidArgument(
                "bucket e key sono obbligatori".to_string(),
            ));
        }

        debug!("Download s3://{}/{} -> {}", bucket, key, local_path.display());

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Transport(service_error.to_string())
                }
            })?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut body = output.body;
        let mut written: u64 = 0;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Scaricati {} bytes da s3://{}/{}", written, bucket, key);
        Ok(())
    }

    async fn upload(&self, bucket: &str, local_path: &Path, key: &str) -> StorageResult<()> {
        if bucket.is_empty() || key.is_empty() {
            return Err(StorageError::InvalidArgument(
                "bucket e key sono obbligatori".to_string(),
            ));
        }

        debug!("Upload {} -> s3://{}/{}", local_path.display(), bucket, key);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.into_service_error().to_string()))?;

        info!("Caricato {} su s3://{}/{}", local_path.display(), bucket, key);
        Ok(())
    }
}
