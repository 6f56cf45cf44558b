//! Fake per storage, transcoder e webhook usati nei test dei worker

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{QueueContext, WebhookError, WebhookSender};
use crate::config::Config;
use crate::db::test_support::temp_db;
use crate::models::CallbackPayload;
use crate::services::storage::{ObjectStorage, StorageError, StorageResult};
use crate::services::transcoder::{TranscodeError, Transcoder};

#[derive(Default)]
pub struct FakeStorage {
    pub missing_object: bool,
    pub fail_upload: bool,
    pub(crate) uploads: Mutex<Vec<(String, String)>>,
}

impl FakeStorage {
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        if self.missing_object {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, b"raw video").await?;
        Ok(())
    }

    async fn upload(&self, bucket: &str, local_path: &Path, key: &str) -> StorageResult<()> {
        if self.fail_upload {
            return Err(StorageError::Transport("connection reset".to_string()));
        }
        // L'output deve esistere al momento dell'upload
        tokio::fs::metadata(local_path).await?;
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTranscoder {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub(crate) calls: Mutex<Vec<(PathBuf, PathBuf, i64, i64)>>,
}

impl FakeTranscoder {
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, i64, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resolution: i64,
        crf: i64,
    ) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push((
            input.to_path_buf(),
            output.to_path_buf(),
            resolution,
            crf,
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(TranscodeError::ExitStatus(Some(1)));
        }
        tokio::fs::metadata(input).await?;
        tokio::fs::write(output, b"encoded video").await?;
        Ok(())
    }
}

/// Webhook con esiti programmati; a coda vuota risponde con successo
#[derive(Default)]
pub struct FakeWebhooks {
    pub(crate) outcomes: Mutex<VecDeque<Result<(), WebhookError>>>,
    pub always_fail: bool,
    pub(crate) calls: Mutex<Vec<(String, CallbackPayload)>>,
}

impl FakeWebhooks {
    pub fn push_outcome(&self, outcome: Result<(), WebhookError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(String, CallbackPayload)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSender for FakeWebhooks {
    async fn deliver(&self, url: &str, payload: &CallbackPayload) -> Result<(), WebhookError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        if self.always_fail {
            return Err(WebhookError::Status(503));
        }
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub struct Harness {
    pub ctx: Arc<QueueContext>,
    pub storage: Arc<FakeStorage>,
    pub transcoder: Arc<FakeTranscoder>,
    pub webhooks: Arc<FakeWebhooks>,
    _staging: tempfile::TempDir,
    _db_dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(
            FakeStorage::default(),
            FakeTranscoder::default(),
            FakeWebhooks::default(),
            |_| {},
        )
        .await
    }

    pub async fn with<F>(
        storage: FakeStorage,
        transcoder: FakeTranscoder,
        webhooks: FakeWebhooks,
        configure: F,
    ) -> Self
    where
        F: FnOnce(&mut Config),
    {
        let (pool, db_dir) = temp_db().await;
        let staging = tempfile::tempdir().unwrap();

        let mut config = Config {
            local_raw_video_path: staging.path().join("raw"),
            local_processed_video_path: staging.path().join("processed"),
            poll_interval: Duration::from_millis(50),
            ..Config::default()
        };
        configure(&mut config);

        let storage = Arc::new(storage);
        let transcoder = Arc::new(transcoder);
        let webhooks = Arc::new(webhooks);
        let ctx = Arc::new(QueueContext::new(
            pool,
            config,
            storage.clone(),
            transcoder.clone(),
            webhooks.clone(),
        ));

        Self {
            ctx,
            storage,
            transcoder,
            webhooks,
            _staging: staging,
            _db_dir: db_dir,
        }
    }

    /// True se nessun file è rimasto nelle directory di staging
    pub fn staging_is_empty(&self) -> bool {
        [
            &self.ctx.config.local_raw_video_path,
            &self.ctx.config.local_processed_video_path,
        ]
        .iter()
        .all(|root| match std::fs::read_dir(root) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        })
    }
}
