//! Webhook delivery

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CallbackPayload;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Errore creazione client webhook: {0}")]
    Client(String),

    #[error("Errore di trasporto: {0}")]
    Transport(String),

    #[error("Il webhook ha risposto con status {0}")]
    Status(u16),
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST del payload al callback URL; solo una risposta 2xx è un successo
    async fn deliver(&self, url: &str, payload: &CallbackPayload) -> Result<(), WebhookError>;
}

pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, url: &str, payload: &CallbackPayload) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        if response.status().is_success() {
            tracing::info!("Webhook inviato con successo per job {}", payload.job_id);
            Ok(())
        } else {
            Err(WebhookError::Status(response.status().as_u16()))
        }
    }
}
