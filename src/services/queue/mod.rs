//! Job queue service module
//!
//! Worker pools that poll the job store, claim one job at a time through the
//! store's conditional update and drive it through its phase. Workers share
//! nothing in memory except the [`QueueContext`]; all coordination happens
//! through the database, so the pools stay correct across processes.

mod callbacks;
mod encoder;
#[cfg(test)]
pub(crate) mod testing;
mod webhooks;

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::storage::ObjectStorage;
use crate::services::transcoder::Transcoder;

// Re-export public items
pub use callbacks::{poll_callback_jobs, process_callback_job, run_callback_worker};
pub use encoder::{poll_encoding_jobs, process_encoding_job, run_encoding_worker};
pub use webhooks::{HttpWebhookSender, WebhookError, WebhookSender};

/// Contesto condiviso passato a ogni worker all'avvio
pub struct QueueContext {
    pub db: DbPool,
    pub config: Config,
    pub storage: Arc<dyn ObjectStorage>,
    pub transcoder: Arc<dyn Transcoder>,
    pub webhooks: Arc<dyn WebhookSender>,
    encode_wakeup: Notify,
    callback_wakeup: Notify,
}

impl std::fmt::Debug for QueueContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueContext")
            .field("config", &self.config)
            .finish()
    }
}

impl QueueContext {
    pub fn new(
        db: DbPool,
        config: Config,
        storage: Arc<dyn ObjectStorage>,
        transcoder: Arc<dyn Transcoder>,
        webhooks: Arc<dyn WebhookSender>,
    ) -> Self {
        Self {
            db,
            config,
            storage,
            transcoder,
            webhooks,
            encode_wakeup: Notify::new(),
            callback_wakeup: Notify::new(),
        }
    }

    /// Sveglia gli encoding worker in attesa (es. dopo un inserimento)
    pub fn wake_encoders(&self) {
        self.encode_wakeup.notify_waiters();
    }

    /// Sveglia i callback worker in attesa (es. dopo una promozione)
    pub fn wake_callbacks(&self) {
        self.callback_wakeup.notify_waiters();
    }

    /// Attende il prossimo poll: intervallo fisso, risveglio locale o shutdown.
    ///
    /// Ritorna `true` se il worker deve terminare.
    async fn idle(&self, wakeup: &Notify, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval) => false,
            _ = wakeup.notified() => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

/// Avvia i pool di encoding e di callback
pub fn start_worker_pools(
    ctx: Arc<QueueContext>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for worker_id in 1..=ctx.config.encoder_worker_count {
        handles.push(tokio::spawn(run_encoding_worker(
            ctx.clone(),
            worker_id,
            shutdown.clone(),
        )));
    }

    for worker_id in 1..=ctx.config.callback_worker_count {
        handles.push(tokio::spawn(run_callback_worker(
            ctx.clone(),
            worker_id,
            shutdown.clone(),
        )));
    }

    tracing::info!(
        "Avviati {} encoding worker e {} callback worker",
        ctx.config.encoder_worker_count,
        ctx.config.callback_worker_count
    );

    handles
}
