//! Callback worker: consegna del webhook per i job codificati

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::QueueContext;
use crate::db::jobs as db_jobs;
use crate::error::Result;
use crate::models::{CallbackPayload, Job, JobStatus, Phase};

/// Loop di un callback worker; termina solo allo shutdown
pub async fn run_callback_worker(
    ctx: Arc<QueueContext>,
    worker_id: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Callback worker {} avviato", worker_id);

    loop {
        let processed = match poll_callback_jobs(&ctx, worker_id).await {
            Ok(processed) => processed,
            Err(e) => {
                error!("Callback worker {}: errore lettura job: {}", worker_id, e);
                false
            }
        };

        if *shutdown.borrow() {
            break;
        }

        if !processed && ctx.idle(&ctx.callback_wakeup, &mut shutdown).await {
            break;
        }
    }

    info!("Callback worker {} terminato", worker_id);
}

/// Un ciclo di poll sulla fase di callback.
///
/// I job che hanno già esaurito i tentativi vengono chiusi in callback_failed
/// senza essere presi in carico. Ritorna `true` se un webhook è stato tentato.
pub async fn poll_callback_jobs(ctx: &QueueContext, worker_id: usize) -> Result<bool> {
    let max_failures = ctx.config.max_callback_failures;
    let candidates = db_jobs::list_claimable(&ctx.db, Phase::Callback, None).await?;

    for record in candidates {
        let job = match Job::try_from(record) {
            Ok(job) => job,
            Err(e) => {
                warn!("Callback worker {}: job ignorato: {}", worker_id, e);
                continue;
            }
        };

        if job.callback_failures >= max_failures {
            match db_jobs::mark_callback_exhausted(&ctx.db, &job.id, max_failures).await {
                Ok(true) => warn!(
                    "Job {}: tentativi di callback esauriti ({}), stato callback_failed",
                    job.id, job.callback_failures
                ),
                Ok(false) => {}
                Err(e) => error!(
                    "Callback worker {}: errore chiusura job {}: {}",
                    worker_id, job.id, e
                ),
            }
            continue;
        }

        match db_jobs::claim_job(&ctx.db, &job.id, Phase::Callback, None).await {
            Ok(true) => {
                info!("Callback worker {}: claimed job {}", worker_id, job.id);
                if let Err(e) = process_callback_job(ctx, worker_id, &job).await {
                    error!(
                        "Callback worker {}: errore aggiornamento job {}: {}",
                        worker_id, job.id, e
                    );
                }
                return Ok(true);
            }
            Ok(false) => continue,
            Err(e) => {
                error!("Callback worker {}: errore claim job {}: {}", worker_id, job.id, e);
                continue;
            }
        }
    }

    Ok(false)
}

/// Invia il webhook per un job in callback_running e registra l'esito
pub async fn process_callback_job(ctx: &QueueContext, worker_id: usize, job: &Job) -> Result<()> {
    let payload = CallbackPayload::for_encoded_job(job);

    match ctx.webhooks.deliver(&job.callback_url, &payload).await {
        Ok(()) => {
            db_jobs::set_status(&ctx.db, &job.id, JobStatus::CallbackSuccess).await?;
            info!("Callback worker {}: job {} completato", worker_id, job.id);
        }
        Err(e) => {
            let failures = db_jobs::increment_failure(&ctx.db, &job.id, Phase::Callback).await?;
            let max_failures = ctx.config.max_callback_failures;

            if failures >= max_failures {
                db_jobs::set_status(&ctx.db, &job.id, JobStatus::CallbackFailed).await?;
                error!(
                    "Webhook fallito per job {} ({}/{}), tentativi esauriti: {}",
                    job.id, failures, max_failures, e
                );
            } else {
                db_jobs::set_status(&ctx.db, &job.id, JobStatus::CallbackPending).await?;
                warn!(
                    "Webhook fallito per job {} ({}/{}), nuovo tentativo: {}",
                    job.id, failures, max_failures, e
                );
            }
        }
    }

    Ok(())
}
