//! Encoding worker: download -> transcode -> upload

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::QueueContext;
use crate::db::jobs as db_jobs;
use crate::error::Result;
use crate::models::{Job, JobStatus, Phase};
use crate::services::storage::StorageError;
use crate::utils::{remove_dir_if_exists, StagingPaths};

/// Loop di un encoding worker; termina solo allo shutdown
pub async fn run_encoding_worker(
    ctx: Arc<QueueContext>,
    worker_id: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Encoding worker {} avviato", worker_id);

    loop {
        let processed = match poll_encoding_jobs(&ctx, worker_id).await {
            Ok(processed) => processed,
            Err(e) => {
                error!("Worker {}: errore lettura job: {}", worker_id, e);
                false
            }
        };

        if *shutdown.borrow() {
            break;
        }

        // Dopo un job si riprova subito, altrimenti si attende il backoff
        if !processed && ctx.idle(&ctx.encode_wakeup, &mut shutdown).await {
            break;
        }
    }

    info!("Encoding worker {} terminato", worker_id);
}

/// Un ciclo di poll: prende in carico al più un job e lo elabora.
///
/// Ritorna `true` se un job è stato elaborato.
pub async fn poll_encoding_jobs(ctx: &QueueContext, worker_id: usize) -> Result<bool> {
    let ceiling = ctx.config.encoding_failure_ceiling();
    let candidates = db_jobs::list_claimable(&ctx.db, Phase::Encoding, ceiling).await?;

    for record in candidates {
        let job = match Job::try_from(record) {
            Ok(job) => job,
            Err(e) => {
                warn!("Worker {}: job ignorato: {}", worker_id, e);
                continue;
            }
        };

        match db_jobs::claim_job(&ctx.db, &job.id, Phase::Encoding, ceiling).await {
            Ok(true) => {
                info!("Worker {}: claimed job {}", worker_id, job.id);
                process_encoding_job(ctx, worker_id, &job).await;
                return Ok(true);
            }
            // Un altro worker ha vinto la gara: si passa al candidato successivo
            Ok(false) => continue,
            Err(e) => {
                error!("Worker {}: errore claim job {}: {}", worker_id, job.id, e);
                continue;
            }
        }
    }

    Ok(false)
}

/// Elabora un job già in stato encoding_running e scrive lo stato finale
pub async fn process_encoding_job(ctx: &QueueContext, worker_id: usize, job: &Job) {
    let paths = StagingPaths::for_job(
        &ctx.config.local_raw_video_path,
        &ctx.config.local_processed_video_path,
        &job.id,
        &job.input_key,
        &job.output_file_name(),
    );

    match run_pipeline(ctx, job, &paths).await {
        Ok(()) => {
            info!(
                "Worker {}: job {} transcodificato in s3://{}/{}",
                worker_id,
                job.id,
                job.output_bucket,
                job.output_key()
            );
            if let Err(e) = mark_encoded(ctx, job).await {
                error!("Worker {}: errore aggiornamento job {}: {}", worker_id, job.id, e);
            }
        }
        Err(e) => {
            error!("Worker {}: elaborazione fallita per job {}: {}", worker_id, job.id, e);
            if let Err(e) = mark_encoding_failed(ctx, job).await {
                error!("Worker {}: errore aggiornamento job {}: {}", worker_id, job.id, e);
            }
        }
    }

    cleanup(&paths).await;
}

async fn run_pipeline(ctx: &QueueContext, job: &Job, paths: &StagingPaths) -> Result<()> {
    tokio::fs::create_dir_all(&paths.input_dir).await?;

    ctx.storage
        .download(&job.input_bucket, &job.input_key, &paths.input_file)
        .await
        .inspect_err(|e| {
            if let StorageError::NotFound { bucket, key } = e {
                warn!("Sorgente mancante per job {}: s3://{}/{}", job.id, bucket, key);
            }
        })?;

    tokio::fs::create_dir_all(&paths.output_dir).await?;

    ctx.transcoder
        .transcode(&paths.input_file, &paths.output_file, job.resolution, job.crf)
        .await?;

    ctx.storage
        .upload(&job.output_bucket, &paths.output_file, &job.output_key())
        .await?;

    Ok(())
}

/// encoding_success seguito dalla promozione a callback_pending
async fn mark_encoded(ctx: &QueueContext, job: &Job) -> Result<()> {
    if !db_jobs::set_status(&ctx.db, &job.id, JobStatus::EncodingSuccess).await? {
        warn!("Job {} non più in encoding_running, stato non aggiornato", job.id);
        return Ok(());
    }

    if db_jobs::promote_to_callback(&ctx.db, &job.id).await? {
        ctx.wake_callbacks();
    }
    Ok(())
}

/// Il contatore viene incrementato prima del cambio di stato: quando il job
/// torna claimabile il conteggio è già aggiornato. Lo stato viene scritto
/// anche se l'incremento fallisce, altrimenti il job resta in encoding_running.
async fn mark_encoding_failed(ctx: &QueueContext, job: &Job) -> Result<()> {
    let failures = db_jobs::increment_failure(&ctx.db, &job.id, Phase::Encoding).await;
    if let Err(e) = &failures {
        error!("Errore incremento fallimenti per job {}: {}", job.id, e);
    }

    db_jobs::set_status(&ctx.db, &job.id, JobStatus::EncodingFailed).await?;

    if let (Ok(failures), Some(ceiling)) = (failures, ctx.config.encoding_failure_ceiling()) {
        if failures >= ceiling {
            warn!(
                "Job {}: tentativi di encoding esauriti ({}/{})",
                job.id, failures, ceiling
            );
        }
    }
    Ok(())
}

/// Rimozione dei file locali; gli errori vengono solo registrati
async fn cleanup(paths: &StagingPaths) {
    if let Err(e) = remove_dir_if_exists(&paths.input_dir).await {
        warn!("Errore rimozione input {}: {}", paths.input_dir.display(), e);
    }
    if let Err(e) = remove_dir_if_exists(&paths.output_dir).await {
        warn!("Errore rimozione output {}: {}", paths.output_dir.display(), e);
    }
}
