//! Modulo per la gestione dei job nel database
//!
//! Ogni scrittura di stato è un UPDATE condizionale: il predicato sullo stato
//! corrente sta nella stessa istruzione della nuova scrittura, quindi due
//! worker in gara sulla stessa riga non possono vincere entrambi.

use chrono::{SecondsFormat, Utc};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use super::DbPool;
use crate::models::{JobRecord, JobStatus, NewJob, Phase};

const JOB_COLUMNS: &str = r#"
    id, video_id, input_bucket, input_key, output_bucket, output_path,
    resolution, crf, callback_url, status, failed_count, callback_failures,
    created_at, updated_at
"#;

/// Conteggi prodotti da `reset_orphaned`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanReset {
    /// encoding_running -> encoding_pending (nessun fallimento precedente)
    pub encoding_to_pending: u64,
    /// encoding_running -> encoding_failed (failed_count > 0)
    pub encoding_to_failed: u64,
    /// callback_running -> callback_pending
    pub callback_requeued: u64,
    /// encoding_success -> callback_pending
    pub promoted: u64,
}

impl OrphanReset {
    pub fn total(&self) -> u64 {
        self.encoding_to_pending + self.encoding_to_failed + self.callback_requeued + self.promoted
    }
}

/// Timestamp a larghezza fissa: l'ordinamento lessicografico coincide con quello temporale
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Predicato SQL per i job claimabili della fase
fn claimable_predicate(phase: Phase, encoding_ceiling: Option<i64>) -> String {
    let mut sql = format!(
        "status IN ({})",
        placeholders(phase.claimable_statuses().len())
    );
    if phase == Phase::Encoding && encoding_ceiling.is_some() {
        sql.push_str(" AND (status != 'encoding_failed' OR failed_count < ?)");
    }
    sql
}

/// Crea un nuovo job nel database nello stato iniziale
pub async fn create_job<'e, E>(executor: E, job: &NewJob) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = Uuid::new_v4();
    let now = now();

    sqlx::query(
        r#"
        INSERT INTO jobs (
            id, video_id, input_bucket, input_key, output_bucket, output_path,
            resolution, crf, callback_url, status, failed_count, callback_failures,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&job.video_id)
    .bind(&job.input_bucket)
    .bind(&job.input_key)
    .bind(&job.output_bucket)
    .bind(&job.output_path)
    .bind(job.resolution)
    .bind(job.crf)
    .bind(&job.callback_url)
    .bind(JobStatus::EncodingPending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(executor)
    .await?;

    Ok(id)
}

/// Crea tutti i job di una richiesta in un'unica transazione
pub async fn create_jobs(pool: &DbPool, jobs: &[NewJob]) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(jobs.len());

    for job in jobs {
        ids.push(create_job(&mut *tx, job).await?);
    }

    tx.commit().await?;
    Ok(ids)
}

/// Ottieni un job per ID
pub async fn get_job(pool: &DbPool, id: &Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
    let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
    sqlx::query_as::<_, JobRecord>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
}

/// Job claimabili per la fase, in ordine di creazione.
///
/// È una fotografia: altri worker possono prendere in carico questi job
/// subito dopo il ritorno. Con `encoding_ceiling` i job in `encoding_failed`
/// che hanno raggiunto il tetto vengono esclusi.
pub async fn list_claimable(
    pool: &DbPool,
    phase: Phase,
    encoding_ceiling: Option<i64>,
) -> Result<Vec<JobRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM jobs WHERE {} ORDER BY created_at ASC, rowid ASC",
        JOB_COLUMNS,
        claimable_predicate(phase, encoding_ceiling)
    );

    let mut query = sqlx::query_as::<_, JobRecord>(&sql);
    for status in phase.claimable_statuses() {
        query = query.bind(status.as_str());
    }
    if phase == Phase::Encoding {
        if let Some(ceiling) = encoding_ceiling {
            query = query.bind(ceiling);
        }
    }

    query.fetch_all(pool).await
}

/// Prende in carico un job: passa allo stato running della fase solo se è
/// ancora in uno stato claimabile. Ritorna `false` se un altro worker ha vinto.
pub async fn claim_job(
    pool: &DbPool,
    id: &Uuid,
    phase: Phase,
    encoding_ceiling: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND {}",
        claimable_predicate(phase, encoding_ceiling)
    );

    let mut query = sqlx::query(&sql)
        .bind(phase.running_status().as_str())
        .bind(now())
        .bind(id.to_string());
    for status in phase.claimable_statuses() {
        query = query.bind(status.as_str());
    }
    if phase == Phase::Encoding {
        if let Some(ceiling) = encoding_ceiling {
            query = query.bind(ceiling);
        }
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Scrive `to` solo se lo stato corrente è in `from`.
///
/// Gli stati di partenza non ammessi dalla macchina a stati vengono scartati.
async fn transition(
    pool: &DbPool,
    id: &Uuid,
    from: &[JobStatus],
    to: JobStatus,
) -> Result<bool, sqlx::Error> {
    let from: Vec<JobStatus> = from
        .iter()
        .copied()
        .filter(|status| status.can_transition_to(to))
        .collect();
    if from.is_empty() {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
        placeholders(from.len())
    );

    let mut query = sqlx::query(&sql)
        .bind(to.as_str())
        .bind(now())
        .bind(id.to_string());
    for status in &from {
        query = query.bind(status.as_str());
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Aggiorna lo stato di un job.
///
/// La scrittura avviene solo da un predecessore legale del nuovo stato;
/// ritorna `false` se la riga era in uno stato da cui la transizione non è ammessa.
pub async fn set_status(pool: &DbPool, id: &Uuid, status: JobStatus) -> Result<bool, sqlx::Error> {
    transition(pool, id, status.predecessors(), status).await
}

/// Confine di fase: encoding_success -> callback_pending
pub async fn promote_to_callback(pool: &DbPool, id: &Uuid) -> Result<bool, sqlx::Error> {
    transition(
        pool,
        id,
        &[JobStatus::EncodingSuccess],
        JobStatus::CallbackPending,
    )
    .await
}

/// Incrementa il contatore di fallimenti della fase e ritorna il nuovo valore
pub async fn increment_failure(pool: &DbPool, id: &Uuid, phase: Phase) -> Result<i64, sqlx::Error> {
    let column = phase.failure_column();
    let sql = format!(
        "UPDATE jobs SET {column} = {column} + 1, updated_at = ? WHERE id = ? RETURNING {column}"
    );

    let row: (i64,) = sqlx::query_as(&sql)
        .bind(now())
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

/// Porta in callback_failed un job in attesa che ha già esaurito i tentativi
pub async fn mark_callback_exhausted(
    pool: &DbPool,
    id: &Uuid,
    max_failures: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs SET status = ?, updated_at = ?
        WHERE id = ? AND status = ? AND callback_failures >= ?
        "#,
    )
    .bind(JobStatus::CallbackFailed.as_str())
    .bind(now())
    .bind(id.to_string())
    .bind(JobStatus::CallbackPending.as_str())
    .bind(max_failures)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Risolve i job rimasti in uno stato running dopo un crash.
///
/// Da chiamare solo all'avvio, prima che partano i worker.
pub async fn reset_orphaned(pool: &DbPool) -> Result<OrphanReset, sqlx::Error> {
    let now = now();
    let mut tx = pool.begin().await?;

    let encoding_to_failed = sqlx::query(
        "UPDATE jobs SET status = ?, updated_at = ? WHERE status = ? AND failed_count > 0",
    )
    .bind(JobStatus::EncodingFailed.as_str())
    .bind(&now)
    .bind(JobStatus::EncodingRunning.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let encoding_to_pending = sqlx::query(
        "UPDATE jobs SET status = ?, updated_at = ? WHERE status = ? AND failed_count = 0",
    )
    .bind(JobStatus::EncodingPending.as_str())
    .bind(&now)
    .bind(JobStatus::EncodingRunning.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let callback_requeued =
        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE status = ?")
            .bind(JobStatus::CallbackPending.as_str())
            .bind(&now)
            .bind(JobStatus::CallbackRunning.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

    // Crash tra la scrittura di encoding_success e la promozione
    let promoted = sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE status = ?")
        .bind(JobStatus::CallbackPending.as_str())
        .bind(&now)
        .bind(JobStatus::EncodingSuccess.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(OrphanReset {
        encoding_to_pending,
        encoding_to_failed,
        callback_requeued,
        promoted,
    })
}

/// Conta i job per stato
pub async fn count_jobs_by_status(pool: &DbPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn sample_job(resolution: i64) -> NewJob {
        NewJob {
            video_id: "vid123".to_string(),
            input_bucket: "raw-bucket".to_string(),
            input_key: "uploads/vid123/source.mov".to_string(),
            output_bucket: "cdn-bucket".to_string(),
            output_path: "videos/vid123".to_string(),
            resolution,
            crf: 23,
            callback_url: "http://example.test/cb".to_string(),
        }
    }

    /// Forza lo stato e i contatori di un job (solo per i test)
    pub async fn force_state(
        pool: &DbPool,
        id: &Uuid,
        status: JobStatus,
        failed_count: i64,
        callback_failures: i64,
    ) {
        sqlx::query(
            "UPDATE jobs SET status = ?, failed_count = ?, callback_failures = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(failed_count)
        .bind(callback_failures)
        .bind(id.to_string())
        .execute(pool)
        .await
        .expect("force state");
    }

    pub async fn status_of(pool: &DbPool, id: &Uuid) -> JobStatus {
        let record = get_job(pool, id).await.unwrap().expect("job exists");
        JobStatus::parse(&record.status).expect("known status")
    }
}
