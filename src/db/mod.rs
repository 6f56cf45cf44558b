pub mod jobs;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = SqlitePool;

/// Inizializza il database SQLite
pub async fn init_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    // WAL + busy timeout: gli UPDATE condizionali concorrenti si serializzano
    // invece di fallire con SQLITE_BUSY
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    // Crea il pool di connessioni
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .idle_timeout(Duration::from_secs(60))
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    // Esegui le migrazioni
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Esegue le migrazioni del database
async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // Crea tabella jobs: una riga per profilo di output
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            video_id TEXT NOT NULL,
            input_bucket TEXT NOT NULL,
            input_key TEXT NOT NULL,
            output_bucket TEXT NOT NULL,
            output_path TEXT NOT NULL,
            resolution INTEGER NOT NULL DEFAULT 0,
            crf INTEGER NOT NULL DEFAULT 0,
            callback_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'encoding_pending',
            failed_count INTEGER NOT NULL DEFAULT 0,
            callback_failures INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indici per jobs
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at)"#)
        .execute(pool)
        .await?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_db;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (pool, _dir) = temp_db().await;
        super::run_migrations(&pool).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
