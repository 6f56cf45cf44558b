//! Riconciliazione all'avvio dei job lasciati a metà da un crash

use tracing::info;

use crate::db::jobs::{self as db_jobs, OrphanReset};
use crate::db::DbPool;

/// Riporta in uno stato claimabile i job rimasti in esecuzione.
///
/// Va eseguita una sola volta prima di avviare i worker; una seconda
/// esecuzione non trova nulla da modificare.
pub async fn reconcile(pool: &DbPool) -> Result<OrphanReset, sqlx::Error> {
    let reset = db_jobs::reset_orphaned(pool).await?;

    if reset.total() == 0 {
        info!("Recovery: nessun job orfano");
    } else {
        info!(
            "Recovery: {} job riportati in encoding_pending, {} in encoding_failed, {} callback rimessi in coda, {} promossi a callback_pending",
            reset.encoding_to_pending,
            reset.encoding_to_failed,
            reset.callback_requeued,
            reset.promoted
        );
    }

    Ok(reset)
}
