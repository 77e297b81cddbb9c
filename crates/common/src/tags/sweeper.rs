//! Deferred orphan tag collection
//!
//! Post updates and deletes only schedule a sweep; a single background task
//! runs [`collect_orphans`] in its own transaction once the request is done.

use super::collect_orphans;
use crate::db::DbPool;
use crate::errors::Result;
use crate::metrics;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Handle for scheduling sweeps. Cheap to clone; the worker stops once every
/// handle has been dropped and the last pending sweep has run.
#[derive(Clone, Debug)]
pub struct OrphanSweeper {
    tx: mpsc::Sender<()>,
}

impl OrphanSweeper {
    /// Start the worker on the current tokio runtime
    pub fn spawn(db: DbPool) -> (Self, JoinHandle<()>) {
        // capacity 1: a queued sweep has not started yet, so it also covers
        // every mutation committed before a later schedule() call
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(db, rx));
        (Self { tx }, handle)
    }

    /// False once the worker has exited
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Request a sweep without waiting for it
    pub fn schedule(&self) {
        match self.tx.try_send(()) {
            Ok(()) => tracing::debug!("Orphan sweep scheduled"),
            Err(TrySendError::Full(())) => {
                tracing::debug!("Orphan sweep already pending, coalesced");
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!("Orphan sweeper stopped, sweep request dropped");
            }
        }
    }
}

async fn run(db: DbPool, mut rx: mpsc::Receiver<()>) {
    tracing::info!("Orphan sweeper started");

    while rx.recv().await.is_some() {
        let start = Instant::now();
        match sweep(&db).await {
            Ok(removed) => {
                metrics::record_orphan_sweep(start.elapsed().as_secs_f64(), removed, true);
            }
            Err(e) => {
                metrics::record_orphan_sweep(start.elapsed().as_secs_f64(), 0, false);
                tracing::error!(error = %e, "Orphan sweep failed");
            }
        }
    }

    tracing::info!("Orphan sweeper stopped");
}

async fn sweep(db: &DbPool) -> Result<usize> {
    let txn = db.begin().await?;
    let removed = collect_orphans(&txn).await?;
    txn.commit().await?;
    Ok(removed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TagEntity;
    use crate::db::test_pool;
    use crate::tags::resolve_tags;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_scheduled_sweep_removes_orphans() {
        let pool = test_pool().await;
        resolve_tags(pool.write(), &["orphan".to_string()]).await.unwrap();

        let (sweeper, handle) = OrphanSweeper::spawn(pool.clone());
        sweeper.schedule();
        drop(sweeper);
        handle.await.unwrap();

        assert!(TagEntity::find().all(pool.write()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bursts_coalesce_without_blocking() {
        let pool = test_pool().await;
        let (sweeper, handle) = OrphanSweeper::spawn(pool.clone());

        for _ in 0..50 {
            sweeper.clone().schedule();
        }
        drop(sweeper);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("worker drains and exits")
            .unwrap();
    }

    #[tokio::test]
    async fn test_schedule_after_worker_stopped_is_harmless() {
        let pool = test_pool().await;
        let (sweeper, handle) = OrphanSweeper::spawn(pool);
        assert!(sweeper.is_running());
        handle.abort();
        let _ = handle.await;

        assert!(!sweeper.is_running());
        sweeper.schedule();
    }
}
