//! Periodic overdue reconciliation
//!
//! Per-user reads still reconcile inline; the sweep keeps unscoped data and
//! users who never read their own list up to date.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{error::AppResult, services::borrows::BorrowsService};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverdueReconciler: Send + Sync {
    /// Relabel every stale active record. Returns how many changed.
    async fn reconcile_all(&self) -> AppResult<u64>;
}

#[async_trait]
impl OverdueReconciler for BorrowsService {
    async fn reconcile_all(&self) -> AppResult<u64> {
        self.reconcile_overdue(None).await
    }
}

/// Spawn the background sweep, ticking every `every`
pub fn start_overdue_sweeper(
    reconciler: Arc<dyn OverdueReconciler>,
    every: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting overdue sweep background job");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;
            sweep_once(reconciler.as_ref()).await;
        }
    })
}

/// Run one sweep, logging instead of propagating failures
pub async fn sweep_once(reconciler: &dyn OverdueReconciler) -> u64 {
    match reconciler.reconcile_all().await {
        Ok(relabeled) => relabeled,
        Err(e) => {
            error!("Overdue sweep failed: {}", e);
            0
        }
    }
}
