use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::cron::{CronLockStore, LOCK_AUTO_CANCEL, LOCK_AUTO_FINALIZE, LOCK_CHAIN_SYNC};
use crate::config::SweepConfig;
use crate::orders::sync::ChainSyncService;
use crate::sweeps::auto_cancel::{AutoCancelOptions, AutoCancelSweep};
use crate::sweeps::auto_finalize::{AutoFinalizeOptions, AutoFinalizeSweep};

/// In-process driver for the periodic sweeps. Each task runs under its cron
/// lock, so overlapping triggers (a second replica, or a manual run through
/// the HTTP surface) skip the cycle instead of doubling the work.
pub struct SweepScheduler {
    sync: Arc<ChainSyncService>,
    auto_cancel: Arc<AutoCancelSweep>,
    auto_finalize: Arc<AutoFinalizeSweep>,
    locks: Arc<CronLockStore>,
    config: SweepConfig,
}

impl SweepScheduler {
    pub fn new(
        sync: Arc<ChainSyncService>,
        auto_cancel: Arc<AutoCancelSweep>,
        auto_finalize: Arc<AutoFinalizeSweep>,
        locks: Arc<CronLockStore>,
        config: SweepConfig,
    ) -> Self {
        Self {
            sync,
            auto_cancel,
            auto_finalize,
            locks,
            config,
        }
    }

    /// Start the scheduler loop (runs in background).
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // desynchronize replicas started together
            let jitter = rand::rng().random_range(0..30u64);
            tokio::time::sleep(Duration::from_secs(jitter)).await;

            let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
            info!(
                "⏰ Sweep scheduler started (every {}s, {}s initial jitter)",
                self.config.interval_secs, jitter
            );
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    async fn tick(&self) {
        self.run_locked(LOCK_CHAIN_SYNC, || async {
            self.sync.sync_chain_orders().await.map(|_| ())
        })
        .await;

        self.run_locked(LOCK_AUTO_CANCEL, || async {
            self.auto_cancel
                .run("cron", AutoCancelOptions::default())
                .await
                .map(|_| ())
        })
        .await;

        self.run_locked(LOCK_AUTO_FINALIZE, || async {
            self.auto_finalize
                .run("cron", AutoFinalizeOptions::default())
                .await
                .map(|_| ())
        })
        .await;
    }

    async fn run_locked<F, Fut>(&self, lock_name: &str, task: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::error::AppResult<()>>,
    {
        match self.locks.acquire(lock_name, self.config.lock_ttl_ms).await {
            Ok(true) => {
                if let Err(e) = task().await {
                    error!("scheduled task '{}' failed: {:?}", lock_name, e);
                }
                self.locks.release(lock_name).await;
            }
            Ok(false) => {
                info!("'{}' held by another runner, skipping this cycle", lock_name);
            }
            Err(e) => {
                error!("lock acquisition for '{}' failed: {:?}", lock_name, e);
            }
        }
    }
}
