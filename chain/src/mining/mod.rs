//! Proof-of-work scheduling.
//!
//! Mining is CPU-bound and, at the default difficulty, takes tens of
//! thousands of hashes. It must never run on an async executor thread, so
//! the registry hands unsealed blocks to a [`MiningPool`]: a semaphore caps
//! how many searches run at once and each search runs on Tokio's blocking
//! thread pool while the caller awaits the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::ledger::error::{LedgerError, MiningError};
use crate::types::Block;

/// Configuration for the mining pool.
#[derive(Clone, Debug)]
pub struct MiningConfig {
    /// Maximum number of concurrent proof-of-work searches.
    pub workers: usize,
    /// Optional cap on nonces tried per block. `None` searches until a
    /// nonce is found.
    pub max_attempts: Option<u64>,
    /// Optional time the caller is willing to wait for one block.
    pub timeout: Option<Duration>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            max_attempts: None,
            timeout: None,
        }
    }
}

impl MiningConfig {
    /// A fresh budget reflecting this configuration.
    pub fn budget(&self) -> MiningBudget {
        let budget = MiningBudget::unlimited();
        match self.max_attempts {
            Some(max) => budget.with_max_attempts(max),
            None => budget,
        }
    }
}

/// Limits for a single proof-of-work search.
///
/// Clones share the cancellation flag, so the awaiting side can stop a
/// search that is running on a worker thread.
#[derive(Clone, Debug, Default)]
pub struct MiningBudget {
    pub max_attempts: Option<u64>,
    cancelled: Arc<AtomicBool>,
}

impl MiningBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A block sealed by the pool, with search statistics.
#[derive(Clone, Debug)]
pub struct Sealed {
    pub block: Block,
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Bounded pool that seals blocks off the async executor.
#[derive(Clone, Debug)]
pub struct MiningPool {
    permits: Arc<Semaphore>,
    config: MiningConfig,
}

impl MiningPool {
    pub fn new(config: MiningConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.workers.max(1)));
        Self { permits, config }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Mines `block` at `difficulty` on a blocking worker.
    ///
    /// The worker keeps its permit until the search actually stops, so the
    /// concurrency bound holds even when the caller gives up on a timeout;
    /// in that case the search is cancelled and
    /// [`MiningError::TimedOut`] is returned.
    pub async fn seal(&self, mut block: Block, difficulty: u32) -> Result<Sealed, LedgerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LedgerError::Worker("mining pool is closed".to_string()))?;

        let budget = self.config.budget();
        let worker_budget = budget.clone();
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let attempts = block.mine_with(difficulty, &worker_budget)?;
            Ok::<_, MiningError>((block, attempts))
        });

        let joined = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    budget.cancel();
                    return Err(MiningError::TimedOut(limit).into());
                }
            },
            None => task.await,
        };

        let (block, attempts) =
            joined.map_err(|e| LedgerError::Worker(format!("mining task failed: {e}")))??;

        Ok(Sealed {
            block,
            attempts,
            elapsed: started.elapsed(),
        })
    }
}
