//! Shared application state.

use std::sync::Arc;

use tokio::sync::RwLock;

use bams_chain::{
    BlockSnapshot, ChainKey, ChainRegistry, EntityId, EntityKind, LedgerConfig, MetricsRegistry,
};

use crate::directory::Directory;

/// Shared state held by request handlers.
///
/// Wrapped in an [`Arc`] and passed to handlers via Axum's `State`
/// extractor. Mutating handlers serialize on the entity's chain through
/// [`bams_chain::ChainHandle::begin_append`] and take the directory lock
/// only for short reads and writes, never while mining. Lock order is
/// chain first, directory second.
pub struct AppState {
    /// One hash chain per department, class and student.
    pub ledger: ChainRegistry,
    /// Entity records.
    pub directory: RwLock<Directory>,
    /// Whether `/metrics` is served.
    pub metrics_enabled: bool,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(cfg: &LedgerConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            ledger: ChainRegistry::from_config(cfg, metrics),
            directory: RwLock::new(Directory::new()),
            metrics_enabled: cfg.metrics.enabled,
        }
    }

    /// Current snapshot of an entity's chain, empty if it has none.
    pub async fn chain_data(&self, kind: EntityKind, id: &EntityId) -> Vec<BlockSnapshot> {
        match self.ledger.get(&ChainKey::new(kind, id.clone())).await {
            Some(chain) => chain.chain_data().await,
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> SharedState {
        let mut cfg = LedgerConfig::default();
        cfg.policy.difficulty = 1;
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry"));
        Arc::new(Self::new(&cfg, metrics))
    }
}
