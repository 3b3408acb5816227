//! Process-wide directory of entity chains.
//!
//! The [`ChainRegistry`] maps `(entity kind, entity id)` to exactly one
//! chain. It is an explicit object shared through an `Arc`, never a global:
//!
//! - the key map sits behind an async `RwLock` that is only held long
//!   enough to find or insert a slot,
//! - each slot is a `OnceCell`, so concurrent `get_or_create` calls for the
//!   same key all wait on one genesis search and receive the same chain,
//! - each chain sits behind its own `Mutex`, held across
//!   read-latest → mine → push so two appenders can never fork a chain.
//!
//! Chains live only in memory; a restart loses them. Collaborators keep
//! snapshots next to their records, but those are a derived cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OnceCell, RwLock};

use crate::config::LedgerConfig;
use crate::ledger::{Chain, ChainPolicy, LedgerError, ValidationError};
use crate::metrics::MetricsRegistry;
use crate::mining::{MiningConfig, MiningPool, Sealed};
use crate::types::{Block, BlockSnapshot, ChainKey, EntityId, EntityKind, HashHex, Transaction};

pub mod anchor;
pub mod report;

pub use anchor::AnchorTrace;
pub use report::{ClassValidity, EntityRef, StudentValidity, ValidationReport};

type Slot = Arc<OnceCell<ChainHandle>>;

/// Shared handle to one registered chain.
///
/// Clones point at the same chain. All mutation goes through
/// [`ChainHandle::add_block`] or an [`AppendGuard`], both of which hold the
/// chain's lock for the whole append, mining included.
#[derive(Clone)]
pub struct ChainHandle {
    key: ChainKey,
    chain: Arc<Mutex<Chain>>,
    miner: MiningPool,
    metrics: Arc<MetricsRegistry>,
}

impl fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHandle").field("key", &self.key).finish()
    }
}

impl ChainHandle {
    pub fn key(&self) -> &ChainKey {
        &self.key
    }

    /// `true` if both handles refer to the same registered chain.
    pub fn same_chain(&self, other: &ChainHandle) -> bool {
        Arc::ptr_eq(&self.chain, &other.chain)
    }

    /// Appends one transaction record as a new block.
    pub async fn add_block(&self, tx: Transaction) -> Result<Block, LedgerError> {
        self.add_transactions(vec![tx]).await
    }

    /// Appends a block carrying `transactions` and returns a copy of it.
    pub async fn add_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Block, LedgerError> {
        self.begin_append().await.add_transactions(transactions).await
    }

    /// Takes the chain's lock for a sequence of reads and appends.
    ///
    /// Nothing else can append until the guard is dropped, so callers can
    /// read their own bookkeeping, append, and write the result back
    /// without another writer interleaving on this chain.
    pub async fn begin_append(&self) -> AppendGuard<'_> {
        AppendGuard {
            handle: self,
            chain: self.chain.lock().await,
        }
    }

    /// Ordered snapshot of every block.
    pub async fn chain_data(&self) -> Vec<BlockSnapshot> {
        self.chain.lock().await.snapshot()
    }

    /// Validates the chain, returning the first failing block.
    pub async fn validate(&self) -> Result<(), ValidationError> {
        let result = self.chain.lock().await.validate();
        if let Err(e) = &result {
            self.metrics.ledger.validation_failures.inc();
            tracing::warn!(chain = %self.key, block = e.block_index(), "{e}");
        }
        result
    }

    pub async fn is_chain_valid(&self) -> bool {
        self.validate().await.is_ok()
    }

    /// Every failing block, for forensic inspection.
    pub async fn audit(&self) -> Vec<ValidationError> {
        self.chain.lock().await.audit()
    }

    pub async fn latest_block(&self) -> Result<Block, LedgerError> {
        self.chain.lock().await.latest_block().cloned()
    }

    pub async fn latest_hash(&self) -> Result<HashHex, LedgerError> {
        Ok(self.latest_block().await?.hash)
    }

    pub async fn len(&self) -> usize {
        self.chain.lock().await.len()
    }

    /// Runs `f` against the chain under its lock.
    pub async fn read<R>(&self, f: impl FnOnce(&Chain) -> R) -> R {
        let chain = self.chain.lock().await;
        f(&chain)
    }

    #[cfg(test)]
    pub(crate) async fn tamper(&self, f: impl FnOnce(&mut Chain)) {
        let mut chain = self.chain.lock().await;
        f(&mut chain)
    }
}

/// Exclusive append access to one chain, from [`ChainHandle::begin_append`].
pub struct AppendGuard<'a> {
    handle: &'a ChainHandle,
    chain: MutexGuard<'a, Chain>,
}

impl AppendGuard<'_> {
    pub async fn add_block(&mut self, tx: Transaction) -> Result<Block, LedgerError> {
        self.add_transactions(vec![tx]).await
    }

    pub async fn add_transactions(
        &mut self,
        transactions: Vec<Transaction>,
    ) -> Result<Block, LedgerError> {
        let handle = self.handle;
        let template = self.chain.next_block(transactions)?;
        let sealed = handle.miner.seal(template, self.chain.difficulty()).await?;
        let attempts = sealed.attempts;
        record_mining(&handle.metrics, &sealed);

        let block = self.chain.push_sealed(sealed.block)?.clone();
        handle.metrics.ledger.blocks_sealed.inc();
        tracing::debug!(
            chain = %handle.key,
            index = block.index,
            attempts,
            hash = %block.hash,
            "block appended"
        );
        Ok(block)
    }

    pub fn chain_data(&self) -> Vec<BlockSnapshot> {
        self.chain.snapshot()
    }
}

fn record_mining(metrics: &MetricsRegistry, sealed: &Sealed) {
    metrics
        .ledger
        .mining_seconds
        .observe(sealed.elapsed.as_secs_f64());
}

/// Directory of chains keyed by `(entity kind, entity id)`.
pub struct ChainRegistry {
    slots: RwLock<HashMap<ChainKey, Slot>>,
    policy: ChainPolicy,
    miner: MiningPool,
    metrics: Arc<MetricsRegistry>,
}

impl ChainRegistry {
    pub fn new(policy: ChainPolicy, mining: MiningConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            policy,
            miner: MiningPool::new(mining),
            metrics,
        }
    }

    pub fn from_config(cfg: &LedgerConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self::new(cfg.policy.clone(), cfg.mining.clone(), metrics)
    }

    pub fn policy(&self) -> &ChainPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    async fn slot(&self, key: &ChainKey) -> Slot {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots.entry(key.clone()).or_default().clone()
    }

    /// Returns the chain for `(kind, id)`, creating it from `genesis` if
    /// none exists.
    ///
    /// Create-or-ignore: when the chain already exists `genesis` is
    /// discarded and the existing chain is returned unchanged. Concurrent
    /// callers for one key share a single genesis search. If that search
    /// fails the slot stays empty and a later call may retry.
    pub async fn get_or_create(
        &self,
        kind: EntityKind,
        id: impl Into<EntityId>,
        genesis: Transaction,
    ) -> Result<ChainHandle, LedgerError> {
        let key = ChainKey::new(kind, id);
        let slot = self.slot(&key).await;
        let handle = slot
            .get_or_try_init(|| self.create_chain(key.clone(), genesis))
            .await?;
        Ok(handle.clone())
    }

    async fn create_chain(
        &self,
        key: ChainKey,
        genesis: Transaction,
    ) -> Result<ChainHandle, LedgerError> {
        let template = Chain::genesis_template(genesis, key.kind.clone());
        let sealed = self.miner.seal(template, self.policy.difficulty).await?;
        record_mining(&self.metrics, &sealed);

        let attempts = sealed.attempts;
        let chain = Chain::from_sealed_genesis(sealed.block, self.policy.difficulty)?;
        self.metrics.ledger.chains_created.inc();
        self.metrics.ledger.blocks_sealed.inc();
        tracing::info!(
            chain = %key,
            attempts,
            hash = %chain.latest_block()?.hash,
            "chain created"
        );

        Ok(ChainHandle {
            key,
            chain: Arc::new(Mutex::new(chain)),
            miner: self.miner.clone(),
            metrics: self.metrics.clone(),
        })
    }

    /// Returns the chain for `key` if it exists. Never creates one.
    pub async fn get(&self, key: &ChainKey) -> Option<ChainHandle> {
        let slots = self.slots.read().await;
        slots.get(key).and_then(|slot| slot.get()).cloned()
    }

    /// Like [`ChainRegistry::get`] but reports absence as
    /// [`LedgerError::NotFound`].
    pub async fn lookup(
        &self,
        kind: EntityKind,
        id: impl Into<EntityId>,
    ) -> Result<ChainHandle, LedgerError> {
        let key = ChainKey::new(kind, id);
        self.get(&key).await.ok_or(LedgerError::NotFound(key))
    }

    /// Keys of all chains that finished genesis.
    pub async fn keys(&self) -> Vec<ChainKey> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.keys().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
