//! Single-entity append-only chain.

use crate::types::block::now_millis;
use crate::types::{Block, BlockSnapshot, EntityKind, HashHex, Transaction};
use crate::validation::{StandardRules, audit_blocks, validate_blocks};

use super::config::ChainPolicy;
use super::error::{LedgerError, ValidationError};

/// Ordered, append-only sequence of blocks for one entity.
///
/// A `Chain` is never empty: every constructor installs a mined genesis
/// block at index 0 whose prevHash is the `"0"` sentinel. It grows by one
/// block per append and never shrinks. `Chain` itself is not synchronized;
/// the registry wraps each chain in its own lock so that read-latest →
/// mine → push happens atomically per chain.
#[derive(Clone, Debug)]
pub struct Chain {
    kind: EntityKind,
    difficulty: u32,
    blocks: Vec<Block>,
}

impl Chain {
    /// Builds a chain with the default policy, mining the genesis block on
    /// the calling thread.
    pub fn new(genesis: Transaction, kind: EntityKind) -> Self {
        Self::with_policy(genesis, kind, &ChainPolicy::default())
    }

    /// Builds a chain with an explicit policy, mining the genesis block on
    /// the calling thread.
    pub fn with_policy(genesis: Transaction, kind: EntityKind, policy: &ChainPolicy) -> Self {
        let mut block = Self::genesis_template(genesis, kind.clone());
        block.mine(policy.difficulty);
        Self {
            kind,
            difficulty: policy.difficulty,
            blocks: vec![block],
        }
    }

    /// Unsealed genesis block: index 0, sentinel prevHash, `[genesis]`.
    pub fn genesis_template(genesis: Transaction, kind: EntityKind) -> Block {
        Block::new(
            0,
            now_millis(),
            vec![genesis],
            HashHex::genesis_sentinel(),
            kind,
        )
    }

    /// Wraps an already sealed genesis block (mined elsewhere, e.g. on the
    /// mining pool).
    pub fn from_sealed_genesis(genesis: Block, difficulty: u32) -> Result<Self, LedgerError> {
        let kind = genesis.kind.clone();
        let chain = Self {
            kind,
            difficulty,
            blocks: vec![genesis],
        };
        chain.validate()?;
        Ok(chain)
    }

    /// Rebuilds a chain from a persisted snapshot.
    ///
    /// Stored hashes are kept verbatim, so the result can be validated to
    /// check a collaborator's cached copy. An empty snapshot cannot form a
    /// chain and is reported as an invariant violation.
    pub fn from_snapshot(
        kind: EntityKind,
        difficulty: u32,
        snapshot: Vec<BlockSnapshot>,
    ) -> Result<Self, LedgerError> {
        if snapshot.is_empty() {
            return Err(LedgerError::InvariantViolation(format!(
                "snapshot for {kind} chain has no blocks"
            )));
        }
        let blocks = snapshot
            .into_iter()
            .map(|snap| Block::from_snapshot(snap, kind.clone()))
            .collect();
        Ok(Self {
            kind,
            difficulty,
            blocks,
        })
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false` for a correctly constructed chain.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn genesis(&self) -> Result<&Block, LedgerError> {
        self.blocks.first().ok_or_else(|| self.empty_chain())
    }

    /// Returns the most recent block.
    ///
    /// An empty chain can only come from a construction bug, so it is
    /// logged and surfaced as [`LedgerError::InvariantViolation`].
    pub fn latest_block(&self) -> Result<&Block, LedgerError> {
        self.blocks.last().ok_or_else(|| self.empty_chain())
    }

    fn empty_chain(&self) -> LedgerError {
        tracing::error!(kind = %self.kind, "chain has no blocks");
        LedgerError::InvariantViolation(format!("{} chain has no blocks", self.kind))
    }

    /// Builds the next, still unsealed, block on top of the current tip.
    pub fn next_block(&self, transactions: Vec<Transaction>) -> Result<Block, LedgerError> {
        let latest = self.latest_block()?;
        Ok(Block::new(
            self.blocks.len() as u64,
            now_millis(),
            transactions,
            latest.hash.clone(),
            self.kind.clone(),
        ))
    }

    /// Appends a block that was sealed outside this chain.
    ///
    /// The block must sit at the next index, link to the current tip,
    /// carry a consistent hash and meet the difficulty. Anything else means
    /// the caller did not hold the chain exclusively between
    /// [`Chain::next_block`] and this call.
    pub fn push_sealed(&mut self, block: Block) -> Result<&Block, LedgerError> {
        let latest = self.latest_block()?;
        let expected_index = self.blocks.len() as u64;

        if block.index != expected_index {
            return Err(LedgerError::InvariantViolation(format!(
                "{} block has index {}, expected {expected_index}",
                self.kind, block.index
            )));
        }
        if block.prev_hash != latest.hash {
            return Err(LedgerError::InvariantViolation(format!(
                "{} block {} does not link to the current tip",
                self.kind, block.index
            )));
        }
        if !block.hash_is_consistent() || !block.hash.meets_difficulty(self.difficulty) {
            return Err(LedgerError::InvariantViolation(format!(
                "{} block {} is not sealed at difficulty {}",
                self.kind, block.index, self.difficulty
            )));
        }

        self.blocks.push(block);
        self.latest_block()
    }

    /// Appends a block carrying `transactions`, mining it on the calling
    /// thread, and returns a copy of it.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> Result<Block, LedgerError> {
        let mut block = self.next_block(transactions)?;
        block.mine(self.difficulty);
        self.push_sealed(block).cloned()
    }

    /// Checks every block (content hash, link, proof of work) and returns
    /// the first failure.
    ///
    /// Genesis is checked too: its prevHash must be the sentinel and its
    /// stored hash must recompute, so editing the genesis block is caught
    /// even on a single-block chain.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_blocks(&self.blocks, self.difficulty, &StandardRules::standard())
    }

    /// `true` when [`Chain::validate`] finds nothing.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = %self.kind, block = e.block_index(), "{e}");
                false
            }
        }
    }

    /// Like [`Chain::validate`] but keeps scanning, reporting one failure
    /// per bad block.
    pub fn audit(&self) -> Vec<ValidationError> {
        audit_blocks(&self.blocks, self.difficulty, &StandardRules::standard())
    }

    /// Owned, order-preserving copy of all blocks.
    pub fn snapshot(&self) -> Vec<BlockSnapshot> {
        self.blocks.iter().map(Block::snapshot).collect()
    }

    /// The parent hash anchored in this chain's genesis for a parent of
    /// kind `parent_kind`, if the genesis carries one.
    ///
    /// The anchor is a one-time snapshot of the parent's tip at creation;
    /// the parent may have grown since.
    pub fn anchor(&self, parent_kind: &EntityKind) -> Option<HashHex> {
        let genesis = self.blocks.first()?;
        let field = parent_kind.anchor_field();
        genesis
            .transactions
            .first()?
            .get(&field)?
            .as_str()
            .map(HashHex::from)
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}
