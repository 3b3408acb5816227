//! Cross-chain anchoring.
//!
//! When a child entity's chain is created, its genesis transaction records
//! the hash of the parent chain's latest block at that instant (a class
//! records `prevDepartmentHash`, a student records `prevClassHash`). The
//! anchor is parent-hash-at-creation metadata, not a live reference: the
//! parent keeps growing, and nothing here ever compares the anchor with the
//! parent's *current* tip. [`ChainRegistry::trace_anchor`] only asks where
//! in the parent's history the anchored block sits.

use crate::ledger::LedgerError;
use crate::types::{ChainKey, EntityId, EntityKind, HashHex, Transaction};

use super::{ChainHandle, ChainRegistry};

/// Where a child's anchor points in its parent's history.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnchorTrace {
    /// Parent hash recorded in the child's genesis.
    pub anchored_hash: HashHex,
    /// Index of the parent block carrying that hash, `None` if the parent's
    /// history holds no such block.
    pub parent_index: Option<u64>,
    /// Parent chain length at the time of the trace.
    pub parent_len: usize,
}

impl AnchorTrace {
    pub fn is_in_parent_history(&self) -> bool {
        self.parent_index.is_some()
    }

    /// Parent blocks appended after the anchored one.
    pub fn blocks_since_anchor(&self) -> Option<u64> {
        self.parent_index
            .map(|idx| (self.parent_len as u64).saturating_sub(idx + 1))
    }
}

impl ChainRegistry {
    /// Creates (or returns) the chain for `(kind, id)`, anchoring its
    /// genesis to the latest block of the `parent` chain.
    ///
    /// The parent hash is written into `genesis` under
    /// `parent.kind.anchor_field()`. A missing parent chain is
    /// [`LedgerError::NotFound`]. If the child chain already exists it is
    /// returned unchanged, with its original anchor.
    pub async fn create_anchored(
        &self,
        kind: EntityKind,
        id: impl Into<EntityId>,
        parent: &ChainKey,
        mut genesis: Transaction,
    ) -> Result<ChainHandle, LedgerError> {
        let parent_chain = self
            .get(parent)
            .await
            .ok_or_else(|| LedgerError::NotFound(parent.clone()))?;
        let parent_hash = parent_chain.latest_hash().await?;

        genesis.insert(&parent.kind.anchor_field(), parent_hash.as_str());
        tracing::debug!(parent = %parent, anchor = %parent_hash, "anchoring new chain");

        self.get_or_create(kind, id, genesis).await
    }

    /// Locates the block of `parent` that `child`'s genesis is anchored to.
    ///
    /// Returns `Ok(None)` when the child's genesis carries no anchor for a
    /// parent of that kind.
    pub async fn trace_anchor(
        &self,
        child: &ChainKey,
        parent: &ChainKey,
    ) -> Result<Option<AnchorTrace>, LedgerError> {
        let child_chain = self
            .get(child)
            .await
            .ok_or_else(|| LedgerError::NotFound(child.clone()))?;
        let parent_chain = self
            .get(parent)
            .await
            .ok_or_else(|| LedgerError::NotFound(parent.clone()))?;

        let Some(anchored_hash) = child_chain.read(|c| c.anchor(&parent.kind)).await else {
            return Ok(None);
        };

        let (parent_index, parent_len) = parent_chain
            .read(|c| {
                let index = c
                    .blocks()
                    .iter()
                    .find(|b| b.hash == anchored_hash)
                    .map(|b| b.index);
                (index, c.len())
            })
            .await;

        Ok(Some(AnchorTrace {
            anchored_hash,
            parent_index,
            parent_len,
        }))
    }
}
