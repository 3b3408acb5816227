// chain/src/types/block.rs

//! Block types, hashing and proof-of-work sealing.
//!
//! A block's hash is SHA-256 over a pinned canonical encoding: compact JSON
//! of the object
//!
//! ```text
//! {"index":<u64>,"timestamp":<u64 ms>,"transactions":[...],"prevHash":"<hex>","nonce":<u64>}
//! ```
//!
//! with fields in exactly that order, transaction objects encoded with
//! their keys in lexicographic order (serde_json's default map), and no
//! whitespace. Any two implementations that follow this contract produce
//! identical hashes for identical field values, which is what lets a
//! persisted snapshot be re-validated later.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{EntityKind, HASH_HEX_LEN, HashHex, Transaction};
use crate::mining::MiningBudget;
use crate::ledger::error::MiningError;

/// Borrowed view of the five hashed fields, in canonical order.
#[derive(Serialize)]
struct HashInput<'a> {
    index: u64,
    timestamp: u64,
    transactions: &'a [Transaction],
    #[serde(rename = "prevHash")]
    prev_hash: &'a str,
    nonce: u64,
}

/// How many nonces are tried between checks of the cancellation flag.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// A block in one entity's chain.
///
/// Blocks are created and sealed inside the chain's append path and never
/// mutated afterwards. Fields stay public so that forensic tooling can
/// inspect (and tests can tamper with) stored blocks; [`Block::compute_hash`]
/// is what detects such edits.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Position in the chain, 0 for genesis.
    pub index: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Ordered transaction records. Order is part of the hash.
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block, or `"0"` for genesis.
    pub prev_hash: HashHex,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Stored hash over the fields above.
    pub hash: HashHex,
    /// Kind of the chain this block was built for. Not hashed.
    pub kind: EntityKind,
}

impl Block {
    /// Builds an unsealed block with `nonce = 0` and its pre-mining hash.
    ///
    /// Inputs are not validated here; transaction shape is the caller's
    /// concern.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        prev_hash: HashHex,
        kind: EntityKind,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            prev_hash,
            nonce: 0,
            hash: HashHex::default(),
            kind,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Returns the canonical byte encoding hashed by [`Block::compute_hash`].
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error:
    /// every field is plain JSON data with string map keys.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let input = HashInput {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            prev_hash: self.prev_hash.as_str(),
            nonce: self.nonce,
        };
        serde_json::to_vec(&input).expect("block hash input should always encode as JSON")
    }

    /// Computes the lowercase hex SHA-256 digest of the canonical encoding.
    pub fn compute_hash(&self) -> HashHex {
        HashHex(hex::encode(Sha256::digest(self.canonical_bytes())))
    }

    /// Returns `true` if the stored hash matches the current field values.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Unbounded proof-of-work search.
    ///
    /// Increments `nonce` and rehashes until the hash has `difficulty`
    /// leading `'0'` characters. Expected work is about `16^difficulty`
    /// hashes; this blocks the calling thread for that long.
    ///
    /// `difficulty` must not exceed [`HASH_HEX_LEN`]; such a target is
    /// unreachable and leaves the block unsealed.
    pub fn mine(&mut self, difficulty: u32) {
        match self.mine_with(difficulty, &MiningBudget::unlimited()) {
            Ok(_) => {}
            Err(e) => {
                tracing::error!(kind = %self.kind, index = self.index, difficulty, "{e}");
                debug_assert!(false, "unbounded search stopped: {e}");
            }
        }
    }

    /// Proof-of-work search under a [`MiningBudget`].
    ///
    /// Returns the number of nonces tried past the initial one. On failure
    /// the block is left unsealed with whatever nonce it reached. A
    /// difficulty longer than the hash itself can never be met and fails
    /// with [`MiningError::Exhausted`] before any attempt.
    pub fn mine_with(&mut self, difficulty: u32, budget: &MiningBudget) -> Result<u64, MiningError> {
        if difficulty as usize > HASH_HEX_LEN {
            return Err(MiningError::Exhausted { attempts: 0 });
        }
        let mut attempts: u64 = 0;

        while !self.hash.meets_difficulty(difficulty) {
            if let Some(max) = budget.max_attempts {
                if attempts >= max {
                    return Err(MiningError::Exhausted { attempts });
                }
            }
            if attempts % CANCEL_CHECK_INTERVAL == 0 && budget.is_cancelled() {
                return Err(MiningError::Cancelled);
            }

            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
            attempts += 1;
        }

        tracing::debug!(
            kind = %self.kind,
            index = self.index,
            nonce = self.nonce,
            hash = %self.hash,
            "block mined"
        );
        Ok(attempts)
    }

    /// Read-only projection of this block for persistence or display.
    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions.clone(),
            prev_hash: self.prev_hash.clone(),
            hash: self.hash.clone(),
            nonce: self.nonce,
        }
    }

    /// Rebuilds a block from a persisted snapshot, keeping the stored hash
    /// as-is so that validation can detect edits made to the snapshot.
    pub fn from_snapshot(snapshot: BlockSnapshot, kind: EntityKind) -> Self {
        Self {
            index: snapshot.index,
            timestamp: snapshot.timestamp,
            transactions: snapshot.transactions,
            prev_hash: snapshot.prev_hash,
            nonce: snapshot.nonce,
            hash: snapshot.hash,
            kind,
        }
    }
}

/// Owned copy of a block's fields, in the shape the collaborator persists
/// next to each entity record (`blockchainData`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: HashHex,
    pub hash: HashHex,
    pub nonce: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch yields 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tx::DEPARTMENT_CREATION;

    fn genesis_tx() -> Transaction {
        Transaction::new(DEPARTMENT_CREATION)
            .with("name", "Computer Science")
            .with("code", "CS")
    }

    fn fixed_genesis() -> Block {
        Block::new(
            0,
            1_700_000_000_000,
            vec![genesis_tx()],
            HashHex::genesis_sentinel(),
            EntityKind::Department,
        )
    }

    #[test]
    fn canonical_encoding_is_pinned() {
        let block = fixed_genesis();
        let encoded = String::from_utf8(block.canonical_bytes()).unwrap();
        assert_eq!(
            encoded,
            r#"{"index":0,"timestamp":1700000000000,"transactions":[{"code":"CS","name":"Computer Science","type":"department_creation"}],"prevHash":"0","nonce":0}"#
        );
    }

    #[test]
    fn golden_hash_matches_reference_digest() {
        let block = fixed_genesis();
        assert_eq!(
            block.hash.as_str(),
            "5e13d281784ed2b0e018833d2b5cc966683b5de1d5aeedd72aabeda8cfcb8727"
        );
    }

    #[test]
    fn golden_mining_result_at_difficulty_two() {
        let mut block = fixed_genesis();
        let attempts = block.mine_with(2, &MiningBudget::unlimited()).unwrap();

        assert_eq!(block.nonce, 161);
        assert_eq!(attempts, 161);
        assert_eq!(
            block.hash.as_str(),
            "00dad802ef7614ca9eb4fad1b73554076a5f0cddb572da5a8e19056aeb2e5fe2"
        );
    }

    #[test]
    fn block_hash_is_deterministic() {
        let block = fixed_genesis();
        let h1 = block.compute_hash();
        let h2 = block.compute_hash();
        assert_eq!(h1, h2);
        assert_eq!(h1.as_str().len(), 64);
    }

    #[test]
    fn transaction_order_is_part_of_the_hash() {
        let a = Transaction::new("a");
        let b = Transaction::new("b");
        let ab = Block::new(1, 1, vec![a.clone(), b.clone()], "x".into(), EntityKind::Class);
        let ba = Block::new(1, 1, vec![b, a], "x".into(), EntityKind::Class);
        assert_ne!(ab.hash, ba.hash);
    }

    #[test]
    fn kind_is_not_part_of_the_hash() {
        let dept = fixed_genesis();
        let mut other = dept.clone();
        other.kind = EntityKind::Student;
        assert_eq!(dept.compute_hash(), other.compute_hash());
    }

    #[test]
    fn mining_meets_difficulty_for_small_targets() {
        for difficulty in 1..=4 {
            let mut block = fixed_genesis();
            block.mine(difficulty);
            assert!(block.hash.meets_difficulty(difficulty));
            assert!(block.hash_is_consistent());
        }
    }

    #[test]
    fn lower_difficulty_never_needs_more_attempts() {
        let attempts: Vec<u64> = (1..=4)
            .map(|difficulty| {
                let mut block = fixed_genesis();
                block.mine_with(difficulty, &MiningBudget::unlimited()).unwrap()
            })
            .collect();
        assert!(attempts.windows(2).all(|w| w[0] <= w[1]), "{attempts:?}");
        assert_eq!(attempts[1], 161);
    }

    #[test]
    fn unreachable_difficulty_is_exhausted_immediately() {
        let mut block = fixed_genesis();
        let before = block.clone();
        let err = block
            .mine_with(HASH_HEX_LEN as u32 + 1, &MiningBudget::unlimited())
            .unwrap_err();
        assert_eq!(err, MiningError::Exhausted { attempts: 0 });
        assert_eq!(block, before);
    }

    #[test]
    fn full_length_difficulty_is_still_searched() {
        // 64 zeros is reachable in principle, so the search starts and the
        // attempt cap stops it.
        let mut block = fixed_genesis();
        let budget = MiningBudget::unlimited().with_max_attempts(3);
        assert_eq!(
            block.mine_with(HASH_HEX_LEN as u32, &budget),
            Err(MiningError::Exhausted { attempts: 3 })
        );
    }

    #[test]
    fn bounded_mining_reports_exhaustion() {
        let mut block = fixed_genesis();
        // Nonce 161 is the first hit at difficulty 2, so 10 attempts cannot
        // be enough.
        let budget = MiningBudget::unlimited().with_max_attempts(10);
        let err = block.mine_with(2, &budget).unwrap_err();
        assert_eq!(err, MiningError::Exhausted { attempts: 10 });
        assert!(!block.hash.meets_difficulty(2));
    }

    #[test]
    fn cancelled_budget_stops_search() {
        let mut block = fixed_genesis();
        let budget = MiningBudget::unlimited();
        budget.cancel();
        assert_eq!(block.mine_with(2, &budget), Err(MiningError::Cancelled));
    }

    #[test]
    fn snapshot_roundtrip_preserves_stored_hash() {
        let mut block = fixed_genesis();
        block.mine(1);
        let snap = block.snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("prevHash").is_some());

        let restored = Block::from_snapshot(snap, EntityKind::Department);
        assert_eq!(restored, block);
    }
}
