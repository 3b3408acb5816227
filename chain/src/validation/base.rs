//! The three per-block checks every chain must pass.

use crate::ledger::error::ValidationError;
use crate::types::HashHex;

use super::rule::{BlockContext, BlockRule};

/// Recomputes the block hash and compares it with the stored one.
///
/// Any edit to a sealed block's index, timestamp, transactions, prevHash
/// or nonce without rehashing shows up here.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentHashRule;

impl BlockRule for ContentHashRule {
    fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
        let recomputed = ctx.block.compute_hash();
        if recomputed != ctx.block.hash {
            return Err(ValidationError::TamperedContent {
                index: ctx.block.index,
                stored: ctx.block.hash.clone(),
                recomputed,
            });
        }
        Ok(())
    }
}

/// Checks the prevHash link against the previous block's *stored* hash
/// and that indices count up by one.
///
/// Genesis must sit at index 0 and carry the `"0"` sentinel instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkRule;

impl BlockRule for LinkRule {
    fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
        match ctx.previous {
            None => {
                if ctx.block.index != 0 {
                    return Err(ValidationError::IndexMismatch {
                        expected: 0,
                        found: ctx.block.index,
                    });
                }
                if ctx.block.prev_hash != HashHex::genesis_sentinel() {
                    return Err(ValidationError::BadGenesis {
                        found: ctx.block.prev_hash.clone(),
                    });
                }
            }
            Some(prev) => {
                // A predecessor at u64::MAX has no valid successor index.
                let expected = prev.index.checked_add(1);
                if expected != Some(ctx.block.index) {
                    return Err(ValidationError::IndexMismatch {
                        expected: expected.unwrap_or(u64::MAX),
                        found: ctx.block.index,
                    });
                }
                if ctx.block.prev_hash != prev.hash {
                    return Err(ValidationError::BrokenLink {
                        index: ctx.block.index,
                        expected: prev.hash.clone(),
                        found: ctx.block.prev_hash.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Requires `difficulty` leading `'0'` characters in the stored hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProofOfWorkRule;

impl BlockRule for ProofOfWorkRule {
    fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
        if !ctx.block.hash.meets_difficulty(ctx.difficulty) {
            return Err(ValidationError::InsufficientWork {
                index: ctx.block.index,
                difficulty: ctx.difficulty,
                hash: ctx.block.hash.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, EntityKind, Transaction};

    fn mined(index: u64, prev: HashHex, difficulty: u32) -> Block {
        let mut block = Block::new(
            index,
            1_700_000_000_000 + index,
            vec![Transaction::new("attendance").with("status", "Present")],
            prev,
            EntityKind::Student,
        );
        block.mine(difficulty);
        block
    }

    fn ctx<'a>(block: &'a Block, previous: Option<&'a Block>, difficulty: u32) -> BlockContext<'a> {
        BlockContext {
            block,
            previous,
            difficulty,
        }
    }

    #[test]
    fn content_rule_detects_field_edit() {
        let mut block = mined(1, "abc".into(), 1);
        assert!(ContentHashRule.check(&ctx(&block, None, 1)).is_ok());

        block.timestamp += 1;
        let err = ContentHashRule.check(&ctx(&block, None, 1)).unwrap_err();
        assert!(matches!(err, ValidationError::TamperedContent { index: 1, .. }));
    }

    #[test]
    fn link_rule_requires_sentinel_on_genesis() {
        let genesis = mined(0, HashHex::genesis_sentinel(), 1);
        assert!(LinkRule.check(&ctx(&genesis, None, 1)).is_ok());

        let orphan = mined(0, "ff".into(), 1);
        let err = LinkRule.check(&ctx(&orphan, None, 1)).unwrap_err();
        assert_eq!(err, ValidationError::BadGenesis { found: "ff".into() });
    }

    #[test]
    fn link_rule_compares_against_previous_stored_hash() {
        let genesis = mined(0, HashHex::genesis_sentinel(), 1);
        let next = mined(1, genesis.hash.clone(), 1);
        assert!(LinkRule.check(&ctx(&next, Some(&genesis), 1)).is_ok());

        let stray = mined(1, "0abc".into(), 1);
        let err = LinkRule.check(&ctx(&stray, Some(&genesis), 1)).unwrap_err();
        assert!(matches!(err, ValidationError::BrokenLink { index: 1, .. }));
    }

    #[test]
    fn link_rule_requires_consecutive_indices() {
        let genesis = mined(0, HashHex::genesis_sentinel(), 1);
        let skipped = mined(2, genesis.hash.clone(), 1);
        let err = LinkRule.check(&ctx(&skipped, Some(&genesis), 1)).unwrap_err();
        assert_eq!(err, ValidationError::IndexMismatch { expected: 1, found: 2 });
        assert_eq!(err.block_index(), 1);

        let late_genesis = mined(3, HashHex::genesis_sentinel(), 1);
        assert!(matches!(
            LinkRule.check(&ctx(&late_genesis, None, 1)),
            Err(ValidationError::IndexMismatch { expected: 0, found: 3 })
        ));
    }

    #[test]
    fn link_rule_reports_index_overflow() {
        let mut last = mined(1, "abc".into(), 1);
        last.index = u64::MAX;
        let next = mined(5, last.hash.clone(), 1);
        assert_eq!(
            LinkRule.check(&ctx(&next, Some(&last), 1)),
            Err(ValidationError::IndexMismatch {
                expected: u64::MAX,
                found: 5,
            })
        );
    }

    #[test]
    fn pow_rule_is_a_real_condition() {
        let block = mined(1, "abc".into(), 1);
        assert!(ProofOfWorkRule.check(&ctx(&block, None, 1)).is_ok());

        // Hashes to 946049ba..., no leading zero at all.
        let unmined = Block::new(1, 5, vec![], "abc".into(), EntityKind::Class);
        assert!(ProofOfWorkRule.check(&ctx(&unmined, None, 0)).is_ok());
        let err = ProofOfWorkRule.check(&ctx(&unmined, None, 1)).unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientWork { difficulty: 1, .. }));
    }
}
