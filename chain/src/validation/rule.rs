//! Rule abstraction and chain walkers.

use crate::ledger::error::ValidationError;
use crate::types::Block;

use super::base::{ContentHashRule, LinkRule, ProofOfWorkRule};

/// Everything a rule may look at when judging one block.
#[derive(Clone, Copy, Debug)]
pub struct BlockContext<'a> {
    pub block: &'a Block,
    /// The block before it, `None` for genesis.
    pub previous: Option<&'a Block>,
    pub difficulty: u32,
}

/// Pluggable validity rule for a single block.
///
/// Implementations must be deterministic and side-effect free; validation
/// never repairs or mutates a chain.
pub trait BlockRule {
    fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError>;
}

/// Runs `first` and then `second`, failing fast on the first error.
#[derive(Clone, Copy, Debug, Default)]
pub struct CombinedRule<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> CombinedRule<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> BlockRule for CombinedRule<A, B>
where
    A: BlockRule,
    B: BlockRule,
{
    fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
        self.first.check(ctx)?;
        self.second.check(ctx)?;
        Ok(())
    }
}

/// Content → link → proof-of-work, the order every chain is checked in.
pub type StandardRules = CombinedRule<ContentHashRule, CombinedRule<LinkRule, ProofOfWorkRule>>;

impl StandardRules {
    pub fn standard() -> Self {
        CombinedRule::new(
            ContentHashRule,
            CombinedRule::new(LinkRule, ProofOfWorkRule),
        )
    }
}

fn contexts(blocks: &[Block], difficulty: u32) -> impl Iterator<Item = BlockContext<'_>> {
    blocks.iter().enumerate().map(move |(i, block)| BlockContext {
        block,
        previous: i.checked_sub(1).map(|p| &blocks[p]),
        difficulty,
    })
}

/// Checks every block in order and returns the first failure.
pub fn validate_blocks<R: BlockRule>(
    blocks: &[Block],
    difficulty: u32,
    rules: &R,
) -> Result<(), ValidationError> {
    for ctx in contexts(blocks, difficulty) {
        rules.check(&ctx)?;
    }
    Ok(())
}

/// Checks every block and collects the first failure of each bad block.
pub fn audit_blocks<R: BlockRule>(blocks: &[Block], difficulty: u32, rules: &R) -> Vec<ValidationError> {
    contexts(blocks, difficulty)
        .filter_map(|ctx| rules.check(&ctx).err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, HashHex, Transaction};

    struct RejectIndex(u64);

    impl BlockRule for RejectIndex {
        fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
            if ctx.block.index == self.0 {
                return Err(ValidationError::InsufficientWork {
                    index: self.0,
                    difficulty: ctx.difficulty,
                    hash: ctx.block.hash.clone(),
                });
            }
            Ok(())
        }
    }

    struct AcceptAll;

    impl BlockRule for AcceptAll {
        fn check(&self, _ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    fn blocks(n: u64) -> Vec<Block> {
        (0..n)
            .map(|i| {
                Block::new(
                    i,
                    i,
                    vec![Transaction::new("t")],
                    HashHex::genesis_sentinel(),
                    EntityKind::Class,
                )
            })
            .collect()
    }

    #[test]
    fn combined_rule_fails_fast_on_first_error() {
        let rule = CombinedRule::new(RejectIndex(1), RejectIndex(2));
        let err = validate_blocks(&blocks(4), 0, &rule).unwrap_err();
        assert_eq!(err.block_index(), 1);
    }

    #[test]
    fn audit_collects_one_failure_per_bad_block() {
        let rule = CombinedRule::new(RejectIndex(1), RejectIndex(3));
        let failures = audit_blocks(&blocks(5), 0, &rule);
        let indexes: Vec<u64> = failures.iter().map(ValidationError::block_index).collect();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[test]
    fn context_exposes_previous_block() {
        struct PreviousIsAdjacent;
        impl BlockRule for PreviousIsAdjacent {
            fn check(&self, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
                match ctx.previous {
                    None => assert_eq!(ctx.block.index, 0),
                    Some(prev) => assert_eq!(prev.index + 1, ctx.block.index),
                }
                Ok(())
            }
        }
        assert!(validate_blocks(&blocks(3), 0, &PreviousIsAdjacent).is_ok());
        assert!(validate_blocks(&[], 4, &AcceptAll).is_ok());
    }
}
