use std::ops::RangeInclusive;

use crate::types::HASH_HEX_LEN;

/// Default proof-of-work difficulty (leading zero hex characters).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Difficulties a chain may be configured with. Zero would switch proof of
/// work off; anything longer than the hash can never be met.
pub const DIFFICULTY_RANGE: RangeInclusive<u32> = 1..=HASH_HEX_LEN as u32;

/// Chain-wide policy applied to every chain a registry creates.
#[derive(Clone, Debug)]
pub struct ChainPolicy {
    /// Number of leading `'0'` hex characters a block hash must carry.
    pub difficulty: u32,
}

impl ChainPolicy {
    /// Policy with the given difficulty, `None` outside [`DIFFICULTY_RANGE`].
    pub fn with_difficulty(difficulty: u32) -> Option<Self> {
        DIFFICULTY_RANGE
            .contains(&difficulty)
            .then_some(Self { difficulty })
    }
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}
