//! Block validity rules for the ledger.
//!
//! A chain is valid when every block passes, in order:
//!
//! - [`base::ContentHashRule`]: the stored hash recomputes from the fields,
//! - [`base::LinkRule`]: the index follows the previous block's and
//!   prevHash points at it (genesis: index 0 and the `"0"` sentinel),
//! - [`base::ProofOfWorkRule`]: the hash meets the chain's difficulty.
//!
//! Rules plug together through the [`rule::BlockRule`] trait; the
//! [`rule::validate_blocks`] walker stops at the first failure and
//! [`rule::audit_blocks`] collects one failure per bad block.

pub mod base;
pub mod rule;

pub use base::{ContentHashRule, LinkRule, ProofOfWorkRule};
pub use rule::{BlockContext, BlockRule, CombinedRule, StandardRules, audit_blocks, validate_blocks};
