//! Per-entity hash chains.
//!
//! This module provides the single-writer, append-only [`Chain`] together
//! with its policy ([`config::ChainPolicy`]) and the ledger error types.

pub mod chain;
pub mod config;
pub mod error;

pub use chain::Chain;
pub use config::{ChainPolicy, DEFAULT_DIFFICULTY, DIFFICULTY_RANGE};
pub use error::{LedgerError, MiningError, ValidationError};
