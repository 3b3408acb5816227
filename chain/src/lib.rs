//! Hash-chain ledger library crate.
//!
//! This crate keeps one append-only, proof-of-work hash chain per
//! academic entity (department, class, student) and ties the chains
//! together with cross-chain anchors:
//!
//! - strongly-typed domain types: blocks, transactions, keys (`types`),
//! - the chain itself and its error types (`ledger`),
//! - block validity rules (`validation`),
//! - off-executor proof-of-work search (`mining`),
//! - the shared chain directory, anchoring and batch reports (`registry`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level configuration (`config`).

pub mod config;
pub mod ledger;
pub mod metrics;
pub mod mining;
pub mod registry;
pub mod types;
pub mod validation;

pub use config::{LedgerConfig, MetricsConfig};

pub use ledger::{
    Chain, ChainPolicy, DEFAULT_DIFFICULTY, DIFFICULTY_RANGE, LedgerError, MiningError,
    ValidationError,
};

pub use metrics::{LedgerMetrics, MetricsRegistry};
pub use mining::{MiningBudget, MiningConfig, MiningPool, Sealed};

pub use registry::{
    AnchorTrace, AppendGuard, ChainHandle, ChainRegistry, ClassValidity, EntityRef, StudentValidity,
    ValidationReport,
};

pub use validation::{BlockContext, BlockRule, CombinedRule, StandardRules};

// Domain types at the crate root for convenience.
pub use types::*;
