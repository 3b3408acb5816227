use std::fmt;
use std::time::Duration;

use crate::types::{ChainKey, HashHex};

/// Reason a chain failed validation.
///
/// Every variant names the offending block so reports can point at it.
/// A validation failure is a *reported condition*: the chain stays in
/// memory and queryable for forensic inspection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// Genesis block does not carry the `"0"` prevHash sentinel.
    BadGenesis { found: HashHex },
    /// Stored hash differs from the hash recomputed from the block fields.
    TamperedContent {
        index: u64,
        stored: HashHex,
        recomputed: HashHex,
    },
    /// Stored prevHash does not equal the previous block's stored hash.
    BrokenLink {
        index: u64,
        expected: HashHex,
        found: HashHex,
    },
    /// Stored hash lacks the required number of leading zero characters.
    InsufficientWork {
        index: u64,
        difficulty: u32,
        hash: HashHex,
    },
    /// Block index does not follow its predecessor's.
    IndexMismatch { expected: u64, found: u64 },
}

impl ValidationError {
    /// Index of the block that failed.
    pub fn block_index(&self) -> u64 {
        match self {
            ValidationError::BadGenesis { .. } => 0,
            ValidationError::TamperedContent { index, .. }
            | ValidationError::BrokenLink { index, .. }
            | ValidationError::InsufficientWork { index, .. } => *index,
            ValidationError::IndexMismatch { expected, .. } => *expected,
        }
    }
}

/// Outcome of a proof-of-work search that did not find a nonce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MiningError {
    /// The bounded-attempts cap was reached.
    Exhausted { attempts: u64 },
    /// The search was cancelled through its budget.
    Cancelled,
    /// The caller stopped waiting after the configured timeout.
    TimedOut(Duration),
}

/// High-level errors returned by chain and registry operations.
#[derive(Debug)]
pub enum LedgerError {
    /// No chain exists for the composite key.
    NotFound(ChainKey),
    /// A construction invariant was broken (e.g. an empty chain). This
    /// indicates a bug, so the operation is aborted rather than recovered.
    InvariantViolation(String),
    /// Proof-of-work search failed under its budget.
    Mining(MiningError),
    /// A block handed to the ledger failed validation.
    Validation(ValidationError),
    /// The mining worker could not be scheduled or panicked.
    Worker(String),
}

impl From<MiningError> for LedgerError {
    fn from(e: MiningError) -> Self {
        LedgerError::Mining(e)
    }
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::Validation(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BadGenesis { found } => {
                write!(f, "genesis block has prevHash {found}, expected \"0\"")
            }
            ValidationError::TamperedContent {
                index,
                stored,
                recomputed,
            } => write!(
                f,
                "block {index} has been tampered with (stored hash {stored}, recomputed {recomputed})"
            ),
            ValidationError::BrokenLink {
                index,
                expected,
                found,
            } => write!(
                f,
                "block {index} has invalid previous hash (expected {expected}, found {found})"
            ),
            ValidationError::InsufficientWork {
                index,
                difficulty,
                hash,
            } => write!(
                f,
                "block {index} has invalid proof of work (hash {hash} needs {difficulty} leading zeros)"
            ),
            ValidationError::IndexMismatch { expected, found } => {
                write!(f, "block at position {expected} carries index {found}")
            }
        }
    }
}

impl fmt::Display for MiningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningError::Exhausted { attempts } => {
                write!(f, "no valid nonce found within {attempts} attempts")
            }
            MiningError::Cancelled => write!(f, "mining cancelled"),
            MiningError::TimedOut(after) => {
                write!(f, "mining timed out after {} ms", after.as_millis())
            }
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NotFound(key) => write!(f, "no chain for {key}"),
            LedgerError::InvariantViolation(msg) => write!(f, "ledger invariant violated: {msg}"),
            LedgerError::Mining(e) => write!(f, "mining failed: {e}"),
            LedgerError::Validation(e) => write!(f, "block rejected: {e}"),
            LedgerError::Worker(msg) => write!(f, "mining worker error: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for MiningError {}
impl std::error::Error for LedgerError {}
