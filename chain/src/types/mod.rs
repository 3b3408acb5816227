//! Core domain types used by the ledger.
//!
//! This module defines the identifiers that key a chain in the registry
//! (entity kind + entity id), the hex-encoded block hash, the transaction
//! record wrapper, and the block itself. The goal is to avoid passing bare
//! strings around public APIs and instead use domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Blocks, proof-of-work sealing, and block snapshots.
pub mod block;
/// Opaque transaction records carried inside blocks.
pub mod tx;

pub use block::{Block, BlockSnapshot};
pub use tx::Transaction;

/// `prevHash` sentinel stored in every genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// Length of a [`HashHex`]: 32 digest bytes, two hex characters each.
pub const HASH_HEX_LEN: usize = 64;

/// Lowercase hex encoding of a SHA-256 digest (64 characters).
///
/// The ledger keeps hashes in their textual form because both the
/// proof-of-work target ("N leading zero characters") and the persisted
/// snapshots are defined over the hex string, not the raw bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashHex(pub String);

impl HashHex {
    /// Returns the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the first `difficulty` characters are all `'0'`.
    ///
    /// A hash shorter than `difficulty` never meets the target.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        self.0.len() >= difficulty && self.0.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// The genesis `prevHash` sentinel.
    pub fn genesis_sentinel() -> Self {
        HashHex(GENESIS_PREV_HASH.to_string())
    }
}

impl fmt::Display for HashHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HashHex {
    fn from(s: &str) -> Self {
        HashHex(s.to_string())
    }
}

/// Kind of organizational entity a chain belongs to.
///
/// The three built-in kinds form the provenance tree
/// department → class → student. [`EntityKind::Other`] keeps the key space
/// open for new entity kinds without touching the registry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Department,
    Class,
    Student,
    Other(String),
}

impl EntityKind {
    /// Lowercase label used in composite keys, logs and reports.
    pub fn label(&self) -> &str {
        match self {
            EntityKind::Department => "department",
            EntityKind::Class => "class",
            EntityKind::Student => "student",
            EntityKind::Other(label) => label,
        }
    }

    /// Name of the genesis field that carries a parent anchor when a chain
    /// of this kind is used as the *parent* of a new chain.
    ///
    /// A class genesis anchored to its department carries
    /// `prevDepartmentHash`; a student genesis anchored to its class
    /// carries `prevClassHash`.
    pub fn anchor_field(&self) -> String {
        match self {
            EntityKind::Department => "prevDepartmentHash".to_string(),
            EntityKind::Class => "prevClassHash".to_string(),
            EntityKind::Student => "prevStudentHash".to_string(),
            EntityKind::Other(label) => {
                let mut chars = label.chars();
                let capitalized: String = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                format!("prev{capitalized}Hash")
            }
        }
    }
}

impl From<String> for EntityKind {
    fn from(label: String) -> Self {
        match label.as_str() {
            "department" => EntityKind::Department,
            "class" => EntityKind::Class,
            "student" => EntityKind::Student,
            _ => EntityKind::Other(label),
        }
    }
}

impl From<&str> for EntityKind {
    fn from(label: &str) -> Self {
        EntityKind::from(label.to_string())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.label().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque entity identifier supplied by the collaborator.
///
/// The ledger never interprets it; it only has to be unique per entity.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

/// Composite registry key: one chain per `(kind, id)`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChainKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl ChainKey {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}
