// chain/src/types/tx.rs

//! Transaction records carried by blocks.
//!
//! The ledger treats transactions as opaque structured records: it hashes
//! them, counts them, and hands them back in snapshots, but never branches
//! on their contents. By convention every record is a JSON object with a
//! `type` discriminator string plus type-specific fields; the constants
//! below name the discriminators the attendance gateway writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEPARTMENT_CREATION: &str = "department_creation";
pub const DEPARTMENT_UPDATE: &str = "department_update";
pub const DEPARTMENT_DELETION: &str = "department_deletion";
pub const CLASS_CREATION: &str = "class_creation";
pub const CLASS_UPDATE: &str = "class_update";
pub const CLASS_DELETION: &str = "class_deletion";
pub const STUDENT_CREATION: &str = "student_creation";
pub const STUDENT_UPDATE: &str = "student_update";
pub const STUDENT_DELETION: &str = "student_deletion";
pub const ATTENDANCE: &str = "attendance";

/// A single transaction record.
///
/// Serialized transparently as the wrapped JSON value, so a block's
/// `transactions` field is a plain JSON array of records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(pub Value);

impl Transaction {
    /// Starts a record with the given `type` discriminator.
    pub fn new(tx_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::String(tx_type.to_string()));
        Transaction(Value::Object(fields))
    }

    /// Adds (or replaces) a field. Non-object records are left untouched.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// In-place variant of [`Transaction::with`].
    ///
    /// Returns `false` when the record is not a JSON object.
    pub fn insert(&mut self, field: &str, value: impl Into<Value>) -> bool {
        match &mut self.0 {
            Value::Object(fields) => {
                fields.insert(field.to_string(), value.into());
                true
            }
            _ => false,
        }
    }

    /// The `type` discriminator, if present and a string.
    pub fn tx_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Transaction {
    fn from(value: Value) -> Self {
        Transaction(value)
    }
}
