//! Batch validation of a department and its dependent chains.

use serde::{Deserialize, Serialize};

use crate::ledger::ValidationError;
use crate::types::{ChainKey, EntityId, EntityKind};

use super::ChainRegistry;

/// Identifier plus display name of an entity whose chain should be checked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassValidity {
    pub class_id: EntityId,
    pub valid: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentValidity {
    pub student_id: EntityId,
    pub valid: bool,
}

/// Result of [`ChainRegistry::validate_many`].
///
/// A missing chain counts as invalid. `errors` holds one human-readable
/// line per failing chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub department_valid: bool,
    pub classes_valid: Vec<ClassValidity>,
    pub students_valid: Vec<StudentValidity>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn all_valid(&self) -> bool {
        self.department_valid
            && self.classes_valid.iter().all(|c| c.valid)
            && self.students_valid.iter().all(|s| s.valid)
    }
}

enum ChainCheck {
    Valid,
    Missing,
    Invalid(ValidationError),
}

impl ChainCheck {
    fn is_valid(&self) -> bool {
        matches!(self, ChainCheck::Valid)
    }

    fn describe(&self, subject: &str) -> Option<String> {
        match self {
            ChainCheck::Valid => None,
            ChainCheck::Missing => Some(format!("{subject} chain not found")),
            ChainCheck::Invalid(e) => Some(format!("{subject} chain is invalid: {e}")),
        }
    }
}

impl ChainRegistry {
    async fn check(&self, key: ChainKey) -> ChainCheck {
        match self.get(&key).await {
            None => ChainCheck::Missing,
            Some(chain) => match chain.validate().await {
                Ok(()) => ChainCheck::Valid,
                Err(e) => ChainCheck::Invalid(e),
            },
        }
    }

    /// Validates the department chain and every listed class and student
    /// chain. Read-only: nothing is repaired or mutated.
    pub async fn validate_many(
        &self,
        department_id: &EntityId,
        classes: &[EntityRef],
        students: &[EntityRef],
    ) -> ValidationReport {
        let mut report = ValidationReport::default();

        let dept = self
            .check(ChainKey::new(EntityKind::Department, department_id.clone()))
            .await;
        report.department_valid = dept.is_valid();
        report
            .errors
            .extend(dept.describe(&format!("Department {department_id}")));

        for class in classes {
            let check = self
                .check(ChainKey::new(EntityKind::Class, class.id.clone()))
                .await;
            report.classes_valid.push(ClassValidity {
                class_id: class.id.clone(),
                valid: check.is_valid(),
            });
            report
                .errors
                .extend(check.describe(&format!("Class {}", class.name)));
        }

        for student in students {
            let check = self
                .check(ChainKey::new(EntityKind::Student, student.id.clone()))
                .await;
            report.students_valid.push(StudentValidity {
                student_id: student.id.clone(),
                valid: check.is_valid(),
            });
            report
                .errors
                .extend(check.describe(&format!("Student {}", student.name)));
        }

        report
    }
}
