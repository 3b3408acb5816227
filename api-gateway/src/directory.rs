//! In-memory entity records.
//!
//! The directory holds the mutable view of departments, classes, students
//! and attendance entries. Every record carries a `blockchainData` copy of
//! its chain, refreshed on each mutation and on read. The chain registry
//! stays the source of truth; these copies are a cache.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bams_chain::{BlockSnapshot, EntityId};

pub const DEFAULT_CLASS_CAPACITY: u32 = 35;
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DELETED: &str = "deleted";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub code: String,
    pub status: String,
    pub blockchain_data: Vec<BlockSnapshot>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub code: String,
    pub department_id: EntityId,
    pub capacity: u32,
    pub status: String,
    pub blockchain_data: Vec<BlockSnapshot>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub roll_number: String,
    pub department_id: EntityId,
    pub class_id: EntityId,
    pub status: String,
    pub blockchain_data: Vec<BlockSnapshot>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Leave" => Ok(AttendanceStatus::Leave),
            other => Err(format!("invalid attendance status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub student_id: EntityId,
    pub class_id: EntityId,
    pub department_id: EntityId,
    pub status: AttendanceStatus,
    pub date: u64,
    pub blockchain_data: Vec<BlockSnapshot>,
    pub created_at: u64,
}

/// All entity records known to the gateway. Lost on restart.
#[derive(Debug, Default)]
pub struct Directory {
    pub departments: Vec<Department>,
    pub classes: Vec<Class>,
    pub students: Vec<Student>,
    pub attendance: Vec<Attendance>,
    issued: u64,
    /// Unique keys held by creates and renames whose block is still being mined.
    claimed: HashSet<String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh 24-hex-character record id.
    ///
    /// The first 8 characters are the creation time in seconds, the rest
    /// a digest of a per-directory counter and the sub-second clock.
    pub fn next_id(&mut self) -> EntityId {
        self.issued += 1;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(self.issued.to_be_bytes());
        hasher.update(now.subsec_nanos().to_be_bytes());
        let digest = hasher.finalize();

        EntityId(format!(
            "{:08x}{}",
            now.as_secs() as u32,
            hex::encode(&digest[..8])
        ))
    }

    pub fn department(&self, id: &EntityId) -> Option<&Department> {
        self.departments.iter().find(|d| &d.id == id)
    }

    pub fn department_mut(&mut self, id: &EntityId) -> Option<&mut Department> {
        self.departments.iter_mut().find(|d| &d.id == id)
    }

    pub fn department_named(&self, name: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.name == name)
    }

    /// Claims `name` for a department create or rename in flight.
    ///
    /// `false` if a department already has the name or another request
    /// holds the claim. Release with [`Directory::release_department_name`]
    /// once the record is written or the request fails.
    pub fn claim_department_name(&mut self, name: &str) -> bool {
        self.department_named(name).is_none() && self.claimed.insert(department_key(name))
    }

    pub fn release_department_name(&mut self, name: &str) {
        self.claimed.remove(&department_key(name));
    }

    pub fn class(&self, id: &EntityId) -> Option<&Class> {
        self.classes.iter().find(|c| &c.id == id)
    }

    pub fn class_mut(&mut self, id: &EntityId) -> Option<&mut Class> {
        self.classes.iter_mut().find(|c| &c.id == id)
    }

    pub fn classes_in(&self, department_id: &EntityId) -> Vec<Class> {
        self.classes
            .iter()
            .filter(|c| &c.department_id == department_id)
            .cloned()
            .collect()
    }

    pub fn student(&self, id: &EntityId) -> Option<&Student> {
        self.students.iter().find(|s| &s.id == id)
    }

    pub fn student_mut(&mut self, id: &EntityId) -> Option<&mut Student> {
        self.students.iter_mut().find(|s| &s.id == id)
    }

    pub fn student_with_roll(&self, roll_number: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.roll_number == roll_number)
    }

    /// Same as [`Directory::claim_department_name`], for roll numbers.
    pub fn claim_roll_number(&mut self, roll_number: &str) -> bool {
        self.student_with_roll(roll_number).is_none() && self.claimed.insert(roll_key(roll_number))
    }

    pub fn release_roll_number(&mut self, roll_number: &str) {
        self.claimed.remove(&roll_key(roll_number));
    }

    pub fn students_in_class(&self, class_id: &EntityId) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| &s.class_id == class_id)
            .cloned()
            .collect()
    }

    pub fn students_in_department(&self, department_id: &EntityId) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| &s.department_id == department_id)
            .cloned()
            .collect()
    }

    /// Attendance entries for a student, newest first.
    pub fn attendance_for(&self, student_id: &EntityId) -> Vec<Attendance> {
        let mut entries: Vec<Attendance> = self
            .attendance
            .iter()
            .filter(|a| &a.student_id == student_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    /// Attendance entries of a class dated within `[from, until)` milliseconds.
    pub fn attendance_in_class(&self, class_id: &EntityId, from: u64, until: u64) -> Vec<Attendance> {
        self.attendance
            .iter()
            .filter(|a| &a.class_id == class_id && (from..until).contains(&a.date))
            .cloned()
            .collect()
    }

    pub fn attendance_in_department(&self, department_id: &EntityId) -> Vec<Attendance> {
        self.attendance
            .iter()
            .filter(|a| &a.department_id == department_id)
            .cloned()
            .collect()
    }
}

fn department_key(name: &str) -> String {
    format!("department:{name}")
}

fn roll_key(roll_number: &str) -> String {
    format!("roll:{roll_number}")
}
