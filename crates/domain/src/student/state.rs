//! Student status.

use serde::{Deserialize, Serialize};

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StudentStatus {
    #[default]
    Active,
    Probation,
    Suspended,
    Graduated,
    Withdrawn,
    LeaveOfAbsence,
}

impl StudentStatus {
    /// Grades are only recorded for active or probationary students.
    pub fn can_receive_grades(&self) -> bool {
        matches!(self, StudentStatus::Active | StudentStatus::Probation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "Active",
            StudentStatus::Probation => "Probation",
            StudentStatus::Suspended => "Suspended",
            StudentStatus::Graduated => "Graduated",
            StudentStatus::Withdrawn => "Withdrawn",
            StudentStatus::LeaveOfAbsence => "LeaveOfAbsence",
        }
    }
}

impl std::fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
