//! Registration status machine.

use serde::{Deserialize, Serialize};

/// The status of a course registration.
///
/// Transitions:
/// ```text
/// Pending ──┬──► Approved ──┬──► Completed
///           │               │
///           ├──► Rejected   └──► Cancelled
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationStatus {
    /// Awaiting a decision.
    #[default]
    Pending,

    Approved,

    /// Terminal.
    Rejected,

    /// Terminal.
    Cancelled,

    /// Terminal.
    Completed,
}

impl RegistrationStatus {
    pub fn can_approve(&self) -> bool {
        matches!(self, RegistrationStatus::Pending)
    }

    pub fn can_reject(&self) -> bool {
        matches!(self, RegistrationStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, RegistrationStatus::Pending | RegistrationStatus::Approved)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, RegistrationStatus::Approved)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Rejected
                | RegistrationStatus::Cancelled
                | RegistrationStatus::Completed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "Pending",
            RegistrationStatus::Approved => "Approved",
            RegistrationStatus::Rejected => "Rejected",
            RegistrationStatus::Cancelled => "Cancelled",
            RegistrationStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the student is taking the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationType {
    #[default]
    Regular,
    /// Taken from another department's catalog.
    Borrowed,
    Retake,
    Audit,
}

impl RegistrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationType::Regular => "Regular",
            RegistrationType::Borrowed => "Borrowed",
            RegistrationType::Retake => "Retake",
            RegistrationType::Audit => "Audit",
        }
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
