//! Reassignment saga lifecycle.

use serde::{Deserialize, Serialize};

/// Where a reassignment saga stands.
///
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                   ▲      └──► Failed
///                   └──────────────┘ (resume)
/// ```
///
/// `Failed` is not final: a redelivered trigger resumes the saga and retries
/// the courses that are still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl SagaState {
    pub fn can_start(&self) -> bool {
        matches!(self, SagaState::NotStarted)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, SagaState::Running | SagaState::Failed)
    }

    /// Only a completed saga is never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
