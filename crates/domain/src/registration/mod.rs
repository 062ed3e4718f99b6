//! Course registration aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::CourseRegistration;
pub use commands::*;
pub use events::{
    RegistrationApprovedData, RegistrationClosedData, RegistrationCreatedData,
    RegistrationEvent, RegistrationRejectedData,
};
pub use service::RegistrationService;
pub use state::{RegistrationStatus, RegistrationType};

use thiserror::Error;

/// Business-rule violations on a registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Student is already registered for this course in this semester")]
    AlreadyRegistered,

    #[error("Invalid state transition: cannot {action} a {current_status} registration")]
    InvalidStateTransition {
        current_status: RegistrationStatus,
        action: &'static str,
    },

    #[error("A rejection reason is required")]
    RejectionReasonRequired,

    #[error("Semester is required")]
    SemesterRequired,

    #[error("Registration not found")]
    NotFound,
}
