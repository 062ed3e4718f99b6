//! Department aggregate: the academic units courses belong to.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::Department;
pub use commands::*;
pub use events::{
    DepartmentCreatedData, DepartmentDeactivatedData, DepartmentEvent, DepartmentUpdatedData,
};
pub use service::{DepartmentDeactivation, DepartmentService};

use thiserror::Error;

/// Business-rule violations on a department.
#[derive(Debug, Error)]
pub enum DepartmentError {
    #[error("A department with code {code} already exists")]
    DuplicateDepartmentCode { code: String },

    #[error("Invalid department code: {code:?}")]
    InvalidDepartmentCode { code: String },

    #[error("Department name cannot be empty")]
    EmptyName,

    #[error("Department is already deactivated")]
    AlreadyDeactivated,

    #[error("Department not found")]
    NotFound,
}
