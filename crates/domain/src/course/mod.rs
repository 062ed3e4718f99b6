//! Course aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod value_objects;

pub use aggregate::{Course, CourseDefinition};
pub use commands::*;
pub use events::{
    CapacityUpdatedData, CoordinatorReassignedData, CourseCreatedData, CourseDeactivatedData,
    CourseEvent, CourseFullData, CourseUpdatedData, EnrollmentChangedData,
    PrerequisiteChangedData,
};
pub use service::CourseService;
pub use value_objects::{CourseCode, Semester};

use common::AggregateId;
use thiserror::Error;

/// Business-rule violations on a course.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("A course with code {code} already exists")]
    DuplicateCourseCode { code: String },

    #[error("Invalid course code: {code:?}")]
    InvalidCourseCode { code: String },

    #[error("Invalid semester: {semester:?}")]
    InvalidSemester { semester: String },

    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Credits must be positive")]
    InvalidCredits,

    #[error("Max capacity must be positive")]
    InvalidCapacity,

    #[error("Max capacity {requested} cannot be less than current enrollment {current_enrollment}")]
    CapacityBelowEnrollment {
        requested: u32,
        current_enrollment: u32,
    },

    #[error("Course is not active")]
    CourseInactive,

    #[error("Course is full")]
    CourseFull,

    #[error("No students enrolled to drop")]
    NoEnrollment,

    #[error("Course is already deactivated")]
    AlreadyDeactivated,

    #[error("Course not found")]
    NotFound,

    #[error("A course cannot be its own prerequisite")]
    PrerequisiteSelfReference,

    #[error("Course {prerequisite_id} is already a prerequisite")]
    PrerequisiteAlreadyExists { prerequisite_id: AggregateId },

    #[error("Course {prerequisite_id} is not a prerequisite")]
    PrerequisiteNotFound { prerequisite_id: AggregateId },
}
