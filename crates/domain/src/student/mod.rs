//! Student academic record: grades, CGPA and standing.

mod aggregate;
mod cgpa;
mod commands;
mod events;
mod grade;
mod number;
mod service;
mod state;

pub use aggregate::Student;
pub use cgpa::Cgpa;
pub use commands::*;
pub use events::{
    CgpaUpdatedData, GradeSubmittedData, StatusChangedData, StudentCreatedData, StudentEvent,
};
pub use grade::{CourseGrade, Grade};
pub use number::StudentNumber;
pub use service::StudentService;
pub use state::StudentStatus;

use thiserror::Error;

/// Business-rule violations on a student record.
#[derive(Debug, Error)]
pub enum StudentError {
    #[error("User already has a student record")]
    AlreadyExists,

    #[error("Student is not in an active status to receive grades")]
    NotActiveOrProbation,

    #[error("Credits must be positive")]
    InvalidCredits,

    #[error("Grade already exists for this course in the specified semester")]
    DuplicateGrade,

    #[error("Invalid grade: {grade:?}")]
    InvalidGrade { grade: String },

    #[error("Invalid student number: {number:?}")]
    InvalidStudentNumber { number: String },

    #[error("Program is required")]
    ProgramRequired,

    #[error("Semester is required")]
    SemesterRequired,

    #[error("Enrollment date {0} is out of range")]
    EnrollmentDateOutOfRange(chrono::NaiveDate),

    #[error("Student not found")]
    NotFound,
}
