//! Domain layer for the academic records services.
//!
//! Aggregates are event sourced: commands raise events into a buffer on the
//! aggregate, and the [`CommandHandler`] persists them under an optimistic
//! version check, retrying on conflict.
//!
//! - [`course`]: the course catalog (capacity, coordinator, prerequisites)
//! - [`department`]: departments; deactivating one deactivates its courses
//! - [`registration`]: student registrations for course offerings
//! - [`student`]: student records, grades and CGPA

pub mod aggregate;
pub mod command;
pub mod course;
pub mod department;
pub mod error;
pub mod registration;
pub mod student;

pub use aggregate::{Aggregate, DomainEvent, EventBuffer};
pub use command::{Command, CommandHandler, CommandResult, DEFAULT_MAX_ATTEMPTS};
pub use course::{Course, CourseCode, CourseError, CourseEvent, CourseService, Semester};
pub use department::{Department, DepartmentError, DepartmentEvent, DepartmentService};
pub use error::DomainError;
pub use registration::{
    CourseRegistration, RegistrationError, RegistrationEvent, RegistrationService,
    RegistrationStatus, RegistrationType,
};
pub use student::{
    Cgpa, CourseGrade, Grade, Student, StudentError, StudentEvent, StudentNumber, StudentService,
    StudentStatus,
};
