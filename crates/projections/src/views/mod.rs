//! Read model views for the academic records services.

pub mod coordinator_assignments;
pub mod student_directory;

pub use coordinator_assignments::{CoordinatorAssignmentsView, CourseAssignment};
pub use student_directory::{StudentDirectoryView, StudentEntry};
