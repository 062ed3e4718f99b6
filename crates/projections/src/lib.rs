//! Read models over the academic records event streams.
//!
//! - [`Projection`] processes stored events into a read model
//! - [`ProjectionProcessor`] replays the store into its projections
//! - [`CoordinatorAssignmentsView`] answers which active courses a user coordinates
//! - [`StudentDirectoryView`] looks students up by number or user

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    CoordinatorAssignmentsView, CourseAssignment, StudentDirectoryView, StudentEntry,
};
