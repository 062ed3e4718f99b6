//! Compensating coordinator reassignment.
//!
//! When a course coordinator is deactivated or leaves the coordinator role,
//! [`ReassignmentWorkflow`] hands each of their active courses to the default
//! coordinator. Progress is kept in an event-sourced [`ReassignmentSaga`], so
//! a failed run can be resumed by delivering the same trigger again.

pub mod aggregate;
pub mod error;
pub mod events;
pub mod index;
pub mod reassignment;
pub mod state;
pub mod workflow;

pub use aggregate::ReassignmentSaga;
pub use error::{Result, SagaError};
pub use events::SagaEvent;
pub use index::{AssignmentIndex, ProjectedAssignments};
pub use reassignment::{
    COORDINATOR_ROLE, ReassignmentOutcome, ReassignmentRequest, ReassignmentTrigger, SAGA_TYPE,
};
pub use state::SagaState;
pub use workflow::ReassignmentWorkflow;
