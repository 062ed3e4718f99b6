//! Integration event consumers, grouped by the service that owns them.
//!
//! Each consumer handles one endpoint's event type; [`crate::Platform`]
//! binds them to endpoints and wraps them in an idempotency guard.

pub mod course_catalog;
pub mod student_academic;
