//! Identifier types shared by every service crate.

mod types;

pub use types::{AggregateId, DepartmentId, UserId};
