//! Department domain events.

use chrono::{DateTime, Utc};
use common::{DepartmentId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DepartmentEvent {
    DepartmentCreated(DepartmentCreatedData),

    /// Name, description or head changed.
    DepartmentUpdated(DepartmentUpdatedData),

    DepartmentDeactivated(DepartmentDeactivatedData),
}

impl DomainEvent for DepartmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DepartmentEvent::DepartmentCreated(_) => "DepartmentCreated",
            DepartmentEvent::DepartmentUpdated(_) => "DepartmentUpdated",
            DepartmentEvent::DepartmentDeactivated(_) => "DepartmentDeactivated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentCreatedData {
    pub department_id: DepartmentId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub head_of_department_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentUpdatedData {
    pub department_id: DepartmentId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub head_of_department_id: UserId,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentDeactivatedData {
    pub department_id: DepartmentId,
    pub code: String,
    pub name: String,
    pub deactivated_at: DateTime<Utc>,
}
