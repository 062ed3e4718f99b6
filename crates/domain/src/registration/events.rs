//! Course registration domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::RegistrationType;

/// Events that can occur on a course registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RegistrationEvent {
    RegistrationCreated(RegistrationCreatedData),
    RegistrationApproved(RegistrationApprovedData),
    RegistrationRejected(RegistrationRejectedData),
    RegistrationCancelled(RegistrationClosedData),
    RegistrationCompleted(RegistrationClosedData),
}

impl DomainEvent for RegistrationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistrationEvent::RegistrationCreated(_) => "RegistrationCreated",
            RegistrationEvent::RegistrationApproved(_) => "RegistrationApproved",
            RegistrationEvent::RegistrationRejected(_) => "RegistrationRejected",
            RegistrationEvent::RegistrationCancelled(_) => "RegistrationCancelled",
            RegistrationEvent::RegistrationCompleted(_) => "RegistrationCompleted",
        }
    }
}

/// Data for RegistrationCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCreatedData {
    pub registration_id: AggregateId,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub semester_id: String,
    pub academic_year: i32,
    pub registration_type: RegistrationType,
    pub registered_at: DateTime<Utc>,
}

/// Data for RegistrationApproved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationApprovedData {
    pub registration_id: AggregateId,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
}

/// Data for RegistrationRejected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRejectedData {
    pub registration_id: AggregateId,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
    pub reason: String,
}

/// Data for RegistrationCancelled and RegistrationCompleted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationClosedData {
    pub registration_id: AggregateId,
    pub student_id: AggregateId,
    pub course_id: AggregateId,
}
