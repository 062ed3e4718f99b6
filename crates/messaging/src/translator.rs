//! Maps stored domain events to integration events.

use std::collections::HashSet;

use domain::{
    Aggregate, Course, CourseEvent, CourseRegistration, Department, DepartmentEvent,
    RegistrationEvent, Student, StudentEvent,
};
use event_store::EventEnvelope;
use serde::de::DeserializeOwned;

use crate::error::TranslationError;
use crate::event::{EnrollmentChange, IntegrationEvent, IntegrationPayload, PrerequisiteChange};

/// Translates stored events into the integration events other services see.
///
/// Every department, course, registration and student event has exactly
/// one integration event. Aggregate types registered with [`keep_private`](Self::keep_private)
/// are bookkeeping only and translate to `None`.
#[derive(Debug, Clone, Default)]
pub struct EventTranslator {
    private: HashSet<String>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an aggregate type whose events are never published.
    pub fn keep_private(mut self, aggregate_type: impl Into<String>) -> Self {
        self.private.insert(aggregate_type.into());
        self
    }

    /// Returns the integration event for `envelope`, or `None` when its
    /// aggregate is private.
    ///
    /// The integration event takes the stored event's id as correlation id
    /// and its timestamp as occurrence time.
    pub fn translate(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<Option<IntegrationEvent>, TranslationError> {
        let aggregate_type = envelope.aggregate_type.as_str();
        if self.private.contains(aggregate_type) {
            return Ok(None);
        }

        let payload = if aggregate_type == Course::aggregate_type() {
            course_payload(decode(envelope)?)
        } else if aggregate_type == Department::aggregate_type() {
            department_payload(decode(envelope)?)
        } else if aggregate_type == CourseRegistration::aggregate_type() {
            registration_payload(decode(envelope)?)
        } else if aggregate_type == Student::aggregate_type() {
            student_payload(decode(envelope)?)
        } else {
            return Err(TranslationError::UnknownAggregate(aggregate_type.to_string()));
        };

        Ok(Some(IntegrationEvent {
            correlation_id: envelope.event_id.as_uuid(),
            occurred_on: envelope.timestamp,
            payload,
        }))
    }
}

fn decode<E: DeserializeOwned>(envelope: &EventEnvelope) -> Result<E, TranslationError> {
    serde_json::from_value(envelope.payload.clone()).map_err(|source| TranslationError::Payload {
        aggregate_type: envelope.aggregate_type.clone(),
        source,
    })
}

fn department_payload(event: DepartmentEvent) -> IntegrationPayload {
    match event {
        DepartmentEvent::DepartmentCreated(data) => IntegrationPayload::DepartmentCreated {
            department_id: data.department_id,
            code: data.code,
            name: data.name,
            description: data.description,
            head_of_department_id: data.head_of_department_id,
            created_at: data.created_at,
        },
        DepartmentEvent::DepartmentUpdated(data) => IntegrationPayload::DepartmentUpdated {
            department_id: data.department_id,
            code: data.code,
            name: data.name,
            description: data.description,
            head_of_department_id: data.head_of_department_id,
            updated_at: data.updated_at,
        },
        DepartmentEvent::DepartmentDeactivated(data) => {
            IntegrationPayload::DepartmentDeactivated {
                department_id: data.department_id,
                code: data.code,
                name: data.name,
                deactivated_at: data.deactivated_at,
            }
        }
    }
}

fn course_payload(event: CourseEvent) -> IntegrationPayload {
    match event {
        CourseEvent::CourseCreated(data) => IntegrationPayload::CourseCreated {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            title: data.title,
            description: data.description,
            credits: data.credits,
            department_id: data.department_id,
            coordinator_id: data.coordinator_id,
            max_capacity: data.max_capacity,
            is_borrowable: data.is_borrowable,
            semester: data.offering_semester.to_string(),
            academic_year: data.academic_year,
            prerequisites: data.prerequisites,
        },
        CourseEvent::CourseUpdated(data) => IntegrationPayload::CourseUpdated {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            title: data.title,
            description: data.description,
            credits: data.credits,
        },
        CourseEvent::StudentEnrolled(data) => IntegrationPayload::CourseEnrollmentChanged {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            change: EnrollmentChange::Enrolled,
            current_enrollment: data.current_enrollment,
            max_capacity: data.max_capacity,
            available_slots: data.max_capacity.saturating_sub(data.current_enrollment),
        },
        CourseEvent::StudentDropped(data) => IntegrationPayload::CourseEnrollmentChanged {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            change: EnrollmentChange::Dropped,
            current_enrollment: data.current_enrollment,
            max_capacity: data.max_capacity,
            available_slots: data.max_capacity.saturating_sub(data.current_enrollment),
        },
        CourseEvent::CourseFull(data) => IntegrationPayload::CourseFull {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            title: data.title,
            max_capacity: data.max_capacity,
        },
        CourseEvent::CapacityUpdated(data) => IntegrationPayload::CourseCapacityUpdated {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            max_capacity: data.max_capacity,
            current_enrollment: data.current_enrollment,
            available_slots: data.max_capacity.saturating_sub(data.current_enrollment),
        },
        CourseEvent::CoordinatorReassigned(data) => {
            IntegrationPayload::CourseCoordinatorReassigned {
                course_id: data.course_id,
                course_code: data.course_code.to_string(),
                previous_coordinator_id: data.previous_coordinator_id,
                new_coordinator_id: data.new_coordinator_id,
            }
        }
        CourseEvent::PrerequisiteAdded(data) => IntegrationPayload::CoursePrerequisitesChanged {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            change: PrerequisiteChange::Added,
            prerequisite_id: data.prerequisite_id,
        },
        CourseEvent::PrerequisiteRemoved(data) => IntegrationPayload::CoursePrerequisitesChanged {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            change: PrerequisiteChange::Removed,
            prerequisite_id: data.prerequisite_id,
        },
        CourseEvent::CourseDeactivated(data) => IntegrationPayload::CourseDeactivated {
            course_id: data.course_id,
            course_code: data.course_code.to_string(),
            title: data.title,
        },
    }
}

fn registration_payload(event: RegistrationEvent) -> IntegrationPayload {
    match event {
        RegistrationEvent::RegistrationCreated(data) => {
            IntegrationPayload::CourseRegistrationCreated {
                registration_id: data.registration_id,
                student_id: data.student_id,
                course_id: data.course_id,
                semester_id: data.semester_id,
                academic_year: data.academic_year,
                registration_type: data.registration_type.as_str().to_string(),
                registered_at: data.registered_at,
            }
        }
        RegistrationEvent::RegistrationApproved(data) => {
            IntegrationPayload::CourseRegistrationApproved {
                registration_id: data.registration_id,
                student_id: data.student_id,
                course_id: data.course_id,
                approved_by: data.approved_by,
                approved_at: data.approved_at,
            }
        }
        RegistrationEvent::RegistrationRejected(data) => {
            IntegrationPayload::CourseRegistrationRejected {
                registration_id: data.registration_id,
                student_id: data.student_id,
                course_id: data.course_id,
                reason: data.reason,
            }
        }
        RegistrationEvent::RegistrationCancelled(data) => {
            IntegrationPayload::CourseRegistrationCancelled {
                registration_id: data.registration_id,
                student_id: data.student_id,
                course_id: data.course_id,
            }
        }
        RegistrationEvent::RegistrationCompleted(data) => {
            IntegrationPayload::CourseRegistrationCompleted {
                registration_id: data.registration_id,
                student_id: data.student_id,
                course_id: data.course_id,
            }
        }
    }
}

fn student_payload(event: StudentEvent) -> IntegrationPayload {
    match event {
        StudentEvent::StudentCreated(data) => IntegrationPayload::StudentCreated {
            student_id: data.student_id,
            student_number: data.student_number.to_string(),
            user_id: data.user_id,
            department_id: data.department_id,
            program: data.program,
            enrollment_date: data.enrollment_date,
            expected_graduation_date: data.expected_graduation_date,
        },
        StudentEvent::GradeSubmitted(data) => IntegrationPayload::GradeSubmitted {
            student_id: data.student_id,
            course_id: data.course_id,
            credits: data.credits,
            grade: data.grade.as_str().to_string(),
            semester: data.semester,
            academic_year: data.academic_year,
        },
        StudentEvent::CgpaUpdated(data) => IntegrationPayload::CgpaUpdated {
            student_id: data.student_id,
            old_cgpa: data.old_cgpa.value(),
            new_cgpa: data.new_cgpa.value(),
        },
        StudentEvent::StatusChanged(data) => IntegrationPayload::StudentStatusChanged {
            student_id: data.student_id,
            old_status: data.old_status.as_str().to_string(),
            new_status: data.new_status.as_str().to_string(),
            reason: data.reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, DepartmentId, UserId};
    use domain::course::{CreateCourse, EnrollStudent};
    use domain::department::CreateDepartment;
    use domain::{CourseService, DepartmentService, Semester};
    use event_store::{EventStore, InMemoryEventStore, Version};

    async fn course_events() -> (UserId, Vec<EventEnvelope>) {
        let store = InMemoryEventStore::new();
        let service = CourseService::new(store.clone());
        let coordinator = UserId::new();
        let course_id = service
            .create_course(
                CreateCourse::new("ENG210", "Technical Writing", 2, DepartmentId::new(), coordinator, 1)
                    .with_description("Reports, specs and proposals")
                    .offered(Semester::Fall, 2026),
            )
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();
        service
            .enroll_student(EnrollStudent::new(course_id))
            .await
            .unwrap();
        (
            coordinator,
            store.get_events_for_aggregate(course_id).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn course_created_carries_the_full_definition() {
        let (coordinator, events) = course_events().await;

        let event = EventTranslator::new().translate(&events[0]).unwrap().unwrap();

        assert_eq!(event.correlation_id, events[0].event_id.as_uuid());
        assert_eq!(event.occurred_on, events[0].timestamp);
        let IntegrationPayload::CourseCreated {
            course_code,
            description,
            credits,
            max_capacity,
            coordinator_id,
            semester,
            academic_year,
            ..
        } = event.payload
        else {
            panic!("expected CourseCreated");
        };
        assert_eq!(course_code, "ENG210");
        assert_eq!(description, "Reports, specs and proposals");
        assert_eq!(credits, 2);
        assert_eq!(max_capacity, 1);
        assert_eq!(coordinator_id, coordinator);
        assert_eq!(semester, "Fall");
        assert_eq!(academic_year, 2026);
    }

    #[tokio::test]
    async fn enrollment_and_full_translate_with_real_capacity() {
        let (_, events) = course_events().await;
        let translator = EventTranslator::new();

        let enrolled = translator.translate(&events[1]).unwrap().unwrap();
        assert_eq!(enrolled.event_type(), "CourseEnrollmentChanged");
        let IntegrationPayload::CourseEnrollmentChanged {
            change,
            available_slots,
            ..
        } = enrolled.payload
        else {
            panic!("expected CourseEnrollmentChanged");
        };
        assert_eq!(change, EnrollmentChange::Enrolled);
        assert_eq!(available_slots, 0);

        let full = translator.translate(&events[2]).unwrap().unwrap();
        let IntegrationPayload::CourseFull { max_capacity, .. } = full.payload else {
            panic!("expected CourseFull");
        };
        assert_eq!(max_capacity, 1);
    }

    #[tokio::test]
    async fn department_created_carries_code_and_head() {
        let store = InMemoryEventStore::new();
        let head = UserId::new();
        let department = DepartmentService::new(store.clone())
            .create_department(
                CreateDepartment::new("hist", "History", head).with_description("Past and present"),
            )
            .await
            .unwrap()
            .aggregate;
        let department_id = department.department_id().unwrap();
        let events = store
            .get_events_for_aggregate(department.id().unwrap())
            .await
            .unwrap();

        let event = EventTranslator::new().translate(&events[0]).unwrap().unwrap();

        assert_eq!(event.routing_key(), "department-created");
        let IntegrationPayload::DepartmentCreated {
            department_id: published_id,
            code,
            name,
            description,
            head_of_department_id,
            ..
        } = event.payload
        else {
            panic!("expected DepartmentCreated");
        };
        assert_eq!(published_id, department_id);
        assert_eq!(code, "HIST");
        assert_eq!(name, "History");
        assert_eq!(description, "Past and present");
        assert_eq!(head_of_department_id, head);
    }

    #[test]
    fn private_aggregates_are_not_published() {
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("CoordinatorReassignment")
            .event_type("SagaStarted")
            .version(Version::first())
            .payload_raw(serde_json::json!({"type": "SagaStarted", "data": {}}))
            .build()
            .unwrap();

        let translator = EventTranslator::new().keep_private("CoordinatorReassignment");
        assert!(translator.translate(&envelope).unwrap().is_none());

        let err = EventTranslator::new().translate(&envelope).unwrap_err();
        assert!(matches!(err, TranslationError::UnknownAggregate(t) if t == "CoordinatorReassignment"));
    }

    #[test]
    fn undecodable_payload_is_an_error() {
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Student")
            .event_type("StudentCreated")
            .version(Version::first())
            .payload_raw(serde_json::json!({"type": "Bogus"}))
            .build()
            .unwrap();

        let err = EventTranslator::new().translate(&envelope).unwrap_err();
        assert!(matches!(err, TranslationError::Payload { .. }));
    }
}
