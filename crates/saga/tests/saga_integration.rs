//! Integration tests for the coordinator reassignment saga.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{AggregateId, DepartmentId, UserId};
use domain::{
    Aggregate, CourseService,
    course::{CreateCourse, DeactivateCourse, ReassignCoordinator},
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStream, InMemoryEventStore,
    Version,
};
use saga::{
    ProjectedAssignments, ReassignmentRequest, ReassignmentSaga, ReassignmentWorkflow, SagaError,
    SagaState,
};
use uuid::Uuid;

/// Store that refuses appends for selected aggregates.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryEventStore,
    broken: Arc<Mutex<HashSet<AggregateId>>>,
}

impl FlakyStore {
    fn break_aggregate(&self, id: AggregateId) {
        self.broken.lock().unwrap().insert(id);
    }

    fn heal(&self) {
        self.broken.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        let target = events.first().map(|e| e.aggregate_id);
        if target.is_some_and(|id| self.broken.lock().unwrap().contains(&id)) {
            return Err(EventStoreError::InvalidAppend(
                "storage temporarily unavailable".into(),
            ));
        }
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn stream_all_events(&self) -> event_store::Result<EventStream> {
        self.inner.stream_all_events().await
    }

    async fn get_aggregate_version(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }
}

struct TestHarness {
    store: FlakyStore,
    courses: CourseService<FlakyStore>,
    workflow: ReassignmentWorkflow<FlakyStore, ProjectedAssignments<FlakyStore>>,
    default_coordinator: UserId,
}

impl TestHarness {
    fn new() -> Self {
        let store = FlakyStore::default();
        let default_coordinator = UserId::new();
        let workflow = ReassignmentWorkflow::new(
            store.clone(),
            ProjectedAssignments::over(store.clone()),
            default_coordinator,
        );

        Self {
            courses: CourseService::new(store.clone()),
            store,
            workflow,
            default_coordinator,
        }
    }

    async fn create_course(&self, code: &str, coordinator: UserId) -> AggregateId {
        self.courses
            .create_course(CreateCourse::new(
                code,
                "Seminar",
                3,
                DepartmentId::new(),
                coordinator,
                25,
            ))
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap()
    }

    async fn coordinator_of(&self, course_id: AggregateId) -> Option<UserId> {
        self.courses
            .get_course(course_id)
            .await
            .unwrap()
            .unwrap()
            .coordinator_id()
    }

    async fn event_count(&self, aggregate_id: AggregateId) -> usize {
        self.store
            .get_events_for_aggregate(aggregate_id)
            .await
            .unwrap()
            .len()
    }
}

mod reassignment {
    use super::*;

    #[tokio::test]
    async fn deactivated_coordinator_courses_move_to_default() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let colleague = UserId::new();

        let mut active = Vec::new();
        for code in ["HIST101", "HIST201", "HIST301"] {
            active.push(h.create_course(code, leaving).await);
        }
        let retired = h.create_course("HIST401", leaving).await;
        h.courses
            .deactivate_course(DeactivateCourse::new(retired))
            .await
            .unwrap();
        let other = h.create_course("GEO101", colleague).await;

        let correlation_id = Uuid::new_v4();
        let outcome = h
            .workflow
            .run(ReassignmentRequest::user_deactivated(leaving, correlation_id))
            .await
            .unwrap();

        assert_eq!(outcome.reassigned, active);
        assert!(outcome.skipped.is_empty());
        assert!(!outcome.already_completed);
        assert_eq!(outcome.saga_id, ReassignmentSaga::id_for(correlation_id));

        for course_id in &active {
            assert_eq!(
                h.coordinator_of(*course_id).await,
                Some(h.default_coordinator)
            );
        }
        assert_eq!(h.coordinator_of(retired).await, Some(leaving));
        assert_eq!(h.coordinator_of(other).await, Some(colleague));
    }

    #[tokio::test]
    async fn course_events_are_caused_by_the_trigger() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let course_id = h.create_course("ART100", leaving).await;
        let correlation_id = Uuid::new_v4();

        h.workflow
            .run(ReassignmentRequest::user_deactivated(leaving, correlation_id))
            .await
            .unwrap();

        let events = h.store.get_events_for_aggregate(course_id).await.unwrap();
        let reassigned = events
            .iter()
            .find(|e| e.event_type == "CoordinatorReassigned")
            .unwrap();
        assert_eq!(reassigned.causation_id(), Some(correlation_id));
    }

    #[tokio::test]
    async fn same_trigger_twice_is_a_noop() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let course_id = h.create_course("MUS110", leaving).await;
        let correlation_id = Uuid::new_v4();
        let request = ReassignmentRequest::user_deactivated(leaving, correlation_id);

        h.workflow.run(request.clone()).await.unwrap();
        let saga_id = ReassignmentSaga::id_for(correlation_id);
        let saga_events = h.event_count(saga_id).await;
        let course_events = h.event_count(course_id).await;

        let outcome = h.workflow.run(request).await.unwrap();

        assert!(outcome.already_completed);
        assert_eq!(outcome.reassigned, vec![course_id]);
        assert_eq!(h.event_count(saga_id).await, saga_events);
        assert_eq!(h.event_count(course_id).await, course_events);
    }

    #[tokio::test]
    async fn role_change_out_of_coordinator_role() {
        let h = TestHarness::new();
        let user = UserId::new();
        let course_id = h.create_course("PHIL200", user).await;
        let correlation_id = Uuid::new_v4();

        h.workflow
            .run(ReassignmentRequest::role_changed(
                user,
                "CourseCoordinator",
                "Staff",
                correlation_id,
            ))
            .await
            .unwrap();

        assert_eq!(
            h.coordinator_of(course_id).await,
            Some(h.default_coordinator)
        );
        let saga = h.workflow.get_saga(correlation_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(saga.trigger().unwrap().kind(), "RoleChanged");
    }

    #[tokio::test]
    async fn user_without_courses_completes_empty() {
        let h = TestHarness::new();
        h.create_course("LAW101", UserId::new()).await;

        let outcome = h
            .workflow
            .run(ReassignmentRequest::user_deactivated(
                UserId::new(),
                Uuid::new_v4(),
            ))
            .await
            .unwrap();

        assert!(outcome.reassigned.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn course_handed_over_earlier_is_left_alone() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let successor = UserId::new();
        let course_id = h.create_course("ECON300", leaving).await;
        h.courses
            .reassign_coordinator(ReassignCoordinator::new(course_id, successor))
            .await
            .unwrap();

        let outcome = h
            .workflow
            .run(ReassignmentRequest::user_deactivated(leaving, Uuid::new_v4()))
            .await
            .unwrap();

        assert!(outcome.reassigned.is_empty());
        assert_eq!(h.coordinator_of(course_id).await, Some(successor));
    }
}

mod resumption {
    use super::*;

    #[tokio::test]
    async fn failed_course_is_retried_on_redelivery() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let first = h.create_course("CS101", leaving).await;
        let stuck = h.create_course("CS102", leaving).await;
        let third = h.create_course("CS103", leaving).await;
        let correlation_id = Uuid::new_v4();
        let request = ReassignmentRequest::user_deactivated(leaving, correlation_id);

        h.store.break_aggregate(stuck);
        let err = h.workflow.run(request.clone()).await.unwrap_err();
        assert!(matches!(err, SagaError::StepsFailed { failed: 1, .. }));

        let saga = h.workflow.get_saga(correlation_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.failed(), &[stuck]);
        assert_eq!(saga.outstanding(), vec![stuck]);
        assert_eq!(h.coordinator_of(first).await, Some(h.default_coordinator));
        assert_eq!(h.coordinator_of(stuck).await, Some(leaving));
        assert_eq!(h.coordinator_of(third).await, Some(h.default_coordinator));

        let first_events = h.event_count(first).await;
        h.store.heal();
        let outcome = h.workflow.run(request).await.unwrap();

        assert_eq!(outcome.reassigned.len(), 3);
        assert!(outcome.reassigned.contains(&stuck));
        assert_eq!(h.coordinator_of(stuck).await, Some(h.default_coordinator));
        assert_eq!(h.event_count(first).await, first_events);

        let saga = h.workflow.get_saga(correlation_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(saga.attempt(), 2);
    }

    #[tokio::test]
    async fn saga_interrupted_by_its_own_store_resumes() {
        let h = TestHarness::new();
        let leaving = UserId::new();
        let course_id = h.create_course("MED500", leaving).await;
        let correlation_id = Uuid::new_v4();
        let saga_id = ReassignmentSaga::id_for(correlation_id);
        let request = ReassignmentRequest::user_deactivated(leaving, correlation_id);

        h.store.break_aggregate(saga_id);
        let err = h.workflow.run(request.clone()).await.unwrap_err();
        assert!(matches!(err, SagaError::EventStore(_)));
        assert!(h.workflow.get_saga(correlation_id).await.unwrap().is_none());
        assert_eq!(h.coordinator_of(course_id).await, Some(leaving));

        h.store.heal();
        let outcome = h.workflow.run(request).await.unwrap();
        assert_eq!(outcome.reassigned, vec![course_id]);
    }
}
