//! Integration tests: domain services → ProjectionProcessor → views.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{AggregateId, DepartmentId, UserId};
use domain::{
    Aggregate, CourseService, Grade, StudentService, StudentStatus,
    course::{CreateCourse, DeactivateCourse, EnrollStudent, ReassignCoordinator},
    student::{CreateStudent, StudentNumber, SubmitGrade},
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStream, InMemoryEventStore, Version,
};
use futures_util::StreamExt;
use tokio::sync::RwLock;
use projections::{CoordinatorAssignmentsView, ProjectionProcessor, StudentDirectoryView};

struct Harness {
    courses: CourseService<InMemoryEventStore>,
    students: StudentService<InMemoryEventStore>,
    processor: ProjectionProcessor<InMemoryEventStore>,
    assignments: CoordinatorAssignmentsView,
    directory: StudentDirectoryView,
}

/// One store shared by both services, as in a single-process deployment.
fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let assignments = CoordinatorAssignmentsView::new();
    let directory = StudentDirectoryView::new();

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(assignments.clone()));
    processor.register(Box::new(directory.clone()));

    Harness {
        courses: CourseService::new(store.clone()),
        students: StudentService::new(store),
        processor,
        assignments,
        directory,
    }
}

async fn create_course(h: &Harness, code: &str, coordinator: UserId) -> AggregateId {
    h.courses
        .create_course(CreateCourse::new(
            code,
            "Course",
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

#[tokio::test]
async fn assignments_follow_course_lifecycle() {
    let h = setup();
    let coordinator = UserId::new();
    let successor = UserId::new();

    let kept = create_course(&h, "HIST101", coordinator).await;
    let moved = create_course(&h, "HIST102", coordinator).await;
    let closed = create_course(&h, "HIST103", coordinator).await;

    h.courses
        .enroll_student(EnrollStudent::new(kept))
        .await
        .unwrap();
    h.courses
        .reassign_coordinator(ReassignCoordinator::new(moved, successor))
        .await
        .unwrap();
    h.courses
        .deactivate_course(DeactivateCourse::new(closed))
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    let mine: Vec<_> = h
        .assignments
        .active_courses_for(coordinator)
        .await
        .into_iter()
        .map(|c| c.course_id)
        .collect();
    assert_eq!(mine, vec![kept]);
    assert_eq!(h.assignments.active_courses_for(successor).await.len(), 1);
    assert!(!h.assignments.get(closed).await.unwrap().is_active);
}

#[tokio::test]
async fn incremental_catch_up_picks_up_new_events() {
    let h = setup();
    let coordinator = UserId::new();
    create_course(&h, "ART100", coordinator).await;
    h.processor.run_catch_up().await.unwrap();
    assert_eq!(h.assignments.active_courses_for(coordinator).await.len(), 1);

    create_course(&h, "ART200", coordinator).await;
    h.processor.run_catch_up().await.unwrap();
    assert_eq!(h.assignments.active_courses_for(coordinator).await.len(), 2);
}

#[tokio::test]
async fn directory_tracks_students_alongside_courses() {
    let h = setup();
    let user_id = UserId::new();
    let number = StudentNumber::parse("260115-4242").unwrap();
    let course_id = create_course(&h, "CHEM101", UserId::new()).await;

    let student_id = h
        .students
        .create_student(
            CreateStudent::new(
                user_id,
                number.clone(),
                DepartmentId::new(),
                "Chemistry",
                NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            ),
            None,
        )
        .await
        .unwrap()
        .aggregate
        .id()
        .unwrap();
    h.students
        .add_grade(SubmitGrade::new(student_id, course_id, 3, Grade::BPlus, "Spring", 2026))
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    let entry = h.directory.find_by_user(user_id).await.unwrap();
    assert_eq!(entry.student_number, number);
    assert_eq!(entry.status, StudentStatus::Active);
    assert_eq!(entry.current_cgpa.to_string(), "3.50");
    assert!(h.directory.is_number_taken(&number).await);
}

#[tokio::test]
async fn rebuild_produces_same_views() {
    let h = setup();
    let coordinator = UserId::new();
    create_course(&h, "ECON101", coordinator).await;
    create_course(&h, "ECON102", coordinator).await;

    h.processor.run_catch_up().await.unwrap();
    let before = h.assignments.active_courses_for(coordinator).await;

    h.processor.rebuild_all().await.unwrap();
    assert_eq!(h.assignments.active_courses_for(coordinator).await, before);
}

/// A store whose readers don't yet see some committed aggregates, like a
/// transaction that took its sequence number early but committed late.
#[derive(Clone, Default)]
struct LaggingStore {
    inner: InMemoryEventStore,
    hidden: Arc<RwLock<HashSet<AggregateId>>>,
}

#[async_trait]
impl EventStore for LaggingStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn stream_all_events(&self) -> event_store::Result<EventStream> {
        let hidden = self.hidden.read().await.clone();
        let stream = self.inner.stream_all_events().await?;
        Ok(Box::pin(stream.filter(move |event| {
            let visible = match event {
                Ok(event) => !hidden.contains(&event.aggregate_id),
                Err(_) => true,
            };
            std::future::ready(visible)
        })))
    }

    async fn get_aggregate_version(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }
}

#[tokio::test]
async fn late_visible_course_still_reaches_coordinator_index() {
    let store = LaggingStore::default();
    let courses = CourseService::new(store.clone());
    let assignments = CoordinatorAssignmentsView::new();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(assignments.clone()));
    let coordinator = UserId::new();

    let mut ids = Vec::new();
    for code in ["GEO101", "GEO102", "GEO103"] {
        let id = courses
            .create_course(CreateCourse::new(code, "Geology", 3, DepartmentId::new(), coordinator, 30))
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();
        ids.push(id);
    }

    store.hidden.write().await.insert(ids[1]);
    processor.run_catch_up().await.unwrap();
    assert_eq!(assignments.active_courses_for(coordinator).await.len(), 2);

    store.hidden.write().await.clear();
    processor.run_catch_up().await.unwrap();

    let codes: Vec<_> = assignments
        .active_courses_for(coordinator)
        .await
        .into_iter()
        .map(|c| c.course_code)
        .collect();
    assert_eq!(codes, vec!["GEO101", "GEO102", "GEO103"]);
    let position = processor.position("CoordinatorAssignmentsView").await.unwrap();
    assert_eq!(position.watermark(), 3);
}
