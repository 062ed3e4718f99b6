//! Student academic consumers: student records for new users and the course
//! reference cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{AggregateId, DepartmentId, UserId};
use domain::student::CreateStudent;
use domain::{DomainError, StudentError, StudentNumber, StudentService};
use event_store::EventStore;
use messaging::{ConsumerError, IntegrationEvent, IntegrationEventHandler, IntegrationPayload};
use projections::{ProjectionProcessor, StudentDirectoryView};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SERVICE: &str = "student-academic";

/// Fresh numbers tried before giving up on a sign-up.
pub const MAX_NUMBER_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
#[error("No free student number for {date} after {attempts} attempts")]
pub struct StudentNumbersExhausted {
    pub date: NaiveDate,
    pub attempts: usize,
}

type NumberSource = Arc<dyn Fn(NaiveDate) -> StudentNumber + Send + Sync>;

/// Opens a student record when a user of type Student signs up.
///
/// The record gets a generated `yyMMdd-NNNN` number not yet present in the
/// student directory, plus the configured department and program. A user
/// who already has a record is logged and treated as handled.
pub struct StudentProvisioner<S: EventStore> {
    students: StudentService<S>,
    processor: Arc<ProjectionProcessor<S>>,
    directory: StudentDirectoryView,
    department_id: DepartmentId,
    program: String,
    numbers: NumberSource,
}

impl<S: EventStore> StudentProvisioner<S> {
    /// `directory` must be registered with `processor`, which reads the
    /// store behind `students`.
    pub fn new(
        students: StudentService<S>,
        processor: Arc<ProjectionProcessor<S>>,
        directory: StudentDirectoryView,
        department_id: DepartmentId,
        program: impl Into<String>,
    ) -> Self {
        Self {
            students,
            processor,
            directory,
            department_id,
            program: program.into(),
            numbers: Arc::new(StudentNumber::generate),
        }
    }

    /// Replaces the random number generator.
    pub fn with_number_source(
        mut self,
        numbers: impl Fn(NaiveDate) -> StudentNumber + Send + Sync + 'static,
    ) -> Self {
        self.numbers = Arc::new(numbers);
        self
    }

    async fn free_number(&self, date: NaiveDate) -> Result<StudentNumber, ConsumerError> {
        self.processor
            .run_catch_up()
            .await
            .map_err(ConsumerError::handler)?;

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let number = (self.numbers)(date);
            if !self.directory.is_number_taken(&number).await {
                return Ok(number);
            }
            tracing::debug!(number = number.as_str(), "Student number taken, regenerating");
        }
        Err(ConsumerError::handler(StudentNumbersExhausted {
            date,
            attempts: MAX_NUMBER_ATTEMPTS,
        }))
    }

    async fn provision(&self, user_id: UserId, correlation_id: Uuid) -> Result<(), ConsumerError> {
        let enrollment_date = Utc::now().date_naive();
        let number = self.free_number(enrollment_date).await?;
        let cmd = CreateStudent::new(
            user_id,
            number,
            self.department_id,
            self.program.as_str(),
            enrollment_date,
        );

        match self.students.create_student(cmd, Some(correlation_id)).await {
            Ok(result) => {
                tracing::info!(
                    %user_id,
                    student_number = result.aggregate.student_number().map(StudentNumber::as_str),
                    "Student record created"
                );
                Ok(())
            }
            Err(DomainError::Student(StudentError::AlreadyExists)) => {
                tracing::warn!(%user_id, "User already has a student record");
                Ok(())
            }
            Err(error) if error.is_rejection() => {
                tracing::warn!(%user_id, error = %error, "Student record rejected");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl<S: EventStore + 'static> IntegrationEventHandler for StudentProvisioner<S> {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        let IntegrationPayload::UserCreated {
            user_id, user_type, ..
        } = &event.payload
        else {
            return Err(ConsumerError::UnexpectedEvent(event.event_type().to_string()));
        };

        if !user_type.trim().eq_ignore_ascii_case("student") {
            tracing::debug!(%user_id, %user_type, "Not a student, nothing to do");
            return Ok(());
        }
        self.provision(*user_id, event.correlation_id).await
    }
}

/// What the student service knows about a catalog course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseReference {
    pub course_id: AggregateId,
    pub course_code: String,
    pub title: String,
    pub credits: u32,
}

/// Local copy of catalog courses, fed by `CourseCreated`.
#[derive(Debug, Clone, Default)]
pub struct CourseReferenceCache {
    courses: Arc<RwLock<HashMap<AggregateId, CourseReference>>>,
}

impl CourseReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, course_id: AggregateId) -> Option<CourseReference> {
        self.courses.read().await.get(&course_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.courses.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.courses.read().await.is_empty()
    }

    async fn record(&self, reference: CourseReference) {
        self.courses
            .write()
            .await
            .insert(reference.course_id, reference);
    }
}

pub struct CourseCreatedHandler {
    cache: CourseReferenceCache,
}

impl CourseCreatedHandler {
    pub fn new(cache: CourseReferenceCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl IntegrationEventHandler for CourseCreatedHandler {
    async fn handle(&self, event: &IntegrationEvent) -> Result<(), ConsumerError> {
        let IntegrationPayload::CourseCreated {
            course_id,
            course_code,
            title,
            credits,
            ..
        } = &event.payload
        else {
            return Err(ConsumerError::UnexpectedEvent(event.event_type().to_string()));
        };

        tracing::info!(%course_id, %course_code, "Course cached for academic tracking");
        self.cache
            .record(CourseReference {
                course_id: *course_id,
                course_code: course_code.clone(),
                title: title.clone(),
                credits: *credits,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Student;
    use event_store::{EventStore, InMemoryEventStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn provisioner(store: &InMemoryEventStore) -> StudentProvisioner<InMemoryEventStore> {
        let directory = StudentDirectoryView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(directory.clone()));
        StudentProvisioner::new(
            StudentService::new(store.clone()),
            Arc::new(processor),
            directory,
            DepartmentId::new(),
            "Undergraduate",
        )
    }

    fn user_created(user_id: UserId, user_type: &str) -> IntegrationEvent {
        IntegrationEvent::new(IntegrationPayload::UserCreated {
            user_id,
            email: "kate@uni.test".into(),
            first_name: "Kate".into(),
            last_name: "Bell".into(),
            user_type: user_type.into(),
            created_at: Utc::now(),
        })
    }

    mod provisioning {
        use super::*;

        #[tokio::test]
        async fn student_sign_up_creates_a_record() {
            let store = InMemoryEventStore::new();
            let user_id = UserId::new();

            provisioner(&store)
                .handle(&user_created(user_id, "STUDENT"))
                .await
                .unwrap();

            let events = store
                .get_events_for_aggregate(Student::id_for_user(user_id))
                .await
                .unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event_type, "StudentCreated");
        }

        #[tokio::test]
        async fn other_user_types_are_ignored() {
            let store = InMemoryEventStore::new();
            provisioner(&store)
                .handle(&user_created(UserId::new(), "Staff"))
                .await
                .unwrap();
            assert_eq!(store.event_count().await, 0);
        }

        #[tokio::test]
        async fn existing_record_is_treated_as_handled() {
            let store = InMemoryEventStore::new();
            let provisioner = provisioner(&store);
            let user_id = UserId::new();

            provisioner.handle(&user_created(user_id, "Student")).await.unwrap();
            provisioner.handle(&user_created(user_id, "Student")).await.unwrap();

            assert_eq!(store.event_count().await, 1);
        }

        #[tokio::test]
        async fn taken_numbers_are_regenerated() {
            let store = InMemoryEventStore::new();
            let first = StudentNumber::parse("260901-1234").unwrap();
            let second = StudentNumber::parse("260901-5678").unwrap();
            StudentService::new(store.clone())
                .create_student(
                    CreateStudent::new(
                        UserId::new(),
                        first.clone(),
                        DepartmentId::new(),
                        "Graduate",
                        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                    ),
                    None,
                )
                .await
                .unwrap();

            let calls = Arc::new(AtomicUsize::new(0));
            let provisioner = provisioner(&store).with_number_source({
                let calls = Arc::clone(&calls);
                let (first, second) = (first.clone(), second.clone());
                move |_| {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        first.clone()
                    } else {
                        second.clone()
                    }
                }
            });
            let user_id = UserId::new();

            provisioner.handle(&user_created(user_id, "Student")).await.unwrap();

            assert_eq!(calls.load(Ordering::SeqCst), 2);
            let student = StudentService::new(store.clone())
                .handler()
                .load(Student::id_for_user(user_id))
                .await
                .unwrap();
            assert_eq!(student.student_number(), Some(&second));
        }

        #[tokio::test]
        async fn gives_up_when_every_number_is_taken() {
            let store = InMemoryEventStore::new();
            let taken = StudentNumber::parse("260901-4321").unwrap();
            StudentService::new(store.clone())
                .create_student(
                    CreateStudent::new(
                        UserId::new(),
                        taken.clone(),
                        DepartmentId::new(),
                        "Graduate",
                        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                    ),
                    None,
                )
                .await
                .unwrap();

            let provisioner = provisioner(&store).with_number_source(move |_| taken.clone());
            let err = provisioner
                .handle(&user_created(UserId::new(), "Student"))
                .await
                .unwrap_err();

            assert!(err.to_string().contains("No free student number"));
            assert_eq!(store.event_count().await, 1);
        }
    }

    mod course_cache {
        use super::*;

        #[tokio::test]
        async fn course_created_is_cached() {
            let cache = CourseReferenceCache::new();
            let handler = CourseCreatedHandler::new(cache.clone());
            let course_id = AggregateId::new();

            handler
                .handle(&IntegrationEvent::new(IntegrationPayload::CourseCreated {
                    course_id,
                    course_code: "HIS105".into(),
                    title: "World History".into(),
                    description: "From antiquity to today".into(),
                    credits: 3,
                    department_id: DepartmentId::new(),
                    coordinator_id: UserId::new(),
                    max_capacity: 80,
                    is_borrowable: true,
                    semester: "Spring".into(),
                    academic_year: 2027,
                    prerequisites: Vec::new(),
                }))
                .await
                .unwrap();

            assert_eq!(cache.len().await, 1);
            let reference = cache.get(course_id).await.unwrap();
            assert_eq!(reference.course_code, "HIS105");
            assert_eq!(reference.credits, 3);
        }
    }
}
