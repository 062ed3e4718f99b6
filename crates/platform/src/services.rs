//! Wiring of the course catalog, registration and student academic services
//! around one message bus.

use std::sync::Arc;

use common::UserId;
use domain::{CourseService, DepartmentService, RegistrationService, StudentService};
use event_store::{
    EventStore, InMemoryEventStore, Outbox, PostgresEventStore, ProcessedEventStore,
};
use messaging::{
    DispatchReport, Endpoint, EventTranslator, IdempotentHandler, InMemoryBus,
    IntegrationEventHandler, IntegrationEventPublisher, OutboxDispatcher,
};
use projections::{ProjectionProcessor, StudentDirectoryView};
use saga::{ProjectedAssignments, ReassignmentWorkflow, SAGA_TYPE};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::consumers::course_catalog::{
    self, CoordinatorDepartureHandler, UserCreatedHandler, UserUpdatedHandler,
};
use crate::consumers::student_academic::{
    self, CourseCreatedHandler, CourseReferenceCache, StudentProvisioner,
};
use crate::error::{PlatformError, Result};

pub const REGISTRATION_SERVICE: &str = "registration";

/// Passes [`Platform::drain`] makes before giving up on quiescence.
const MAX_DRAIN_ROUNDS: usize = 32;

/// One private store per service.
#[derive(Clone)]
pub struct ServiceStores<S> {
    pub course_catalog: S,
    pub registration: S,
    pub student_academic: S,
}

impl ServiceStores<InMemoryEventStore> {
    pub fn in_memory() -> Self {
        Self {
            course_catalog: InMemoryEventStore::new(),
            registration: InMemoryEventStore::new(),
            student_academic: InMemoryEventStore::new(),
        }
    }
}

impl ServiceStores<PostgresEventStore> {
    /// Connects to and migrates each service's database.
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or(PlatformError::MissingDatabaseUrl(name))
        };
        let course_catalog = url(
            &config.course_catalog_database_url,
            "COURSE_CATALOG_DATABASE_URL",
        )?;
        let registration = url(&config.registration_database_url, "REGISTRATION_DATABASE_URL")?;
        let student_academic = url(
            &config.student_academic_database_url,
            "STUDENT_ACADEMIC_DATABASE_URL",
        )?;

        Ok(Self {
            course_catalog: PostgresEventStore::connect(&course_catalog).await?,
            registration: PostgresEventStore::connect(&registration).await?,
            student_academic: PostgresEventStore::connect(&student_academic).await?,
        })
    }
}

/// The running services: command-side services, consumers subscribed on
/// the bus, and one outbox dispatcher per service.
pub struct Platform<S: EventStore + Outbox> {
    stores: ServiceStores<S>,
    bus: InMemoryBus,
    publisher: IntegrationEventPublisher,
    courses: CourseService<S>,
    departments: DepartmentService<S>,
    registrations: RegistrationService<S>,
    students: StudentService<S>,
    reassignment: Arc<ReassignmentWorkflow<S, ProjectedAssignments<S>>>,
    student_directory: StudentDirectoryView,
    student_projections: Arc<ProjectionProcessor<S>>,
    course_references: CourseReferenceCache,
    dispatchers: Vec<Arc<OutboxDispatcher<S>>>,
}

impl<S> Platform<S>
where
    S: EventStore + Outbox + ProcessedEventStore + Clone + 'static,
{
    /// Builds the services over `stores` and subscribes every consumer.
    pub async fn start(stores: ServiceStores<S>, config: &Config) -> Self {
        let bus = InMemoryBus::with_config(config.bus.clone());
        let publisher = IntegrationEventPublisher::new(Arc::new(bus.clone()));
        let attempts = config.command_max_attempts;

        let reassignment = Arc::new(
            ReassignmentWorkflow::new(
                stores.course_catalog.clone(),
                ProjectedAssignments::over(stores.course_catalog.clone()),
                config.default_coordinator_id,
            )
            .with_max_attempts(attempts),
        );

        let student_directory = StudentDirectoryView::new();
        let mut processor = ProjectionProcessor::new(stores.student_academic.clone());
        processor.register(Box::new(student_directory.clone()));
        let student_projections = Arc::new(processor);

        let translator = EventTranslator::new().keep_private(SAGA_TYPE);
        let dispatchers = [
            (course_catalog::SERVICE, &stores.course_catalog),
            (REGISTRATION_SERVICE, &stores.registration),
            (student_academic::SERVICE, &stores.student_academic),
        ]
        .into_iter()
        .map(|(service, store)| {
            Arc::new(OutboxDispatcher::new(
                service,
                store.clone(),
                translator.clone(),
                publisher.clone(),
                config.outbox.clone(),
            ))
        })
        .collect();

        let platform = Self {
            courses: CourseService::new(stores.course_catalog.clone()).with_max_attempts(attempts),
            departments: DepartmentService::new(stores.course_catalog.clone())
                .with_max_attempts(attempts),
            registrations: RegistrationService::new(stores.registration.clone())
                .with_max_attempts(attempts),
            students: StudentService::new(stores.student_academic.clone())
                .with_max_attempts(attempts),
            stores,
            bus,
            publisher,
            reassignment,
            student_directory,
            student_projections,
            course_references: CourseReferenceCache::new(),
            dispatchers,
        };
        platform.subscribe_consumers(config).await;
        platform
    }

    async fn subscribe_consumers(&self, config: &Config) {
        let catalog = &self.stores.course_catalog;
        let departures = Arc::new(CoordinatorDepartureHandler::new(Arc::clone(
            &self.reassignment,
        )));
        self.subscribe(
            Endpoint::new("UserCreated", course_catalog::SERVICE, 5),
            catalog,
            UserCreatedHandler,
        )
        .await;
        self.subscribe(
            Endpoint::new("UserUpdated", course_catalog::SERVICE, 5),
            catalog,
            UserUpdatedHandler,
        )
        .await;
        self.subscribe(
            Endpoint::new("UserDeactivated", course_catalog::SERVICE, 3),
            catalog,
            Arc::clone(&departures),
        )
        .await;
        self.subscribe(
            Endpoint::new("UserRoleChanged", course_catalog::SERVICE, 5),
            catalog,
            departures,
        )
        .await;

        let academic = &self.stores.student_academic;
        self.subscribe(
            Endpoint::new("UserCreated", student_academic::SERVICE, 5),
            academic,
            StudentProvisioner::new(
                StudentService::new(academic.clone()).with_max_attempts(config.command_max_attempts),
                Arc::clone(&self.student_projections),
                self.student_directory.clone(),
                config.default_department_id,
                config.default_program.as_str(),
            ),
        )
        .await;
        self.subscribe(
            Endpoint::new("CourseCreated", student_academic::SERVICE, 5),
            academic,
            CourseCreatedHandler::new(self.course_references.clone()),
        )
        .await;
    }

    async fn subscribe<H>(&self, endpoint: Endpoint, processed: &S, handler: H)
    where
        H: IntegrationEventHandler + 'static,
    {
        let guarded = IdempotentHandler::new(&endpoint, processed.clone(), handler);
        self.bus.subscribe(endpoint, guarded).await;
    }

    /// Starts every outbox dispatcher; they stop when `shutdown` turns true.
    pub fn spawn_dispatchers(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.dispatchers
            .iter()
            .map(|dispatcher| {
                let dispatcher = Arc::clone(dispatcher);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { dispatcher.run(shutdown).await })
            })
            .collect()
    }

    /// Runs one dispatch pass for every service.
    pub async fn dispatch_once(&self) -> Result<DispatchReport> {
        let mut total = DispatchReport::default();
        for dispatcher in &self.dispatchers {
            let report = dispatcher.dispatch_pending().await?;
            total.published += report.published;
            total.not_published += report.not_published;
            total.dead_lettered += report.dead_lettered;
            total.failed += report.failed;
        }
        Ok(total)
    }

    /// Dispatches and waits for consumers until no service has anything left
    /// to publish, following fan-out from consumers that write events of
    /// their own.
    pub async fn drain(&self) -> Result<()> {
        for _ in 0..MAX_DRAIN_ROUNDS {
            self.bus.wait_idle().await;
            let report = self.dispatch_once().await?;
            if report.failed > 0 {
                return Err(PlatformError::BusRefused(report.failed));
            }
            if report.settled() == 0 {
                return Ok(());
            }
        }
        Err(PlatformError::NotQuiescent(MAX_DRAIN_ROUNDS))
    }

    pub fn stores(&self) -> &ServiceStores<S> {
        &self.stores
    }

    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }

    /// Publisher for events produced outside these services, such as the
    /// authentication service's user events.
    pub fn publisher(&self) -> &IntegrationEventPublisher {
        &self.publisher
    }

    pub fn courses(&self) -> &CourseService<S> {
        &self.courses
    }

    pub fn departments(&self) -> &DepartmentService<S> {
        &self.departments
    }

    pub fn registrations(&self) -> &RegistrationService<S> {
        &self.registrations
    }

    pub fn students(&self) -> &StudentService<S> {
        &self.students
    }

    pub fn reassignment(&self) -> &ReassignmentWorkflow<S, ProjectedAssignments<S>> {
        &self.reassignment
    }

    /// Student directory, caught up with the student academic store.
    pub async fn student_directory(&self) -> Result<&StudentDirectoryView> {
        self.student_projections.run_catch_up().await?;
        Ok(&self.student_directory)
    }

    pub fn course_references(&self) -> &CourseReferenceCache {
        &self.course_references
    }

    pub fn default_coordinator(&self) -> UserId {
        self.reassignment.default_coordinator()
    }
}
