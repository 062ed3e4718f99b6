//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::{DepartmentId, UserId};
use domain::DEFAULT_MAX_ATTEMPTS;
use messaging::{BusConfig, DispatcherConfig};

use crate::error::{PlatformError, Result};

/// Placeholder coordinator that takes over courses of departing coordinators.
pub const DEFAULT_COORDINATOR_ID: &str = "99999999-9999-9999-9999-999999999999";

/// Department given to student records created from user sign-ups.
pub const DEFAULT_DEPARTMENT_ID: &str = "11111111-1111-1111-1111-111111111111";

pub const DEFAULT_PROGRAM: &str = "Undergraduate";

/// How log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Where the services keep their events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Postgres,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "postgres" => Ok(StorageKind::Postgres),
            other => Err(format!("expected `memory` or `postgres`, got `{other}`")),
        }
    }
}

/// Platform configuration with defaults for local runs.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address of the operations endpoint (`0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (`info`)
/// - `LOG_FORMAT`: `pretty` or `json` (`pretty`)
/// - `STORAGE`: `memory` or `postgres` (`memory`)
/// - `COURSE_CATALOG_DATABASE_URL`, `REGISTRATION_DATABASE_URL`,
///   `STUDENT_ACADEMIC_DATABASE_URL`: required with `STORAGE=postgres`
/// - `DEFAULT_COORDINATOR_ID`, `DEFAULT_DEPARTMENT_ID`, `DEFAULT_PROGRAM`
/// - `COMMAND_MAX_ATTEMPTS`: attempts per command under write conflicts (`3`)
/// - `OUTBOX_BATCH_SIZE` (`100`), `OUTBOX_POLL_INTERVAL_MS` (`500`),
///   `OUTBOX_MAX_BACKOFF_MS` (`30000`)
/// - `BUS_MAX_REDELIVERIES` (`3`), `BUS_REDELIVERY_DELAY_MS` (`100`),
///   `BUS_HISTORY_LIMIT` (`1000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageKind,
    pub course_catalog_database_url: Option<String>,
    pub registration_database_url: Option<String>,
    pub student_academic_database_url: Option<String>,
    pub default_coordinator_id: UserId,
    pub default_department_id: DepartmentId,
    pub default_program: String,
    pub command_max_attempts: u32,
    pub outbox: DispatcherConfig,
    pub bus: BusConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset ones. A set but malformed variable is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let vars = Vars(&lookup);

        Ok(Self {
            host: vars.string("HOST").unwrap_or(defaults.host),
            port: vars.parse("PORT")?.unwrap_or(defaults.port),
            log_level: vars.string("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: vars.parse("LOG_FORMAT")?.unwrap_or(defaults.log_format),
            storage: vars.parse("STORAGE")?.unwrap_or(defaults.storage),
            course_catalog_database_url: vars.string("COURSE_CATALOG_DATABASE_URL"),
            registration_database_url: vars.string("REGISTRATION_DATABASE_URL"),
            student_academic_database_url: vars.string("STUDENT_ACADEMIC_DATABASE_URL"),
            default_coordinator_id: vars
                .parse("DEFAULT_COORDINATOR_ID")?
                .unwrap_or(defaults.default_coordinator_id),
            default_department_id: vars
                .parse("DEFAULT_DEPARTMENT_ID")?
                .unwrap_or(defaults.default_department_id),
            default_program: vars
                .string("DEFAULT_PROGRAM")
                .unwrap_or(defaults.default_program),
            command_max_attempts: vars
                .parse::<u32>("COMMAND_MAX_ATTEMPTS")?
                .unwrap_or(defaults.command_max_attempts)
                .max(1),
            outbox: DispatcherConfig {
                batch_size: vars
                    .parse::<usize>("OUTBOX_BATCH_SIZE")?
                    .unwrap_or(defaults.outbox.batch_size)
                    .max(1),
                poll_interval: vars
                    .millis("OUTBOX_POLL_INTERVAL_MS")?
                    .unwrap_or(defaults.outbox.poll_interval),
                max_backoff: vars
                    .millis("OUTBOX_MAX_BACKOFF_MS")?
                    .unwrap_or(defaults.outbox.max_backoff),
            },
            bus: BusConfig {
                max_redeliveries: vars
                    .parse("BUS_MAX_REDELIVERIES")?
                    .unwrap_or(defaults.bus.max_redeliveries),
                redelivery_delay: vars
                    .millis("BUS_REDELIVERY_DELAY_MS")?
                    .unwrap_or(defaults.bus.redelivery_delay),
                history_limit: vars
                    .parse("BUS_HISTORY_LIMIT")?
                    .unwrap_or(defaults.bus.history_limit),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            storage: StorageKind::Memory,
            course_catalog_database_url: None,
            registration_database_url: None,
            student_academic_database_url: None,
            default_coordinator_id: UserId::from_uuid(uuid::Uuid::from_u128(
                0x99999999_9999_9999_9999_999999999999,
            )),
            default_department_id: DepartmentId::from_uuid(uuid::Uuid::from_u128(
                0x11111111_1111_1111_1111_111111111111,
            )),
            default_program: DEFAULT_PROGRAM.to_string(),
            command_max_attempts: DEFAULT_MAX_ATTEMPTS,
            outbox: DispatcherConfig::default(),
            bus: BusConfig::default(),
        }
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(name)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|e: T::Err| PlatformError::InvalidConfig {
                        name,
                        reason: e.to_string(),
                        value,
                    })
            })
            .transpose()
    }

    fn millis(&self, name: &'static str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }
}
