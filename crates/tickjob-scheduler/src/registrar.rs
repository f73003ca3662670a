//! Idempotent registration of job definitions.
//!
//! For each definition: delete any job of the same name, create it again with
//! replace-if-exists, then run the mutate-and-commit phase when the host could
//! not take the visibility attributes at creation time. Jobs are independent:
//! one failing does not stop the rest, and nothing is rolled back.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::gateway::{DeleteOutcome, GatewaySession, SchedulerGateway};
use crate::types::{JobName, ScheduledJobDefinition};

/// What happened to the pre-existing job of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum DeletionStatus {
    Deleted,
    NotFound,
    /// Reported, but creation is still attempted.
    Failed(String),
    /// The definition was rejected before reaching the host.
    Skipped,
}

/// Outcome of the create or mutate phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum PhaseStatus {
    Done,
    /// Not needed (mutate on a host with inline visibility) or not reached.
    Skipped,
    Failed(String),
}

impl PhaseStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseStatus::Failed(_))
    }
}

/// Per-job result of a registration run.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub name: JobName,
    pub deletion: DeletionStatus,
    pub creation: PhaseStatus,
    pub mutation: PhaseStatus,
}

impl JobOutcome {
    fn new(name: JobName) -> Self {
        Self {
            name,
            deletion: DeletionStatus::Skipped,
            creation: PhaseStatus::Skipped,
            mutation: PhaseStatus::Skipped,
        }
    }

    /// Registered and, if it had one, committed its second phase.
    pub fn succeeded(&self) -> bool {
        self.creation == PhaseStatus::Done && !self.mutation.is_failed()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match (&self.creation, &self.mutation) {
            (PhaseStatus::Failed(reason), _) | (_, PhaseStatus::Failed(reason)) => Some(reason),
            _ => None,
        }
    }
}

/// Aggregated outcome of [`TaskRegistrar::register`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RegistrationReport {
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// `Ok` when every job registered, otherwise a `Registration` error
    /// naming the failed jobs.
    pub fn into_result(self) -> Result<()> {
        let failed: Vec<String> = self.failures().map(|o| o.name.to_string()).collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::Registration {
                count: failed.len(),
                names: failed.join(", "),
            })
        }
    }
}

impl fmt::Display for RegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ok = self.outcomes.iter().filter(|o| o.succeeded()).count();
        write!(f, "{ok}/{} jobs registered", self.outcomes.len())
    }
}

/// Registers job definitions against a scheduler gateway.
pub struct TaskRegistrar<'g, G: SchedulerGateway> {
    gateway: &'g G,
    folder: String,
}

impl<'g, G: SchedulerGateway> TaskRegistrar<'g, G> {
    pub fn new(gateway: &'g G, folder: impl Into<String>) -> Self {
        Self {
            gateway,
            folder: folder.into(),
        }
    }

    /// Register every definition.
    ///
    /// Fails outright only when the scheduler cannot be reached, before any
    /// job is touched. Per-job failures are collected in the report.
    pub fn register(&self, definitions: &[ScheduledJobDefinition]) -> Result<RegistrationReport> {
        let mut session = self.gateway.connect().inspect_err(|e| {
            error!("cannot connect to the host scheduler: {e}");
        })?;

        let outcomes = definitions
            .iter()
            .map(|definition| self.register_one(&mut session, definition))
            .collect();
        session.close();

        let report = RegistrationReport { outcomes };
        info!(folder = %self.folder, "{report}");
        Ok(report)
    }

    fn register_one(
        &self,
        session: &mut G::Session,
        definition: &ScheduledJobDefinition,
    ) -> JobOutcome {
        let name = &definition.name;
        let mut outcome = JobOutcome::new(name.clone());

        if let Err(e) = definition.validate() {
            warn!(job = %name, "skipping invalid definition: {e}");
            outcome.creation = PhaseStatus::Failed(e.to_string());
            return outcome;
        }

        outcome.deletion = match session.delete_job(&self.folder, name) {
            Ok(DeleteOutcome::Deleted) => {
                info!(job = %name, "deleted existing job");
                DeletionStatus::Deleted
            }
            Ok(DeleteOutcome::NotFound) => DeletionStatus::NotFound,
            Err(e) => {
                // Creation below still replaces the job if it exists.
                warn!(job = %name, "delete failed: {e}");
                DeletionStatus::Failed(e.to_string())
            }
        };

        let inline_visibility = session.supports_inline_visibility();
        let mut handle = match session.create_job(&self.folder, definition, true) {
            Ok(handle) => handle,
            Err(e) => {
                error!(job = %name, "create failed: {e}");
                outcome.creation = PhaseStatus::Failed(e.to_string());
                return outcome;
            }
        };
        outcome.creation = PhaseStatus::Done;
        info!(job = %name, trigger = %definition.trigger, visibility = %definition.visibility, "created job");

        if inline_visibility || !definition.has_visibility_attributes() {
            return outcome;
        }

        if let Some(display_name) = &definition.display_name {
            handle.set_display_name(display_name);
        }
        handle.set_hidden(definition.visibility.is_hidden());
        outcome.mutation = match handle.commit() {
            Ok(()) => {
                info!(job = %name, "committed visibility attributes");
                PhaseStatus::Done
            }
            Err(e) => {
                error!(job = %name, "mutate failed: {e}");
                PhaseStatus::Failed(e.to_string())
            }
        };
        outcome
    }
}
