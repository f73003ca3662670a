//! In-process host scheduler.
//!
//! Backs `register --dry-run` and the registrar tests. It keeps one job per
//! `(folder, name)`, can be told to be unreachable or to reject particular
//! operations, and can fire a job the way the host would (including bounded
//! restarts).

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::gateway::{DeleteOutcome, GatewaySession, JobHandle, RegisteredJob, SchedulerGateway};
use crate::retry::{RestartDecision, RestartTracker};
use crate::types::{JobAction, JobName, ScheduledJobDefinition};

type JobKey = (String, JobName);

#[derive(Debug, Default)]
struct HostState {
    jobs: BTreeMap<JobKey, RegisteredJob>,
    unreachable: bool,
    fail_delete: HashSet<String>,
    fail_create: HashSet<String>,
    fail_commit: HashSet<String>,
    open_sessions: usize,
}

/// A scheduler namespace held in memory. Clones share the same namespace.
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    state: Arc<Mutex<HostState>>,
    inline_visibility: bool,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// A reachable host that accepts visibility attributes at creation time.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState::default())),
            inline_visibility: true,
        }
    }

    /// Model a host that needs a separate mutate-and-commit phase for the
    /// display name and hidden flag.
    pub fn with_two_phase_visibility(mut self) -> Self {
        self.inline_visibility = false;
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Make deleting `name` fail with a host error.
    pub fn fail_delete_of(&self, name: &str) {
        self.state().fail_delete.insert(name.to_string());
    }

    /// Make creating `name` fail with a host error.
    pub fn fail_create_of(&self, name: &str) {
        self.state().fail_create.insert(name.to_string());
    }

    /// Make committing visibility changes for `name` fail.
    pub fn fail_commit_of(&self, name: &str) {
        self.state().fail_commit.insert(name.to_string());
    }

    /// Seed the namespace directly, bypassing any session.
    pub fn insert(&self, folder: &str, definition: ScheduledJobDefinition) {
        let hidden = definition.visibility.is_hidden();
        self.state().jobs.insert(
            (folder.to_string(), definition.name.clone()),
            RegisteredJob { definition, hidden },
        );
    }

    pub fn get(&self, folder: &str, name: &JobName) -> Option<RegisteredJob> {
        self.state()
            .jobs
            .get(&(folder.to_string(), name.clone()))
            .cloned()
    }

    /// Number of jobs in `folder`.
    pub fn count(&self, folder: &str) -> usize {
        self.state().jobs.keys().filter(|(f, _)| f == folder).count()
    }

    pub fn open_sessions(&self) -> usize {
        self.state().open_sessions
    }

    /// Fire `name` once, as its trigger would, running the action through
    /// `launch` (which returns the process exit code). Failed runs are
    /// relaunched according to the job's restart policy. Returns `None` when
    /// no such job exists.
    pub fn fire<F>(&self, folder: &str, name: &JobName, mut launch: F) -> Option<FireReport>
    where
        F: FnMut(&JobAction) -> i32,
    {
        let job = self.get(folder, name)?;
        let mut tracker = RestartTracker::new(&job.definition.retry);
        let mut launches = 0;
        let mut last_exit;

        loop {
            launches += 1;
            last_exit = launch(&job.definition.action);
            match tracker.record_exit(last_exit == 0) {
                RestartDecision::Done => break,
                RestartDecision::Relaunch { attempt, after } => {
                    debug!(job = %name, attempt, wait = ?after, "relaunching failed job");
                }
                RestartDecision::GiveUp => {
                    info!(job = %name, launches, "restart budget exhausted");
                    break;
                }
            }
        }

        Some(FireReport {
            launches,
            last_exit,
            succeeded: last_exit == 0,
        })
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of [`InMemoryGateway::fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireReport {
    /// Total process launches, the first run included.
    pub launches: u32,
    pub last_exit: i32,
    pub succeeded: bool,
}

impl SchedulerGateway for InMemoryGateway {
    type Session = InMemorySession;

    fn connect(&self) -> Result<InMemorySession> {
        let mut state = self.state();
        if state.unreachable {
            return Err(SchedulerError::Connection(
                "in-memory scheduler is offline".to_string(),
            ));
        }
        state.open_sessions += 1;
        Ok(InMemorySession {
            gateway: self.clone(),
        })
    }
}

/// Session against an [`InMemoryGateway`]. Released on drop.
#[derive(Debug)]
pub struct InMemorySession {
    gateway: InMemoryGateway,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        let mut state = self.gateway.state();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }
}

impl GatewaySession for InMemorySession {
    fn delete_job(&mut self, folder: &str, name: &JobName) -> Result<DeleteOutcome> {
        let mut state = self.gateway.state();
        if state.fail_delete.contains(name.as_str()) {
            return Err(SchedulerError::Delete {
                name: name.to_string(),
                reason: "access denied".to_string(),
            });
        }
        match state.jobs.remove(&(folder.to_string(), name.clone())) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    fn create_job<'s>(
        &'s mut self,
        folder: &str,
        definition: &ScheduledJobDefinition,
        replace: bool,
    ) -> Result<Box<dyn JobHandle + 's>> {
        let mut state = self.gateway.state();
        let name = definition.name.clone();
        if state.fail_create.contains(name.as_str()) {
            return Err(SchedulerError::Create {
                name: name.to_string(),
                reason: "the host rejected the definition".to_string(),
            });
        }

        let key = (folder.to_string(), name.clone());
        if !replace && state.jobs.contains_key(&key) {
            return Err(SchedulerError::Create {
                name: name.to_string(),
                reason: "a job with this name already exists".to_string(),
            });
        }

        let mut stored = definition.clone();
        let hidden = if self.gateway.inline_visibility {
            definition.visibility.is_hidden()
        } else {
            // This host only learns about visibility through the handle.
            stored.display_name = None;
            false
        };
        state.jobs.insert(
            key.clone(),
            RegisteredJob {
                definition: stored,
                hidden,
            },
        );

        Ok(Box::new(InMemoryHandle {
            gateway: self.gateway.clone(),
            key,
            display_name: None,
            hidden: None,
        }))
    }

    fn job_exists(&mut self, folder: &str, name: &JobName) -> Result<bool> {
        Ok(self
            .gateway
            .state()
            .jobs
            .contains_key(&(folder.to_string(), name.clone())))
    }

    fn supports_inline_visibility(&self) -> bool {
        self.gateway.inline_visibility
    }
}

struct InMemoryHandle {
    gateway: InMemoryGateway,
    key: JobKey,
    display_name: Option<String>,
    hidden: Option<bool>,
}

impl JobHandle for InMemoryHandle {
    fn name(&self) -> &JobName {
        &self.key.1
    }

    fn set_display_name(&mut self, display_name: &str) {
        self.display_name = Some(display_name.to_string());
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = Some(hidden);
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryHandle {
            gateway,
            key,
            display_name,
            hidden,
        } = *self;
        let mut state = gateway.state();
        let name = key.1.to_string();
        if state.fail_commit.contains(&name) {
            return Err(SchedulerError::Mutate {
                name,
                reason: "commit rejected".to_string(),
            });
        }
        let job = state.jobs.get_mut(&key).ok_or_else(|| SchedulerError::Mutate {
            name: name.clone(),
            reason: "job disappeared before commit".to_string(),
        })?;
        if let Some(display_name) = display_name {
            job.definition.display_name = Some(display_name);
        }
        if let Some(hidden) = hidden {
            job.hidden = hidden;
        }
        Ok(())
    }
}
