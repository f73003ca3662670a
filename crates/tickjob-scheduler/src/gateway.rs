//! The host scheduler, seen from the orchestrator.
//!
//! A [`SchedulerGateway`] hands out a [`GatewaySession`] on `connect`. The
//! session is the explicit connection handle: it is opened once at the start
//! of a run, passed to whoever needs it, and released by `close` (or on drop).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{JobName, ScheduledJobDefinition};

/// Result of deleting a job by name. Absence is a normal outcome, not an
/// error; a genuine failure comes back as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// A job as the host currently holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredJob {
    pub definition: ScheduledJobDefinition,
    /// Set by the post-create mutate phase when the host needed one.
    pub hidden: bool,
}

/// Entry point to a host scheduler.
pub trait SchedulerGateway {
    type Session: GatewaySession;

    /// Open a session. Fails with `SchedulerError::Connection` when the host
    /// scheduler cannot be reached.
    fn connect(&self) -> Result<Self::Session>;
}

/// An open connection to the host scheduler.
pub trait GatewaySession {
    /// Delete `name` from `folder`.
    fn delete_job(&mut self, folder: &str, name: &JobName) -> Result<DeleteOutcome>;

    /// Create a job from `definition`. With `replace` set, an existing job of
    /// the same name is overwritten instead of rejected.
    fn create_job<'s>(
        &'s mut self,
        folder: &str,
        definition: &ScheduledJobDefinition,
        replace: bool,
    ) -> Result<Box<dyn JobHandle + 's>>;

    /// Whether a job called `name` exists in `folder`.
    fn job_exists(&mut self, folder: &str, name: &JobName) -> Result<bool>;

    /// Whether `create_job` already applies display name and hidden flag.
    /// When `false`, the caller must run the mutate-and-commit phase.
    fn supports_inline_visibility(&self) -> bool;

    /// Release the connection. Dropping the session has the same effect.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// A freshly created job whose visibility attributes can still be changed.
/// Nothing set here reaches the host until `commit`.
pub trait JobHandle {
    fn name(&self) -> &JobName;
    fn set_display_name(&mut self, display_name: &str);
    fn set_hidden(&mut self, hidden: bool);
    fn commit(self: Box<Self>) -> Result<()>;
}
