use thiserror::Error;

/// Errors that can occur while talking to the host scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The host scheduler could not be reached. Aborts the whole run.
    #[error("Scheduler unreachable: {0}")]
    Connection(String),

    /// Looking up a job failed for a reason other than "not found".
    #[error("Failed to look up job {name}: {reason}")]
    Query { name: String, reason: String },

    /// Deleting an existing job failed for a reason other than "not found".
    #[error("Failed to delete job {name}: {reason}")]
    Delete { name: String, reason: String },

    /// The create call was rejected by the host.
    #[error("Failed to create job {name}: {reason}")]
    Create { name: String, reason: String },

    /// The post-create mutate-and-commit phase failed.
    #[error("Failed to update job {name}: {reason}")]
    Mutate { name: String, reason: String },

    /// The definition cannot be expressed (bad name, empty weekday set, …).
    #[error("Invalid job definition: {0}")]
    InvalidDefinition(String),

    /// One or more jobs failed to register. The others were still attempted.
    #[error("{count} job(s) failed to register: {names}")]
    Registration { count: usize, names: String },

    /// Underlying I/O failure (temp files, spawning the host CLI).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    /// Only a connection failure aborts the run; everything else is per job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
