//! tickjob-scheduler: job definitions and their registration with the host
//! scheduler.
//!
//! - [`types`]: job names, triggers, restart policy and visibility
//! - [`schedule`]: next-fire computation for a trigger
//! - [`gateway`]: the host scheduler seam (`SchedulerGateway` → `GatewaySession` → `JobHandle`)
//! - [`schtasks`]: Windows Task Scheduler via `schtasks.exe` and task XML
//! - [`memory`]: in-process host for dry runs and tests
//! - [`registrar`]: idempotent delete-then-create registration
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chrono::NaiveTime;
//! use tickjob_scheduler::memory::InMemoryGateway;
//! use tickjob_scheduler::registrar::TaskRegistrar;
//! use tickjob_scheduler::types::*;
//!
//! let gateway = InMemoryGateway::new();
//! let job = ScheduledJobDefinition {
//!     name: JobName::new("S1_Daily_SignalPipeline").unwrap(),
//!     action: JobAction::new("tickjob.exe").arg("run").arg("daily"),
//!     trigger: Trigger::Daily { at: NaiveTime::from_hms_opt(20, 15, 0).unwrap() },
//!     retry: RetrySettings::default(),
//!     visibility: Visibility::Hidden,
//!     description: "daily pipeline".to_string(),
//!     display_name: None,
//! };
//! let report = TaskRegistrar::new(&gateway, "\\").register(&[job]).unwrap();
//! assert!(report.succeeded());
//! ```

pub mod error;
pub mod gateway;
pub mod memory;
pub mod registrar;
pub mod retry;
pub mod schedule;
pub mod schtasks;
pub mod types;
pub mod xml;

pub use error::{Result, SchedulerError};
pub use gateway::{DeleteOutcome, GatewaySession, JobHandle, SchedulerGateway};
pub use registrar::{RegistrationReport, TaskRegistrar};
