//! `tickjob-core`: configuration and shared error types for the tickjob
//! orchestrator.
//!
//! Configuration is layered with figment: built-in defaults, then a TOML file,
//! then `TICKJOB_*` environment overrides (`__` separates nested keys).

pub mod config;
pub mod error;

pub use config::TickjobConfig;
pub use error::{CoreError, Result};
