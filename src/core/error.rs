//! Error types for scheduler and launcher operations.

use thiserror::Error;

use crate::core::process::ProcessId;

/// Errors produced by scheduler components.
///
/// Every variant signals a programmer error detected before or around a run
/// (bad configuration, misuse of the API). Runtime process failures are never
/// reported here; they flow through the callbacks instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler or runner configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A run was requested with nothing to run.
    #[error("no processes to schedule")]
    EmptySchedule,
    /// A timeout was supplied with a zero duration.
    #[error("{0} timeout must be greater than zero")]
    InvalidTimeout(&'static str),
    /// `execute` was called while another run is still in flight.
    #[error("scheduler is already executing a run")]
    AlreadyRunning,
    /// Two jobs in the same run share an id.
    #[error("duplicate job id {0}")]
    DuplicateJobId(ProcessId),
    /// Runtime adapter failure (e.g. the blocking task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while constructing a process from its descriptor.
///
/// These are caught at the launch site and converted into a
/// [`LaunchResult::Failure`](crate::core::LaunchResult::Failure) notification.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The descriptor's command line has no program.
    #[error("empty command line")]
    EmptyCommand,
    /// The OS refused to spawn the program.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The launcher declined to start the process.
    #[error("launch rejected: {0}")]
    Rejected(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
