//! Tests for error types

use prometheus_process_pool::core::{LaunchError, SchedulerError};
use std::error::Error;

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_concurrent_processes must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: max_concurrent_processes must be greater than 0"
    );
}

#[test]
fn test_precondition_errors() {
    assert_eq!(SchedulerError::EmptySchedule.to_string(), "no processes to schedule");
    assert_eq!(
        SchedulerError::InvalidTimeout("schedule").to_string(),
        "schedule timeout must be greater than zero"
    );
    assert_eq!(
        SchedulerError::AlreadyRunning.to_string(),
        "scheduler is already executing a run"
    );
    assert_eq!(SchedulerError::DuplicateJobId(7).to_string(), "duplicate job id 7");
}

#[test]
fn test_launch_errors() {
    assert_eq!(LaunchError::EmptyCommand.to_string(), "empty command line");
    let err = LaunchError::Rejected("quota exhausted".into());
    assert_eq!(err.to_string(), "launch rejected: quota exhausted");
    assert!(err.source().is_none());
}

#[test]
fn test_scheduler_error_converts_to_anyhow() {
    let err: anyhow::Error = SchedulerError::Internal("join failed".into()).into();
    assert_eq!(err.to_string(), "internal error: join failed");
}
