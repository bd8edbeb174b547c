//! Tests for builder modules

use prometheus_process_pool::builders::{build_scheduler, RunnerBuilder};
use prometheus_process_pool::config::SchedulerConfig;
use prometheus_process_pool::core::{CommandLine, JobInfo, JobResult, SchedulerResult, StdRouting};
use prometheus_process_pool::infra::{ProcessScript, ScriptedLauncher};
use std::collections::HashMap;
use std::time::Duration;

fn config() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_processes: 3,
        process_timeout_ms: Some(250),
        schedule_timeout_ms: None,
        poll_interval_ms: 0,
        std_out_routing: StdRouting::ToParent,
        std_err_routing: StdRouting::None,
    }
}

#[test]
fn test_runner_builder_run_options() {
    let builder = RunnerBuilder::new(config());
    assert_eq!(builder.config().max_concurrent_processes, 3);

    let options = builder.run_options();
    assert_eq!(options.job_timeout, Some(Duration::from_millis(250)));
    assert_eq!(options.runner_timeout, None);
    assert_eq!(options.std_out_routing, StdRouting::ToParent);
    assert_eq!(options.std_err_routing, StdRouting::None);
}

#[test]
fn test_runner_builder_builds_runner() {
    let builder = RunnerBuilder::new(config());
    let runner = builder
        .build_with_launcher::<(), _>(ScriptedLauncher::new(ProcessScript::exits_with(0)))
        .unwrap();
    assert_eq!(runner.max_concurrent_processes(), 3);
    assert!(runner.scheduler().poll_interval().is_zero());

    let (result, jobs) = runner
        .execute(
            vec![JobInfo::new(1, CommandLine::new("scripted"), ())],
            |_| HashMap::<u64, ()>::new(),
            builder.run_options(),
        )
        .unwrap();
    assert_eq!(result, SchedulerResult::Graceful);
    assert_eq!(jobs[0].result(), JobResult::ExecutedWithSuccess);
}

#[test]
fn test_runner_builder_rejects_invalid_config() {
    let builder = RunnerBuilder::new(SchedulerConfig {
        max_concurrent_processes: 0,
        ..config()
    });
    let err = builder.build::<()>().err().unwrap();
    assert!(err.to_string().contains("max_concurrent_processes"));
}

#[test]
fn test_build_scheduler_applies_poll_interval() {
    let scheduler = build_scheduler(
        &SchedulerConfig {
            poll_interval_ms: 5,
            ..config()
        },
        ScriptedLauncher::default(),
    )
    .unwrap();
    assert_eq!(scheduler.max_concurrent_processes(), 3);
    assert_eq!(scheduler.poll_interval(), Duration::from_millis(5));
}
