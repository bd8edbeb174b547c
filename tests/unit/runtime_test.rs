//! Tests for run reports

use prometheus_process_pool::core::{
    CommandLine, JobInfo, JobResult, JobRunner, RunOptions, SchedulerResult,
};
use prometheus_process_pool::infra::{ProcessScript, ScriptedLauncher};
use prometheus_process_pool::runtime::RunReport;
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_run_report_from_runner_output() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0))
        .with_script(2, ProcessScript::exits_with(5))
        .with_script(3, ProcessScript::failing_launch());
    let runner: JobRunner<(), _> = JobRunner::new(2, launcher).unwrap().with_poll_interval(Duration::ZERO);

    let infos = (1..=3)
        .map(|id| JobInfo::new(id, CommandLine::new("scripted").arg(id.to_string()), ()))
        .collect();
    let (result, jobs) = runner
        .execute(infos, |_| HashMap::<u64, ()>::new(), RunOptions::default())
        .unwrap();

    let report = RunReport::new(result, &jobs);
    assert_eq!(report.result, SchedulerResult::Graceful);
    assert_eq!(report.count(JobResult::ExecutedWithSuccess), 1);
    assert_eq!(report.count(JobResult::ExecutedWithFailure), 1);
    assert_eq!(report.count(JobResult::FailedToExecute), 1);
    assert_eq!(report.jobs[1].return_code, Some(5));
    assert_eq!(report.jobs[2].duration_ms, None);

    let json = report.to_json().unwrap();
    let parsed: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}
