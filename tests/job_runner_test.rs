//! Integration tests for JobRunner
//!
//! These tests validate:
//! - Job result classification from scheduler outcomes
//! - Payload production and ordering
//! - Notification bus subscribers and abort votes
//! - Jobs left unexecuted by timeouts and aborts

use parking_lot::Mutex;
use prometheus_process_pool::core::{
    CommandLine, JobId, JobInfo, JobMeta, JobNotificationHandler, JobResult, JobRunner,
    ProcessCallbackResult, RunOptions, SchedulerError, SchedulerResult, StdBuffers, StdContent,
    StdRouting, PROCESS_TIMEOUT_RETURN_CODE,
};
use prometheus_process_pool::infra::{ProcessScript, ScriptedLauncher};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// HELPERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Suite {
    name: String,
}

fn jobs(ids: impl IntoIterator<Item = JobId>) -> Vec<JobInfo<Suite>> {
    ids.into_iter()
        .map(|id| {
            JobInfo::new(
                id,
                CommandLine::new("runner").args(["--suite", &format!("suite-{id}")]),
                Suite {
                    name: format!("suite-{id}"),
                },
            )
        })
        .collect()
}

fn runner(slots: usize, launcher: ScriptedLauncher) -> JobRunner<Suite, ScriptedLauncher> {
    JobRunner::new(slots, launcher).unwrap()
}

/// Payload producer that records each job's result.
fn results_payload(data: &prometheus_process_pool::core::JobDataMap<'_, Suite>) -> HashMap<JobId, JobResult> {
    data.iter().map(|(id, job)| (*id, job.meta.result)).collect()
}

/// Subscriber that records completions and realtime output.
#[derive(Default)]
struct Collector {
    completed: Mutex<Vec<(JobId, JobResult, StdContent)>>,
    realtime: Mutex<Vec<(JobId, String)>>,
    abort_on: Option<JobId>,
}

impl JobNotificationHandler<Suite> for Collector {
    fn on_job_complete(&self, job: &JobInfo<Suite>, meta: &JobMeta, std_content: &StdContent) -> ProcessCallbackResult {
        self.completed.lock().push((job.id, meta.result, std_content.clone()));
        if self.abort_on == Some(job.id) {
            ProcessCallbackResult::Abort
        } else {
            ProcessCallbackResult::Continue
        }
    }

    fn on_realtime_std_content(&self, job: &JobInfo<Suite>, buffers: &StdBuffers<'_>) {
        self.realtime.lock().push((job.id, buffers.out_delta.to_owned()));
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_all_jobs_succeed() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0).running_for(Duration::from_millis(5)));
    let runner = runner(2, launcher.clone());

    let (result, jobs) = runner
        .execute(jobs(0..4), results_payload, RunOptions::default())
        .unwrap();

    assert_eq!(result, SchedulerResult::Graceful);
    assert_eq!(jobs.len(), 4);
    assert_eq!(launcher.peak_live_processes(), 2);
    for job in &jobs {
        assert_eq!(job.result(), JobResult::ExecutedWithSuccess);
        assert_eq!(job.meta().return_code, Some(0));
        assert!(job.meta().was_launched());
        assert!(job.meta().duration.is_some());
        assert_eq!(job.payload(), Some(&JobResult::ExecutedWithSuccess));
    }
}

#[test]
fn test_mixed_outcomes_are_classified() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0))
        .with_script(1, ProcessScript::exits_with(2))
        .with_script(2, ProcessScript::failing_launch())
        .with_script(3, ProcessScript::exits_with(0).running_for(Duration::from_secs(30)));
    let runner = runner(2, launcher);
    let options = RunOptions::default().with_job_timeout(Duration::from_millis(50));

    let (result, jobs) = runner.execute(jobs(0..4), results_payload, options).unwrap();

    assert_eq!(result, SchedulerResult::Graceful);
    let results: Vec<_> = jobs.iter().map(|job| job.result()).collect();
    assert_eq!(
        results,
        vec![
            JobResult::ExecutedWithSuccess,
            JobResult::ExecutedWithFailure,
            JobResult::FailedToExecute,
            JobResult::Timeout,
        ]
    );
    assert_eq!(jobs[1].meta().return_code, Some(2));
    assert!(!jobs[2].meta().was_launched());
    assert_eq!(jobs[3].meta().return_code, Some(PROCESS_TIMEOUT_RETURN_CODE));
}

#[test]
fn test_single_job_timeout_keeps_run_graceful() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0).running_for(Duration::from_secs(30)));
    let runner = runner(1, launcher);
    let options = RunOptions::default().with_job_timeout(Duration::from_millis(50));

    let (result, jobs) = runner.execute(jobs([1]), results_payload, options).unwrap();

    assert_eq!(result, SchedulerResult::Graceful);
    assert_eq!(jobs[0].result(), JobResult::Timeout);
}

#[test]
fn test_runner_timeout_leaves_queued_jobs_not_executed() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0).running_for(Duration::from_secs(30)));
    let runner = runner(1, launcher);
    let options = RunOptions::default().with_runner_timeout(Duration::from_millis(50));

    let (result, jobs) = runner.execute(jobs(0..3), results_payload, options).unwrap();

    assert_eq!(result, SchedulerResult::Timeout);
    assert_eq!(jobs[0].result(), JobResult::Timeout);
    assert_eq!(jobs[1].result(), JobResult::NotExecuted);
    assert_eq!(jobs[2].result(), JobResult::NotExecuted);
    assert!(jobs[1].meta().start_time.is_none());
}

// ============================================================================
// PAYLOADS
// ============================================================================

#[test]
fn test_payloads_follow_input_order_and_missing_ids() {
    let runner = runner(3, ScriptedLauncher::new(ProcessScript::exits_with(0)));

    let (_, jobs) = runner
        .execute(
            jobs([30, 10, 20]),
            |data| {
                assert_eq!(data.len(), 3);
                data.values()
                    .filter(|job| job.info.id != 10)
                    .map(|job| (job.info.id, job.info.additional_info.name.clone()))
                    .collect()
            },
            RunOptions::default(),
        )
        .unwrap();

    let ids: Vec<_> = jobs.iter().map(|job| job.id()).collect();
    assert_eq!(ids, vec![30, 10, 20]);
    assert_eq!(jobs[0].payload().map(String::as_str), Some("suite-30"));
    assert_eq!(jobs[1].payload(), None);
    assert_eq!(jobs[2].payload().map(String::as_str), Some("suite-20"));
    assert_eq!(jobs[1].info().additional_info.name, "suite-10");
}

#[test]
fn test_payload_producer_sees_captured_output_meta() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(4));
    let runner = runner(1, launcher);

    let (_, jobs) = runner
        .execute(
            jobs([1]),
            |data| {
                data.iter()
                    .filter_map(|(id, job)| job.meta.return_code.map(|code| (*id, code)))
                    .collect()
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(jobs[0].payload(), Some(&4));
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[test]
fn test_notifications_report_every_job() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0).with_std_out("ok"))
        .with_script(2, ProcessScript::failing_launch());
    let runner = runner(2, launcher);
    let collector = Arc::new(Collector::default());
    runner.notifications().subscribe(collector.clone());

    runner
        .execute(
            jobs(0..3),
            results_payload,
            RunOptions::default().with_routing(StdRouting::ToParent, StdRouting::None),
        )
        .unwrap();

    let completed = collector.completed.lock();
    assert_eq!(completed.len(), 3);
    let failed = completed.iter().find(|(id, _, _)| *id == 2).unwrap();
    assert_eq!(failed.1, JobResult::FailedToExecute);
    assert_eq!(failed.2, StdContent::default());

    let succeeded = completed.iter().find(|(id, _, _)| *id == 0).unwrap();
    assert_eq!(succeeded.1, JobResult::ExecutedWithSuccess);
    assert_eq!(succeeded.2.out.as_deref(), Some("ok"));
    assert_eq!(succeeded.2.err, None);

    assert!(collector.realtime.lock().contains(&(0, "ok".to_owned())));
}

#[test]
fn test_subscriber_abort_stops_run() {
    let launcher = ScriptedLauncher::new(ProcessScript::exits_with(0).running_for(Duration::from_secs(30)))
        .with_script(0, ProcessScript::exits_with(1));
    let runner = runner(2, launcher.clone());
    let collector = Arc::new(Collector {
        abort_on: Some(0),
        ..Collector::default()
    });
    runner.notifications().subscribe(collector);

    let (result, jobs) = runner.execute(jobs(0..4), results_payload, RunOptions::default()).unwrap();

    assert_eq!(result, SchedulerResult::UserAborted);
    assert_eq!(jobs[0].result(), JobResult::ExecutedWithFailure);
    assert_eq!(jobs[1].result(), JobResult::Terminated);
    assert_eq!(jobs[2].result(), JobResult::NotExecuted);
    assert_eq!(jobs[3].result(), JobResult::NotExecuted);
    assert_eq!(launcher.live_processes(), 0);
}

// ============================================================================
// PRECONDITIONS
// ============================================================================

#[test]
fn test_preconditions() {
    assert!(matches!(
        JobRunner::<Suite, _>::new(0, ScriptedLauncher::default()),
        Err(SchedulerError::InvalidConfig(_))
    ));

    let runner = runner(1, ScriptedLauncher::default());
    let empty = runner.execute(Vec::new(), results_payload, RunOptions::default());
    assert!(matches!(empty, Err(SchedulerError::EmptySchedule)));

    let duplicate = runner.execute(jobs([1, 2, 1]), results_payload, RunOptions::default());
    assert!(matches!(duplicate, Err(SchedulerError::DuplicateJobId(1))));

    let zero_timeout = runner.execute(
        jobs([1]),
        results_payload,
        RunOptions::default().with_job_timeout(Duration::ZERO),
    );
    assert!(matches!(zero_timeout, Err(SchedulerError::InvalidTimeout(_))));
}
