//! Generic job runner layered over the [`ProcessScheduler`].
//!
//! The runner turns [`JobInfo`]s into process descriptors, keeps a
//! [`JobMeta`] per job in sync with scheduler callbacks, forwards completion
//! and realtime stdio to its [`JobNotificationBus`], and finally asks a
//! client-supplied payload producer to turn the collected metadata into
//! typed artifacts.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::core::job::{Job, JobData, JobDataMap, JobId, JobInfo, JobMeta, JobResult};
use crate::core::notification::JobNotificationBus;
use crate::core::process::{
    ExitCondition, LaunchResult, ProcessCallbackResult, ProcessCallbacks, ProcessDescriptor,
    ProcessId, ProcessLauncher, ReturnCode, SchedulerResult, StdBuffers, StdContent, StdRouting,
};
use crate::core::scheduler::ProcessScheduler;
use crate::core::SchedulerError;

/// Per-run settings for [`JobRunner::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Routing for every job's stdout.
    pub std_out_routing: StdRouting,
    /// Routing for every job's stderr.
    pub std_err_routing: StdRouting,
    /// Maximum lifetime of a single job.
    pub job_timeout: Option<Duration>,
    /// Maximum duration of the whole run.
    pub runner_timeout: Option<Duration>,
}

impl RunOptions {
    /// Set stream routing.
    #[must_use]
    pub const fn with_routing(mut self, std_out: StdRouting, std_err: StdRouting) -> Self {
        self.std_out_routing = std_out;
        self.std_err_routing = std_err;
        self
    }

    /// Set the per-job timeout.
    #[must_use]
    pub const fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Set the whole-run timeout.
    #[must_use]
    pub const fn with_runner_timeout(mut self, timeout: Duration) -> Self {
        self.runner_timeout = Some(timeout);
        self
    }
}

/// Runs jobs as processes and collects typed results.
///
/// `A` is the client metadata carried by each [`JobInfo`].
pub struct JobRunner<A, L: ProcessLauncher> {
    scheduler: ProcessScheduler<L>,
    notifications: JobNotificationBus<A>,
}

impl<A, L: ProcessLauncher> JobRunner<A, L> {
    /// Create a runner with `max_concurrent_processes` slots.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `max_concurrent_processes` is zero.
    pub fn new(max_concurrent_processes: usize, launcher: L) -> Result<Self, SchedulerError> {
        Ok(Self {
            scheduler: ProcessScheduler::new(max_concurrent_processes, launcher)?,
            notifications: JobNotificationBus::new(),
        })
    }

    /// Set the scheduler's pause between polling sweeps.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.scheduler = self.scheduler.with_poll_interval(poll_interval);
        self
    }

    /// Bus on which job notifications are published.
    pub const fn notifications(&self) -> &JobNotificationBus<A> {
        &self.notifications
    }

    /// The underlying process scheduler.
    pub const fn scheduler(&self) -> &ProcessScheduler<L> {
        &self.scheduler
    }

    /// Maximum number of jobs running at once.
    #[must_use]
    pub const fn max_concurrent_processes(&self) -> usize {
        self.scheduler.max_concurrent_processes()
    }

    /// Run `job_infos` and build the final job list.
    ///
    /// After the scheduler returns (gracefully, by timeout, or by abort),
    /// `payload_producer` is called once with the final metadata of every
    /// job and returns the payload for whichever ids it chooses. The returned
    /// jobs are in `job_infos` order; ids missing from the producer's map get
    /// no payload.
    ///
    /// # Errors
    ///
    /// Returns the scheduler's precondition errors, plus
    /// `SchedulerError::DuplicateJobId` if two jobs share an id.
    pub fn execute<P, F>(
        &self,
        job_infos: Vec<JobInfo<A>>,
        payload_producer: F,
        options: RunOptions,
    ) -> Result<(SchedulerResult, Vec<Job<A, P>>), SchedulerError>
    where
        F: FnOnce(&JobDataMap<'_, A>) -> HashMap<JobId, P>,
    {
        if job_infos.is_empty() {
            return Err(SchedulerError::EmptySchedule);
        }
        let mut seen = HashSet::with_capacity(job_infos.len());
        if let Some(duplicate) = job_infos.iter().find(|job| !seen.insert(job.id)) {
            return Err(SchedulerError::DuplicateJobId(duplicate.id));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("job_run", run_id = %run_id, jobs = job_infos.len());
        let _enter = span.enter();

        let processes: Vec<ProcessDescriptor> = job_infos
            .iter()
            .map(|job| ProcessDescriptor {
                id: job.id,
                std_out_routing: options.std_out_routing,
                std_err_routing: options.std_err_routing,
                command: job.command.clone(),
            })
            .collect();
        let mut job_data: JobDataMap<'_, A> = job_infos
            .iter()
            .map(|job| {
                (
                    job.id,
                    JobData {
                        info: job,
                        meta: JobMeta::default(),
                    },
                )
            })
            .collect();

        let result = {
            let mut notifier = RunNotifier {
                job_data: &mut job_data,
                notifications: &self.notifications,
            };
            self.scheduler.execute(
                processes,
                options.job_timeout,
                options.runner_timeout,
                &mut notifier,
            )?
        };

        let mut payloads = payload_producer(&job_data);
        let mut metas: HashMap<JobId, JobMeta> = job_data
            .into_iter()
            .map(|(id, data)| (id, data.meta))
            .collect();

        let jobs: Vec<Job<A, P>> = job_infos
            .into_iter()
            .map(|info| {
                let meta = metas.remove(&info.id).unwrap_or_default();
                let payload = payloads.remove(&info.id);
                Job::new(info, meta, payload)
            })
            .collect();

        info!(
            result = ?result,
            succeeded = jobs
                .iter()
                .filter(|job| job.result() == JobResult::ExecutedWithSuccess)
                .count(),
            "job run finished"
        );
        Ok((result, jobs))
    }
}

/// Scheduler callbacks for a single run: updates job metadata and forwards
/// notifications to the bus.
struct RunNotifier<'r, 'a, A> {
    job_data: &'r mut JobDataMap<'a, A>,
    notifications: &'r JobNotificationBus<A>,
}

impl<A> ProcessCallbacks for RunNotifier<'_, '_, A> {
    fn on_launch(
        &mut self,
        id: ProcessId,
        result: LaunchResult,
        launch_time: Instant,
    ) -> ProcessCallbackResult {
        let Some(data) = self.job_data.get_mut(&id) else {
            return ProcessCallbackResult::Continue;
        };

        match result {
            LaunchResult::Success => {
                data.meta.start_time = Some(launch_time);
                ProcessCallbackResult::Continue
            }
            LaunchResult::Failure => {
                data.meta.result = JobResult::FailedToExecute;
                debug!(job_id = id, "job failed to execute");
                self.notifications
                    .notify_job_complete(data.info, &data.meta, &StdContent::default())
            }
        }
    }

    fn on_exit(
        &mut self,
        id: ProcessId,
        condition: ExitCondition,
        return_code: Option<ReturnCode>,
        std_content: StdContent,
        exit_time: Instant,
    ) -> ProcessCallbackResult {
        let Some(data) = self.job_data.get_mut(&id) else {
            return ProcessCallbackResult::Continue;
        };

        data.meta.duration = data
            .meta
            .start_time
            .map(|started| exit_time.saturating_duration_since(started));
        data.meta.return_code = return_code;
        data.meta.result = JobResult::from_exit(condition, return_code);
        debug!(
            job_id = id,
            result = ?data.meta.result,
            return_code = ?return_code,
            "job complete"
        );
        self.notifications
            .notify_job_complete(data.info, &data.meta, &std_content)
    }

    fn on_std_content(&mut self, id: ProcessId, buffers: &StdBuffers<'_>) {
        if let Some(data) = self.job_data.get(&id) {
            self.notifications
                .notify_realtime_std_content(data.info, buffers);
        }
    }
}
