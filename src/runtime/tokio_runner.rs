//! Tokio adapter for [`JobRunner`].
//!
//! The scheduler's polling loop is blocking by nature, so async callers run it
//! on tokio's blocking thread pool instead of a runtime worker.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{
    Job, JobDataMap, JobId, JobInfo, JobRunner, ProcessLauncher, RunOptions, SchedulerError,
    SchedulerResult,
};

impl<A, L> JobRunner<A, L>
where
    A: Send + Sync + 'static,
    L: ProcessLauncher + Send + Sync + 'static,
{
    /// Run jobs without blocking the async runtime.
    ///
    /// Behaves exactly like [`JobRunner::execute`], with the run executed by
    /// `tokio::task::spawn_blocking`. Notification handlers are invoked from
    /// that blocking thread.
    ///
    /// # Errors
    ///
    /// Returns the same precondition errors as [`JobRunner::execute`], and
    /// `SchedulerError::Internal` if the blocking task panicked or was cancelled.
    pub async fn execute_async<P, F>(
        self: Arc<Self>,
        job_infos: Vec<JobInfo<A>>,
        payload_producer: F,
        options: RunOptions,
    ) -> Result<(SchedulerResult, Vec<Job<A, P>>), SchedulerError>
    where
        P: Send + 'static,
        F: FnOnce(&JobDataMap<'_, A>) -> HashMap<JobId, P> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.execute(job_infos, payload_producer, options))
            .await
            .map_err(|e| SchedulerError::Internal(format!("job run task failed: {e}")))?
    }
}
