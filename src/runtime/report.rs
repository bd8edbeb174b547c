//! Serializable run reports for API responses and logs.

use serde::{Deserialize, Serialize};

use crate::core::{Job, JobId, JobResult, ReturnCode, SchedulerResult};

/// Outcome of a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Job identifier.
    pub id: JobId,
    /// Command line that was run.
    pub command: String,
    /// Outcome classification.
    pub result: JobResult,
    /// Exit code, if the process exited or was killed.
    pub return_code: Option<ReturnCode>,
    /// Wall-clock duration in milliseconds, if the process ran.
    pub duration_ms: Option<u64>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scheduler result.
    pub result: SchedulerResult,
    /// Per-job outcomes in submission order.
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    /// Summarize a finished run.
    #[must_use]
    pub fn new<A, P>(result: SchedulerResult, jobs: &[Job<A, P>]) -> Self {
        Self {
            result,
            jobs: jobs
                .iter()
                .map(|job| JobReport {
                    id: job.id(),
                    command: job.info().command.to_string(),
                    result: job.result(),
                    return_code: job.meta().return_code,
                    duration_ms: job
                        .meta()
                        .duration
                        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                })
                .collect(),
        }
    }

    /// Number of jobs with the given result.
    #[must_use]
    pub fn count(&self, result: JobResult) -> usize {
        self.jobs.iter().filter(|job| job.result == result).count()
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
