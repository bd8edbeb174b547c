//! Job data model: what a client submits, what the runner tracks, and what
//! it hands back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::process::{CommandLine, ExitCondition, ProcessId, ReturnCode};

/// Identifier of a job; doubles as the id of the process that runs it.
pub type JobId = ProcessId;

/// A job to run: id, command line, and opaque client metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo<A> {
    /// Unique id within a run.
    pub id: JobId,
    /// Command that runs the job.
    pub command: CommandLine,
    /// Client-defined data carried alongside the job.
    pub additional_info: A,
}

impl<A> JobInfo<A> {
    /// Create a job description.
    pub const fn new(id: JobId, command: CommandLine, additional_info: A) -> Self {
        Self {
            id,
            command,
            additional_info,
        }
    }
}

/// Outcome classification of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    /// The job never got a chance to launch.
    #[default]
    NotExecuted,
    /// The process could not be started.
    FailedToExecute,
    /// Graceful exit with return code 0.
    ExecutedWithSuccess,
    /// Graceful exit with a non-zero (or unknown) return code.
    ExecutedWithFailure,
    /// Killed by an abort.
    Terminated,
    /// Killed by a timeout.
    Timeout,
}

impl JobResult {
    /// Classify how a launched process left its slot.
    #[must_use]
    pub const fn from_exit(condition: ExitCondition, return_code: Option<ReturnCode>) -> Self {
        match (condition, return_code) {
            (ExitCondition::Gracefull, Some(0)) => Self::ExecutedWithSuccess,
            (ExitCondition::Terminated, _) => Self::Terminated,
            (ExitCondition::Timeout, _) => Self::Timeout,
            (ExitCondition::Gracefull, _) => Self::ExecutedWithFailure,
        }
    }
}

/// Execution statistics and outcome of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobMeta {
    /// When the process was launched.
    pub start_time: Option<Instant>,
    /// Wall-clock time from launch to exit.
    pub duration: Option<Duration>,
    /// Exit code reported for the process.
    pub return_code: Option<ReturnCode>,
    /// Outcome classification.
    pub result: JobResult,
}

impl JobMeta {
    /// Whether the job's process was ever launched.
    #[must_use]
    pub const fn was_launched(&self) -> bool {
        self.start_time.is_some()
    }
}

/// A finished job with its metadata and client-produced payload.
#[derive(Debug, Clone)]
pub struct Job<A, P> {
    info: JobInfo<A>,
    meta: JobMeta,
    payload: Option<P>,
}

impl<A, P> Job<A, P> {
    /// Assemble a finished job.
    pub const fn new(info: JobInfo<A>, meta: JobMeta, payload: Option<P>) -> Self {
        Self { info, meta, payload }
    }

    /// Job id.
    pub const fn id(&self) -> JobId {
        self.info.id
    }

    /// The submitted job description.
    pub const fn info(&self) -> &JobInfo<A> {
        &self.info
    }

    /// Execution statistics.
    pub const fn meta(&self) -> &JobMeta {
        &self.meta
    }

    /// Outcome classification.
    pub const fn result(&self) -> JobResult {
        self.meta.result
    }

    /// Payload produced for this job, if any.
    pub const fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Take the payload out of the job.
    pub fn into_payload(self) -> Option<P> {
        self.payload
    }
}

/// Per-job state handed to the payload producer.
#[derive(Debug)]
pub struct JobData<'a, A> {
    /// The submitted job; borrowed only for the duration of the run.
    pub info: &'a JobInfo<A>,
    /// Final metadata.
    pub meta: JobMeta,
}

/// Job data keyed by job id.
pub type JobDataMap<'a, A> = HashMap<JobId, JobData<'a, A>>;
