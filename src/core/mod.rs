//! Core scheduling abstractions: the process contract, the bounded process
//! scheduler, and the job runner layered on top of it.

pub mod error;
pub mod job;
pub mod job_runner;
pub mod notification;
pub mod process;
pub mod scheduler;

pub use error::{AppResult, LaunchError, SchedulerError};
pub use job::{Job, JobData, JobDataMap, JobId, JobInfo, JobMeta, JobResult};
pub use job_runner::{JobRunner, RunOptions};
pub use notification::{JobNotificationBus, JobNotificationHandler, SubscriptionId};
pub use process::{
    CommandLine, ExitCondition, FnCallbacks, LaunchResult, Process, ProcessCallbackResult,
    ProcessCallbacks, ProcessDescriptor, ProcessId, ProcessLauncher, ReturnCode, SchedulerResult,
    StdBuffers, StdContent, StdRouting, PROCESS_TERMINATED_RETURN_CODE, PROCESS_TIMEOUT_RETURN_CODE,
};
pub use scheduler::{ProcessScheduler, DEFAULT_POLL_INTERVAL};
