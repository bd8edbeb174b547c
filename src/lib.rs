//! # Prometheus Process Pool
//!
//! A bounded-concurrency process pool scheduler and a generic job runner
//! built on top of it.
//!
//! The scheduler launches external programs from a FIFO queue into a fixed
//! number of slots, polls them until they exit, enforces a per-process and a
//! whole-run timeout, drains their standard streams, and reports every
//! lifecycle event to the caller through callbacks. Any callback can abort
//! the run, which terminates everything still in flight.
//!
//! ## Key Features
//!
//! - **Bounded concurrency**: never more than `max_concurrent_processes` children at once
//! - **Two timeout policies**: a timed-out process frees its slot; a timed-out run ends
//! - **Cooperative abort**: callbacks vote to continue or abort
//! - **Stdio capture**: routed streams are captured and reported on exit and in realtime
//! - **Typed job results**: the job runner classifies outcomes and collects client payloads
//! - **Pluggable launchers**: real OS processes or scripted in-memory processes
//!
//! ## ProcessScheduler
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use prometheus_process_pool::core::{
//!     CommandLine, FnCallbacks, ProcessCallbackResult, ProcessDescriptor, ProcessScheduler,
//! };
//! use prometheus_process_pool::infra::OsProcessLauncher;
//!
//! let scheduler = ProcessScheduler::new(4, OsProcessLauncher::new())?;
//! let processes = vec![
//!     ProcessDescriptor::new(1, CommandLine::new("echo").arg("hello")),
//!     ProcessDescriptor::new(2, CommandLine::new("sleep").arg("1")),
//! ];
//! let mut callbacks = FnCallbacks::new(
//!     |_id, _result, _time| ProcessCallbackResult::Continue,
//!     |id, condition, code, _std, _time| {
//!         println!("process {id} exited: {condition:?} ({code:?})");
//!         ProcessCallbackResult::Continue
//!     },
//! );
//! let result = scheduler.execute(
//!     processes,
//!     Some(Duration::from_secs(5)),
//!     None,
//!     &mut callbacks,
//! )?;
//! # Ok::<(), prometheus_process_pool::core::SchedulerError>(())
//! ```
//!
//! ## JobRunner
//!
//! ```rust,no_run
//! use prometheus_process_pool::builders::RunnerBuilder;
//! use prometheus_process_pool::config::SchedulerConfig;
//! use prometheus_process_pool::core::{CommandLine, JobInfo};
//!
//! let builder = RunnerBuilder::new(SchedulerConfig::default());
//! let runner = builder.build::<&str>()?;
//! let jobs = vec![JobInfo::new(1, CommandLine::new("true"), "smoke")];
//! let (result, jobs) = runner.execute(
//!     jobs,
//!     |data| data.keys().map(|id| (*id, ())).collect(),
//!     builder.run_options(),
//! )?;
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: processes, scheduler, jobs, notifications.
pub mod core;
/// Configuration models for the scheduler and job runs.
pub mod config;
/// Builders to construct runners from configuration.
pub mod builders;
/// Launcher backends for OS and scripted processes.
pub mod infra;
/// Runtime adapters and run reports.
pub mod runtime;
/// Shared utilities.
pub mod util;
