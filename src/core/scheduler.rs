//! Bounded-concurrency process pool scheduler.
//!
//! A [`ProcessScheduler`] runs a batch of [`ProcessDescriptor`]s using at most
//! `max_concurrent_processes` live child processes at a time. It drives a
//! single-threaded polling loop on the calling thread:
//!
//! - descriptors wait in a FIFO queue and are launched into free slots
//! - each sweep drains stdio from every slot so children never block on a
//!   full pipe, reaps exited processes, and enforces the per-process timeout
//! - the whole run is bounded by an optional schedule timeout
//! - any callback may return [`ProcessCallbackResult::Abort`] to end the run
//!
//! Concurrency comes entirely from the child processes; the scheduler never
//! spawns threads of its own and invokes every callback on the caller's thread.
//!
//! ```rust,ignore
//! use prometheus_process_pool::core::{CommandLine, FnCallbacks, ProcessCallbackResult,
//!     ProcessDescriptor, ProcessScheduler};
//! use prometheus_process_pool::infra::OsProcessLauncher;
//!
//! let scheduler = ProcessScheduler::new(4, OsProcessLauncher::default())?;
//! let processes = (0..8)
//!     .map(|id| ProcessDescriptor::new(id, CommandLine::new("true")))
//!     .collect();
//! let mut callbacks = FnCallbacks::new(
//!     |_, _, _| ProcessCallbackResult::Continue,
//!     |_, _, _, _, _| ProcessCallbackResult::Continue,
//! );
//! let result = scheduler.execute(processes, None, None, &mut callbacks)?;
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::process::{
    ExitCondition, LaunchResult, Process, ProcessCallbackResult, ProcessCallbacks,
    ProcessDescriptor, ProcessId, ProcessLauncher, ReturnCode, SchedulerResult, StdBuffers,
    StdContent, StdRouting, PROCESS_TERMINATED_RETURN_CODE, PROCESS_TIMEOUT_RETURN_CODE,
};
use crate::core::SchedulerError;

/// Default pause between polling sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runs batches of processes with a fixed number of concurrent slots.
///
/// The scheduler holds no per-run state between calls to [`execute`](Self::execute),
/// so it can be reused, but only one run may be in flight at a time.
pub struct ProcessScheduler<L: ProcessLauncher> {
    max_concurrent_processes: usize,
    poll_interval: Duration,
    launcher: L,
    /// Set while a run is in flight (lock-free reentrancy guard).
    running: AtomicBool,
}

impl<L: ProcessLauncher> ProcessScheduler<L> {
    /// Create a scheduler with `max_concurrent_processes` slots.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `max_concurrent_processes` is zero.
    pub fn new(max_concurrent_processes: usize, launcher: L) -> Result<Self, SchedulerError> {
        if max_concurrent_processes == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent_processes must be greater than 0".into(),
            ));
        }

        Ok(Self {
            max_concurrent_processes,
            poll_interval: DEFAULT_POLL_INTERVAL,
            launcher,
            running: AtomicBool::new(false),
        })
    }

    /// Set the pause between polling sweeps. `Duration::ZERO` yields instead of sleeping.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Maximum number of processes in flight at once.
    #[must_use]
    pub const fn max_concurrent_processes(&self) -> usize {
        self.max_concurrent_processes
    }

    /// Pause between polling sweeps.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Launcher used to start processes.
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Whether a run is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `processes` to completion, abort, or schedule timeout.
    ///
    /// Descriptors are launched in FIFO order. `process_timeout` bounds the
    /// wall-clock lifetime of each process; `schedule_timeout` bounds the run.
    /// Callbacks are invoked synchronously on the calling thread and may
    /// return [`ProcessCallbackResult::Abort`] to terminate the run.
    ///
    /// # Errors
    ///
    /// Only precondition violations are returned as errors:
    /// - `SchedulerError::EmptySchedule` if `processes` is empty
    /// - `SchedulerError::InvalidTimeout` if a timeout is zero
    /// - `SchedulerError::AlreadyRunning` if another run is in flight
    ///
    /// Launch failures, non-zero exits, timeouts, and aborts are reported
    /// through the callbacks and the returned [`SchedulerResult`].
    pub fn execute<C>(
        &self,
        processes: Vec<ProcessDescriptor>,
        process_timeout: Option<Duration>,
        schedule_timeout: Option<Duration>,
        callbacks: &mut C,
    ) -> Result<SchedulerResult, SchedulerError>
    where
        C: ProcessCallbacks + ?Sized,
    {
        if processes.is_empty() {
            return Err(SchedulerError::EmptySchedule);
        }
        if process_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SchedulerError::InvalidTimeout("process"));
        }
        if schedule_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SchedulerError::InvalidTimeout("schedule"));
        }
        let _guard = RunGuard::acquire(&self.running)?;

        let num_slots = processes.len().min(self.max_concurrent_processes);
        info!(
            processes = processes.len(),
            slots = num_slots,
            process_timeout = ?process_timeout,
            schedule_timeout = ?schedule_timeout,
            "process schedule starting"
        );

        let mut run = ScheduleRun {
            launcher: &self.launcher,
            callbacks,
            slots: (0..num_slots).map(|_| ProcessInFlight::default()).collect(),
            queue: processes.into(),
            process_timeout,
        };
        let result = run.execute(schedule_timeout, self.poll_interval);

        info!(result = ?result, "process schedule finished");
        Ok(result)
    }
}

/// Clears the running flag when a run ends, including on unwind.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Result<Self, SchedulerError> {
        if running.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyRunning);
        }
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// One unit of concurrency capacity.
struct ProcessInFlight<P> {
    /// Owning handle; `None` while the slot is free.
    process: Option<P>,
    start_time: Option<Instant>,
    std_out_routing: StdRouting,
    std_err_routing: StdRouting,
    std_out: String,
    std_err: String,
}

impl<P> Default for ProcessInFlight<P> {
    fn default() -> Self {
        Self {
            process: None,
            start_time: None,
            std_out_routing: StdRouting::None,
            std_err_routing: StdRouting::None,
            std_out: String::new(),
            std_err: String::new(),
        }
    }
}

impl<P: Process> ProcessInFlight<P> {
    const fn is_occupied(&self) -> bool {
        self.process.is_some()
    }

    /// Move any newly buffered stdio into the accumulators and report it.
    fn drain_std<C>(&mut self, callbacks: &mut C)
    where
        C: ProcessCallbacks + ?Sized,
    {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        let out_delta = process.consume_std_out().unwrap_or_default();
        let err_delta = process.consume_std_err().unwrap_or_default();
        if out_delta.is_empty() && err_delta.is_empty() {
            return;
        }

        let id = process.id();
        self.std_out.push_str(&out_delta);
        self.std_err.push_str(&err_delta);
        callbacks.on_std_content(
            id,
            &StdBuffers {
                out: &self.std_out,
                err: &self.std_err,
                out_delta: &out_delta,
                err_delta: &err_delta,
            },
        );
    }

    /// Hand the accumulated stdio off, leaving the buffers empty for reuse.
    fn take_std_content(&mut self) -> StdContent {
        let out = std::mem::take(&mut self.std_out);
        let err = std::mem::take(&mut self.std_err);
        StdContent {
            out: (self.std_out_routing == StdRouting::ToParent).then_some(out),
            err: (self.std_err_routing == StdRouting::ToParent).then_some(err),
        }
    }

    /// Empty the slot, destroying the process handle.
    fn release(&mut self) {
        self.process = None;
        self.start_time = None;
        self.std_out.clear();
        self.std_err.clear();
    }
}

/// State of a single `execute` call. Dropping it terminates anything still in flight.
struct ScheduleRun<'a, L: ProcessLauncher, C: ProcessCallbacks + ?Sized> {
    launcher: &'a L,
    callbacks: &'a mut C,
    /// Fixed arena of slots; never resized during the run.
    slots: Box<[ProcessInFlight<L::Process>]>,
    queue: VecDeque<ProcessDescriptor>,
    process_timeout: Option<Duration>,
}

impl<L, C> ScheduleRun<'_, L, C>
where
    L: ProcessLauncher,
    C: ProcessCallbacks + ?Sized,
{
    fn execute(&mut self, schedule_timeout: Option<Duration>, poll_interval: Duration) -> SchedulerResult {
        let start = Instant::now();

        for slot in 0..self.slots.len() {
            if self.pop_and_launch(slot) == ProcessCallbackResult::Abort {
                return self.abort();
            }
        }

        loop {
            if schedule_timeout.is_some_and(|timeout| start.elapsed() >= timeout) {
                warn!(
                    elapsed = ?start.elapsed(),
                    queued = self.queue.len(),
                    "schedule timeout elapsed, terminating all processes"
                );
                self.terminate_all(ExitCondition::Timeout);
                return SchedulerResult::Timeout;
            }

            let mut pending_work = false;
            for slot in 0..self.slots.len() {
                if self.poll_slot(slot) == ProcessCallbackResult::Abort {
                    return self.abort();
                }
                pending_work |= self.slots[slot].is_occupied();
            }
            pending_work |= !self.queue.is_empty();

            if !pending_work {
                return SchedulerResult::Graceful;
            }

            if poll_interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(poll_interval);
            }
        }
    }

    /// One sweep step for a single slot.
    fn poll_slot(&mut self, slot: usize) -> ProcessCallbackResult {
        if !self.slots[slot].is_occupied() {
            if self.queue.is_empty() {
                return ProcessCallbackResult::Continue;
            }
            return self.pop_and_launch(slot);
        }

        let in_flight = &mut self.slots[slot];
        in_flight.drain_std(&mut *self.callbacks);

        let Some(process) = in_flight.process.as_mut() else {
            return ProcessCallbackResult::Continue;
        };
        let id = process.id();

        if !process.is_running() {
            // Pick up whatever the process wrote between the drain and its exit.
            in_flight.drain_std(&mut *self.callbacks);
            let return_code = in_flight.process.as_ref().and_then(Process::return_code);
            debug!(process_id = id, return_code = ?return_code, "process exited");

            let result = self.release_with_callback(slot, id, ExitCondition::Gracefull, return_code);
            if result == ProcessCallbackResult::Abort || self.queue.is_empty() {
                return result;
            }
            return self.pop_and_launch(slot);
        }

        let timed_out = match (self.process_timeout, in_flight.start_time) {
            (Some(timeout), Some(started)) => started.elapsed() >= timeout,
            _ => false,
        };
        if timed_out {
            warn!(process_id = id, "process timeout elapsed, terminating process");
            process.terminate(PROCESS_TIMEOUT_RETURN_CODE);
            in_flight.drain_std(&mut *self.callbacks);
            // The freed slot is refilled on the next sweep, not this one.
            return self.release_with_callback(
                slot,
                id,
                ExitCondition::Timeout,
                Some(PROCESS_TIMEOUT_RETURN_CODE),
            );
        }

        ProcessCallbackResult::Continue
    }

    /// Launch the next queued descriptor into `slot`.
    fn pop_and_launch(&mut self, slot: usize) -> ProcessCallbackResult {
        let Some(descriptor) = self.queue.pop_front() else {
            return ProcessCallbackResult::Continue;
        };

        let launch_time = Instant::now();
        match self.launcher.launch(&descriptor) {
            Ok(process) => {
                debug!(process_id = descriptor.id, slot, command = %descriptor.command, "process launched");
                let in_flight = &mut self.slots[slot];
                in_flight.release();
                in_flight.process = Some(process);
                in_flight.start_time = Some(launch_time);
                in_flight.std_out_routing = descriptor.std_out_routing;
                in_flight.std_err_routing = descriptor.std_err_routing;
                self.callbacks.on_launch(descriptor.id, LaunchResult::Success, launch_time)
            }
            Err(e) => {
                warn!(process_id = descriptor.id, error = %e, "process failed to launch");
                self.callbacks.on_launch(descriptor.id, LaunchResult::Failure, launch_time)
            }
        }
    }

    /// Report the slot's exit and free it.
    fn release_with_callback(
        &mut self,
        slot: usize,
        id: ProcessId,
        condition: ExitCondition,
        return_code: Option<ReturnCode>,
    ) -> ProcessCallbackResult {
        let in_flight = &mut self.slots[slot];
        let std_content = in_flight.take_std_content();
        in_flight.release();
        self.callbacks
            .on_exit(id, condition, return_code, std_content, Instant::now())
    }

    fn abort(&mut self) -> SchedulerResult {
        warn!("process schedule aborted by callback, terminating all processes");
        self.terminate_all(ExitCondition::Terminated);
        SchedulerResult::UserAborted
    }

    /// Terminate every in-flight process, reporting each exit until a
    /// callback asks to abort.
    fn terminate_all(&mut self, condition: ExitCondition) {
        let return_code = match condition {
            ExitCondition::Timeout => PROCESS_TIMEOUT_RETURN_CODE,
            _ => PROCESS_TERMINATED_RETURN_CODE,
        };

        let mut report = true;
        for slot in 0..self.slots.len() {
            let in_flight = &mut self.slots[slot];
            let Some(process) = in_flight.process.as_mut() else {
                continue;
            };
            let id = process.id();
            process.terminate(return_code);

            if report {
                in_flight.drain_std(&mut *self.callbacks);
                let result = self.release_with_callback(slot, id, condition, Some(return_code));
                report = result == ProcessCallbackResult::Continue;
            } else {
                in_flight.release();
            }
        }
    }
}

impl<L, C> Drop for ScheduleRun<'_, L, C>
where
    L: ProcessLauncher,
    C: ProcessCallbacks + ?Sized,
{
    fn drop(&mut self) {
        for in_flight in self.slots.iter_mut() {
            if let Some(process) = in_flight.process.as_mut() {
                warn!(process_id = process.id(), "terminating orphaned process");
                process.terminate(PROCESS_TERMINATED_RETURN_CODE);
            }
            in_flight.release();
        }
    }
}
