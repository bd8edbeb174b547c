//! In-memory scripted processes for development, testing, and benchmarks.
//!
//! Nothing is spawned: each [`ScriptedProcess`] "runs" for a scripted
//! wall-clock duration and then exits with a scripted return code. The
//! launcher records launch order and how many processes were alive at once,
//! which makes slot accounting observable from tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::process::{Process, ProcessDescriptor, ProcessId, ProcessLauncher, ReturnCode, StdRouting};
use crate::core::LaunchError;

/// Behaviour of one scripted process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessScript {
    /// How long the process runs before exiting on its own.
    pub run_for: Duration,
    /// Return code reported on graceful exit.
    pub return_code: ReturnCode,
    /// Text written to stdout.
    pub std_out: String,
    /// Text written to stderr.
    pub std_err: String,
    /// Whether launching this process fails.
    pub fail_launch: bool,
}

impl ProcessScript {
    /// Process that exits immediately with `return_code`.
    #[must_use]
    pub fn exits_with(return_code: ReturnCode) -> Self {
        Self {
            return_code,
            ..Self::default()
        }
    }

    /// Process that cannot be launched.
    #[must_use]
    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    /// Keep the process running for `run_for` before it exits.
    #[must_use]
    pub const fn running_for(mut self, run_for: Duration) -> Self {
        self.run_for = run_for;
        self
    }

    /// Text the process writes to stdout.
    #[must_use]
    pub fn with_std_out(mut self, text: impl Into<String>) -> Self {
        self.std_out = text.into();
        self
    }

    /// Text the process writes to stderr.
    #[must_use]
    pub fn with_std_err(mut self, text: impl Into<String>) -> Self {
        self.std_err = text.into();
        self
    }
}

/// Launch bookkeeping shared between the launcher and its processes.
#[derive(Debug, Default)]
struct LaunchLedger {
    launches: Vec<ProcessId>,
    terminated: Vec<ProcessId>,
    live: usize,
    peak_live: usize,
}

/// Launcher producing [`ScriptedProcess`]es.
///
/// Clones share the same ledger, so a test can keep a clone for inspection
/// after handing the launcher to a scheduler.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    default_script: ProcessScript,
    scripts: HashMap<ProcessId, ProcessScript>,
    ledger: Arc<Mutex<LaunchLedger>>,
}

impl ScriptedLauncher {
    /// Create a launcher that applies `default_script` to every process id
    /// without a dedicated script.
    #[must_use]
    pub fn new(default_script: ProcessScript) -> Self {
        Self {
            default_script,
            scripts: HashMap::new(),
            ledger: Arc::new(Mutex::new(LaunchLedger::default())),
        }
    }

    /// Use `script` for process `id`.
    #[must_use]
    pub fn with_script(mut self, id: ProcessId, script: ProcessScript) -> Self {
        self.scripts.insert(id, script);
        self
    }

    /// Ids of successfully launched processes, in launch order.
    #[must_use]
    pub fn launch_order(&self) -> Vec<ProcessId> {
        self.ledger.lock().launches.clone()
    }

    /// Ids of processes that were forcibly terminated while running.
    #[must_use]
    pub fn terminated(&self) -> Vec<ProcessId> {
        self.ledger.lock().terminated.clone()
    }

    /// Process handles currently alive.
    #[must_use]
    pub fn live_processes(&self) -> usize {
        self.ledger.lock().live
    }

    /// Highest number of process handles alive at the same time.
    #[must_use]
    pub fn peak_live_processes(&self) -> usize {
        self.ledger.lock().peak_live
    }
}

impl ProcessLauncher for ScriptedLauncher {
    type Process = ScriptedProcess;

    fn launch(&self, descriptor: &ProcessDescriptor) -> Result<ScriptedProcess, LaunchError> {
        if descriptor.command.program.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let script = self
            .scripts
            .get(&descriptor.id)
            .unwrap_or(&self.default_script)
            .clone();
        if script.fail_launch {
            return Err(LaunchError::Rejected(format!(
                "process {} is scripted to fail",
                descriptor.id
            )));
        }

        {
            let mut ledger = self.ledger.lock();
            ledger.launches.push(descriptor.id);
            ledger.live += 1;
            ledger.peak_live = ledger.peak_live.max(ledger.live);
        }

        let routed = |routing: StdRouting, text: &str| {
            (routing == StdRouting::ToParent && !text.is_empty()).then(|| text.to_owned())
        };
        Ok(ScriptedProcess {
            id: descriptor.id,
            started: Instant::now(),
            run_for: script.run_for,
            scripted_return_code: script.return_code,
            return_code: None,
            std_out: routed(descriptor.std_out_routing, &script.std_out),
            std_err: routed(descriptor.std_err_routing, &script.std_err),
            ledger: Arc::clone(&self.ledger),
        })
    }
}

/// A simulated process following a [`ProcessScript`].
#[derive(Debug)]
pub struct ScriptedProcess {
    id: ProcessId,
    started: Instant,
    run_for: Duration,
    scripted_return_code: ReturnCode,
    return_code: Option<ReturnCode>,
    std_out: Option<String>,
    std_err: Option<String>,
    ledger: Arc<Mutex<LaunchLedger>>,
}

impl Process for ScriptedProcess {
    fn id(&self) -> ProcessId {
        self.id
    }

    fn is_running(&mut self) -> bool {
        if self.return_code.is_some() {
            return false;
        }
        if self.started.elapsed() >= self.run_for {
            self.return_code = Some(self.scripted_return_code);
            return false;
        }
        true
    }

    fn return_code(&self) -> Option<ReturnCode> {
        self.return_code
    }

    fn terminate(&mut self, return_code: ReturnCode) {
        if self.is_running() {
            self.return_code = Some(return_code);
            self.ledger.lock().terminated.push(self.id);
        }
    }

    fn consume_std_out(&mut self) -> Option<String> {
        self.std_out.take()
    }

    fn consume_std_err(&mut self) -> Option<String> {
        self.std_err.take()
    }
}

impl Drop for ScriptedProcess {
    fn drop(&mut self) {
        let mut ledger = self.ledger.lock();
        ledger.live = ledger.live.saturating_sub(1);
    }
}
