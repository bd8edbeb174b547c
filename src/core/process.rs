//! Process contract, descriptors, and the callback enums shared by the
//! scheduler and the job runner.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::LaunchError;

/// Identifier of a scheduled process.
pub type ProcessId = u64;

/// Exit code reported by a process.
pub type ReturnCode = i32;

/// Return code recorded for a process killed by an abort or pool shutdown.
pub const PROCESS_TERMINATED_RETURN_CODE: ReturnCode = 0x00F1_0BAD;

/// Return code recorded for a process killed by a timeout.
pub const PROCESS_TIMEOUT_RETURN_CODE: ReturnCode = 0x0BAD_F00D;

/// Where a child's standard stream is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdRouting {
    /// Pipe the stream back to the scheduler for capture.
    #[default]
    ToParent,
    /// Discard the stream.
    None,
}

/// Program plus argv-style arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandLine {
    /// Program to execute.
    pub program: String,
    /// Arguments passed as discrete elements.
    pub args: Vec<String>,
}

impl CommandLine {
    /// Create a command line for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a single command-line string into program and arguments.
    ///
    /// Whitespace separates tokens; double quotes group a token containing
    /// whitespace. Returns `None` when the string holds no program.
    #[must_use]
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut has_token = false;

        for c in command_line.chars() {
            match c {
                '"' => {
                    in_quotes = !in_quotes;
                    has_token = true;
                }
                c if c.is_whitespace() && !in_quotes => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            }
        }
        if has_token {
            tokens.push(current);
        }

        let mut tokens = tokens.into_iter();
        let program = tokens.next()?;
        Some(Self {
            program,
            args: tokens.collect(),
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_token(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                write!(f, "\"{token}\"")
            } else {
                f.write_str(token)
            }
        }

        write_token(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_token(f, arg)?;
        }
        Ok(())
    }
}

/// Everything needed to launch one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    /// Caller-assigned identifier, echoed back in every callback.
    pub id: ProcessId,
    /// Routing for the child's stdout.
    pub std_out_routing: StdRouting,
    /// Routing for the child's stderr.
    pub std_err_routing: StdRouting,
    /// Command to run.
    pub command: CommandLine,
}

impl ProcessDescriptor {
    /// Create a descriptor that captures both streams.
    #[must_use]
    pub fn new(id: ProcessId, command: CommandLine) -> Self {
        Self {
            id,
            std_out_routing: StdRouting::ToParent,
            std_err_routing: StdRouting::ToParent,
            command,
        }
    }

    /// Override stream routing.
    #[must_use]
    pub const fn with_routing(mut self, std_out: StdRouting, std_err: StdRouting) -> Self {
        self.std_out_routing = std_out;
        self.std_err_routing = std_err;
        self
    }
}

/// Standard output and error captured from a process.
///
/// Each field is `Some` exactly when the stream was routed to the parent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StdContent {
    /// Captured stdout.
    pub out: Option<String>,
    /// Captured stderr.
    pub err: Option<String>,
}

/// Accumulated and freshly consumed stdio for one process.
#[derive(Debug, Clone, Copy)]
pub struct StdBuffers<'a> {
    /// All stdout captured so far.
    pub out: &'a str,
    /// All stderr captured so far.
    pub err: &'a str,
    /// Stdout consumed in this polling sweep.
    pub out_delta: &'a str,
    /// Stderr consumed in this polling sweep.
    pub err_delta: &'a str,
}

/// Outcome of a launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchResult {
    /// The process is running.
    Success,
    /// The process could not be started.
    Failure,
}

/// Client verdict returned from every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCallbackResult {
    /// Keep scheduling.
    #[default]
    Continue,
    /// Terminate everything in flight and end the run.
    Abort,
}

/// How a process left its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCondition {
    /// The process exited on its own.
    Gracefull,
    /// The process was killed by an abort or pool shutdown.
    Terminated,
    /// The process was killed by a per-process or schedule timeout.
    Timeout,
}

/// Overall outcome of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerResult {
    /// Every process ran to completion (individual timeouts included).
    Graceful,
    /// The schedule timeout elapsed.
    Timeout,
    /// A callback requested an abort.
    UserAborted,
}

/// A running (or finished) OS-level process as seen by the scheduler.
///
/// All methods must be non-blocking; the scheduler calls them from its
/// polling loop.
pub trait Process {
    /// Identifier from the descriptor this process was launched from.
    fn id(&self) -> ProcessId;

    /// Whether the process is still running. Reaps the process once it exits.
    fn is_running(&mut self) -> bool;

    /// Exit code, available once the process is no longer running.
    fn return_code(&self) -> Option<ReturnCode>;

    /// Forcibly end the process, recording `return_code` as its exit code.
    ///
    /// Idempotent, and a no-op on a process that already exited.
    fn terminate(&mut self, return_code: ReturnCode);

    /// Take any stdout buffered since the last call.
    fn consume_std_out(&mut self) -> Option<String>;

    /// Take any stderr buffered since the last call.
    fn consume_std_err(&mut self) -> Option<String>;
}

/// Factory turning descriptors into running processes.
pub trait ProcessLauncher {
    /// Process type produced by this launcher.
    type Process: Process;

    /// Start the process described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] when the process cannot be started.
    fn launch(&self, descriptor: &ProcessDescriptor) -> Result<Self::Process, LaunchError>;
}

/// Client hooks invoked synchronously by the scheduler's polling loop.
pub trait ProcessCallbacks {
    /// Called once per descriptor when its launch is attempted.
    fn on_launch(
        &mut self,
        id: ProcessId,
        result: LaunchResult,
        launch_time: Instant,
    ) -> ProcessCallbackResult;

    /// Called once per launched process when it leaves its slot.
    fn on_exit(
        &mut self,
        id: ProcessId,
        condition: ExitCondition,
        return_code: Option<ReturnCode>,
        std_content: StdContent,
        exit_time: Instant,
    ) -> ProcessCallbackResult;

    /// Called when a sweep consumed new stdio from a running process.
    fn on_std_content(&mut self, _id: ProcessId, _buffers: &StdBuffers<'_>) {}
}

/// Adapts a pair of closures to [`ProcessCallbacks`].
pub struct FnCallbacks<FL, FE> {
    on_launch: FL,
    on_exit: FE,
}

impl<FL, FE> FnCallbacks<FL, FE>
where
    FL: FnMut(ProcessId, LaunchResult, Instant) -> ProcessCallbackResult,
    FE: FnMut(ProcessId, ExitCondition, Option<ReturnCode>, StdContent, Instant) -> ProcessCallbackResult,
{
    /// Wrap launch and exit closures.
    pub const fn new(on_launch: FL, on_exit: FE) -> Self {
        Self { on_launch, on_exit }
    }
}

impl<FL, FE> ProcessCallbacks for FnCallbacks<FL, FE>
where
    FL: FnMut(ProcessId, LaunchResult, Instant) -> ProcessCallbackResult,
    FE: FnMut(ProcessId, ExitCondition, Option<ReturnCode>, StdContent, Instant) -> ProcessCallbackResult,
{
    fn on_launch(
        &mut self,
        id: ProcessId,
        result: LaunchResult,
        launch_time: Instant,
    ) -> ProcessCallbackResult {
        (self.on_launch)(id, result, launch_time)
    }

    fn on_exit(
        &mut self,
        id: ProcessId,
        condition: ExitCondition,
        return_code: Option<ReturnCode>,
        std_content: StdContent,
        exit_time: Instant,
    ) -> ProcessCallbackResult {
        (self.on_exit)(id, condition, return_code, std_content, exit_time)
    }
}
