//! Native OS processes backed by `std::process`.
//!
//! Each piped stream gets a dedicated reader thread that forwards chunks
//! through a `crossbeam_channel`, so the scheduler's `consume_*` calls never
//! block and the child never stalls on a full pipe.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::core::process::{
    Process, ProcessDescriptor, ProcessId, ProcessLauncher, ReturnCode, StdRouting,
    PROCESS_TERMINATED_RETURN_CODE,
};
use crate::core::LaunchError;

/// How long to wait for trailing output once a process has exited.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Size of each pipe read.
const READ_CHUNK_SIZE: usize = 4096;

/// Launches real child processes.
#[derive(Debug, Clone, Default)]
pub struct OsProcessLauncher {
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl OsProcessLauncher {
    /// Create a launcher that inherits the parent's working directory and environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every child in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for every child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

fn stdio_for(routing: StdRouting) -> Stdio {
    match routing {
        StdRouting::ToParent => Stdio::piped(),
        StdRouting::None => Stdio::null(),
    }
}

impl ProcessLauncher for OsProcessLauncher {
    type Process = OsProcess;

    fn launch(&self, descriptor: &ProcessDescriptor) -> Result<OsProcess, LaunchError> {
        let program = &descriptor.command.program;
        if program.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }

        let mut command = Command::new(program);
        command
            .args(&descriptor.command.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(stdio_for(descriptor.std_out_routing))
            .stderr(stdio_for(descriptor.std_err_routing));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        // Own process group so termination reaches every descendant.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        debug!(process_id = descriptor.id, pid = child.id(), "spawned child process");

        let mut process = OsProcess {
            id: descriptor.id,
            std_out: None,
            std_err: None,
            return_code: None,
            exited: false,
            child,
        };
        // Dropping `process` on failure kills the child.
        process.attach_readers().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        Ok(process)
    }
}

/// Receiving end of a pipe drained by a reader thread.
struct StdPipe {
    rx: Receiver<String>,
}

impl StdPipe {
    fn spawn<R: Read + Send + 'static>(
        id: ProcessId,
        stream: &'static str,
        mut reader: R,
    ) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name(format!("pp-{stream}-{id}"))
            .spawn(move || pump(&mut reader, &tx))?;
        Ok(Self { rx })
    }

    /// Take everything the reader has forwarded so far.
    fn try_drain(&self) -> Option<String> {
        let text: String = self.rx.try_iter().collect();
        (!text.is_empty()).then_some(text)
    }

    /// Take everything until the pipe closes or `grace` elapses.
    fn drain_until_closed(&self, grace: Duration) -> Option<String> {
        let deadline = Instant::now() + grace;
        let mut text = String::new();
        loop {
            match self.rx.recv_deadline(deadline) {
                Ok(chunk) => text.push_str(&chunk),
                Err(RecvTimeoutError::Disconnected | RecvTimeoutError::Timeout) => break,
            }
        }
        (!text.is_empty()).then_some(text)
    }
}

/// Forward UTF-8 text from `reader` until EOF, keeping split code points intact.
fn pump<R: Read>(reader: &mut R, tx: &Sender<String>) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let mut pending = Vec::new();
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        pending.extend_from_slice(&buf[..n]);
        let text = take_utf8_prefix(&mut pending);
        if !text.is_empty() && tx.send(text).is_err() {
            return;
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
    }
}

/// Remove and decode the longest prefix of `pending` that is complete UTF-8.
///
/// Invalid sequences are replaced; an incomplete trailing sequence stays in
/// `pending` for the next read.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let keep_from = match std::str::from_utf8(pending.as_slice()) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(keep_from);
    let text = String::from_utf8_lossy(pending.as_slice()).into_owned();
    *pending = rest;
    text
}

/// A child process launched by [`OsProcessLauncher`].
pub struct OsProcess {
    id: ProcessId,
    child: Child,
    std_out: Option<StdPipe>,
    std_err: Option<StdPipe>,
    return_code: Option<ReturnCode>,
    exited: bool,
}

impl OsProcess {
    /// OS process id of the child.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn attach_readers(&mut self) -> std::io::Result<()> {
        if let Some(out) = self.child.stdout.take() {
            self.std_out = Some(StdPipe::spawn::<ChildStdout>(self.id, "stdout", out)?);
        }
        if let Some(err) = self.child.stderr.take() {
            self.std_err = Some(StdPipe::spawn::<ChildStderr>(self.id, "stderr", err)?);
        }
        Ok(())
    }

    fn consume(pipe: Option<&StdPipe>, exited: bool) -> Option<String> {
        let pipe = pipe?;
        if exited {
            pipe.drain_until_closed(EXIT_DRAIN_GRACE)
        } else {
            pipe.try_drain()
        }
    }
}

impl Process for OsProcess {
    fn id(&self) -> ProcessId {
        self.id
    }

    fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = true;
                self.return_code = exit_code(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(process_id = self.id, error = %e, "failed to query child status");
                self.exited = true;
                false
            }
        }
    }

    fn return_code(&self) -> Option<ReturnCode> {
        self.return_code
    }

    fn terminate(&mut self, return_code: ReturnCode) {
        if !self.is_running() {
            return;
        }
        kill_process_group(&self.child);
        if let Err(e) = self.child.kill() {
            warn!(process_id = self.id, error = %e, "failed to kill child process");
        }
        if let Err(e) = self.child.wait() {
            warn!(process_id = self.id, error = %e, "failed to reap child process");
        }
        self.exited = true;
        self.return_code = Some(return_code);
        debug!(process_id = self.id, return_code, "child process terminated");
    }

    fn consume_std_out(&mut self) -> Option<String> {
        Self::consume(self.std_out.as_ref(), self.exited)
    }

    fn consume_std_err(&mut self) -> Option<String> {
        Self::consume(self.std_err.as_ref(), self.exited)
    }
}

impl Drop for OsProcess {
    fn drop(&mut self) {
        self.terminate(PROCESS_TERMINATED_RETURN_CODE);
    }
}

/// SIGKILL the child's process group. Only called while the leader is unreaped,
/// so the group id cannot have been recycled.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(pgid, error = %e, "failed to signal process group");
    }
}

#[cfg(not(unix))]
const fn kill_process_group(_child: &Child) {}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> Option<ReturnCode> {
    use std::os::unix::process::ExitStatusExt;
    // Shell convention for signal deaths.
    status.code().or_else(|| status.signal().map(|signal| 128 + signal))
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> Option<ReturnCode> {
    status.code()
}
