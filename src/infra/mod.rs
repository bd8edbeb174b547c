//! Infrastructure adapters that launch and observe processes.

pub mod process;

pub use process::{OsProcess, OsProcessLauncher, ProcessScript, ScriptedLauncher, ScriptedProcess};
