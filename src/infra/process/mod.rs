//! Process launcher backends.

pub mod os;
pub mod scripted;

pub use os::{OsProcess, OsProcessLauncher};
pub use scripted::{ProcessScript, ScriptedLauncher, ScriptedProcess};
