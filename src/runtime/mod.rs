//! Runtime adapters and reporting surface.

pub mod report;
#[cfg(feature = "tokio-runtime")]
mod tokio_runner;

pub use report::{JobReport, RunReport};
