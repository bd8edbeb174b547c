//! Configuration models for the scheduler and job runs.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
