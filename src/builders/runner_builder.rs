//! Builders to construct schedulers and job runners from configuration.

use anyhow::{anyhow, Context};

use crate::config::SchedulerConfig;
use crate::core::{AppResult, JobRunner, ProcessLauncher, ProcessScheduler, RunOptions};
use crate::infra::OsProcessLauncher;

/// Build a bare process scheduler from configuration.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn build_scheduler<L: ProcessLauncher>(
    cfg: &SchedulerConfig,
    launcher: L,
) -> AppResult<ProcessScheduler<L>> {
    cfg.validate()
        .map_err(|e| anyhow!("config invalid: {e}"))?;
    let scheduler = ProcessScheduler::new(cfg.max_concurrent_processes, launcher)
        .context("creating process scheduler")?;
    Ok(scheduler.with_poll_interval(cfg.poll_interval()))
}

/// Builds a [`JobRunner`] and its default [`RunOptions`] from a
/// [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    config: SchedulerConfig,
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RunnerBuilder {
    /// Create a builder for the given configuration.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Create a builder from `PROCESS_POOL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid settings.
    pub fn from_env() -> AppResult<Self> {
        let config = SchedulerConfig::from_env()
            .map_err(|e| anyhow!("{e}"))
            .context("loading scheduler config from environment")?;
        Ok(Self::new(config))
    }

    /// Configuration being built from.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run options derived from the configured routing and timeouts.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        let mut options = RunOptions::default()
            .with_routing(self.config.std_out_routing, self.config.std_err_routing);
        options.job_timeout = self.config.process_timeout();
        options.runner_timeout = self.config.schedule_timeout();
        options
    }

    /// Build a runner around the supplied launcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_with_launcher<A, L: ProcessLauncher>(&self, launcher: L) -> AppResult<JobRunner<A, L>> {
        self.config
            .validate()
            .map_err(|e| anyhow!("config invalid: {e}"))?;
        let runner = JobRunner::new(self.config.max_concurrent_processes, launcher)
            .context("creating job runner")?;
        Ok(runner.with_poll_interval(self.config.poll_interval()))
    }

    /// Build a runner that launches real OS processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build<A>(&self) -> AppResult<JobRunner<A, OsProcessLauncher>> {
        self.build_with_launcher(OsProcessLauncher::new())
    }
}
