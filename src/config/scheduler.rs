//! Scheduler configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::StdRouting;

/// Prefix of every environment variable read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "PROCESS_POOL_";

/// Settings for a process scheduler and the runs it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of processes in flight at once.
    pub max_concurrent_processes: usize,
    /// Per-process timeout in milliseconds; `None` disables it.
    pub process_timeout_ms: Option<u64>,
    /// Whole-run timeout in milliseconds; `None` disables it.
    pub schedule_timeout_ms: Option<u64>,
    /// Pause between polling sweeps in milliseconds; 0 yields instead.
    pub poll_interval_ms: u64,
    /// Routing for child stdout.
    pub std_out_routing: StdRouting,
    /// Routing for child stderr.
    pub std_err_routing: StdRouting,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_processes: num_cpus::get(),
            process_timeout_ms: None,
            schedule_timeout_ms: None,
            poll_interval_ms: 1,
            std_out_routing: StdRouting::ToParent,
            std_err_routing: StdRouting::ToParent,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_processes == 0 {
            return Err("max_concurrent_processes must be greater than 0".into());
        }
        if self.process_timeout_ms == Some(0) {
            return Err("process_timeout_ms must be greater than 0".into());
        }
        if self.schedule_timeout_ms == Some(0) {
            return Err("schedule_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `PROCESS_POOL_*` environment variables,
    /// loading a `.env` file first if one exists.
    ///
    /// Recognised variables: `MAX_CONCURRENT_PROCESSES`, `PROCESS_TIMEOUT_MS`,
    /// `SCHEDULE_TIMEOUT_MS`, `POLL_INTERVAL_MS`, `STD_OUT_ROUTING` and
    /// `STD_ERR_ROUTING` (`to_parent` or `none`). Unset variables keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or the result is invalid.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// `lookup` receives full variable names including [`ENV_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        if let Some(value) = var("MAX_CONCURRENT_PROCESSES") {
            cfg.max_concurrent_processes = parse_number("MAX_CONCURRENT_PROCESSES", &value)?;
        }
        if let Some(value) = var("PROCESS_TIMEOUT_MS") {
            cfg.process_timeout_ms = Some(parse_number("PROCESS_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = var("SCHEDULE_TIMEOUT_MS") {
            cfg.schedule_timeout_ms = Some(parse_number("SCHEDULE_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = var("POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = parse_number("POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = var("STD_OUT_ROUTING") {
            cfg.std_out_routing = parse_routing("STD_OUT_ROUTING", &value)?;
        }
        if let Some(value) = var("STD_ERR_ROUTING") {
            cfg.std_err_routing = parse_routing("STD_ERR_ROUTING", &value)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Per-process timeout as a `Duration`.
    #[must_use]
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_ms.map(Duration::from_millis)
    }

    /// Whole-run timeout as a `Duration`.
    #[must_use]
    pub fn schedule_timeout(&self) -> Option<Duration> {
        self.schedule_timeout_ms.map(Duration::from_millis)
    }

    /// Pause between polling sweeps as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}

fn parse_routing(name: &str, value: &str) -> Result<StdRouting, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "to_parent" | "parent" => Ok(StdRouting::ToParent),
        "none" => Ok(StdRouting::None),
        other => Err(format!(
            "{ENV_PREFIX}{name}: unknown routing `{other}` (expected `to_parent` or `none`)"
        )),
    }
}
