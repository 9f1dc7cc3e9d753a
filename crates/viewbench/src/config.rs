//! Fixture configuration.
//!
//! Defaults match what a desktop test class expects: a five second wait
//! budget, a one millisecond yield between pumps and a `Running: ` window
//! title prefix. Values can be overridden in code, from environment
//! variables, or from a YAML/JSON file.

use crate::app::PlatformOptions;
use crate::result::{ViewbenchError, ViewbenchResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default wait timeout (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default sleep between pump steps (1ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Default host container title prefix
pub const DEFAULT_TITLE_PREFIX: &str = "Running: ";

/// Environment variable overriding the default timeout
pub const ENV_TIMEOUT_MS: &str = "VIEWBENCH_TIMEOUT_MS";
/// Environment variable overriding the poll interval
pub const ENV_POLL_INTERVAL_MS: &str = "VIEWBENCH_POLL_INTERVAL_MS";
/// Environment variable forcing the async failure policy
pub const ENV_FAIL_ON_ASYNC: &str = "VIEWBENCH_FAIL_ON_ASYNC";
/// Environment variable forcing debugger detection
pub const ENV_ASSUME_DEBUGGER: &str = "VIEWBENCH_ASSUME_DEBUGGER";

/// Configuration for a fixture host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Timeout used by waits that do not pass one explicitly
    pub default_timeout_ms: u64,
    /// Sleep between pump steps while waiting
    pub poll_interval_ms: u64,
    /// Prefix of the host container title, followed by the test name
    pub title_prefix: String,
    /// Report background failures as test failures; `None` means
    /// "yes unless a debugger is attached"
    pub fail_on_async_exceptions: Option<bool>,
    /// Override debugger detection; `None` means probe the process
    pub assume_debugger: Option<bool>,
    /// Options for the application context
    pub platform: PlatformOptions,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            fail_on_async_exceptions: None,
            assume_debugger: None,
            platform: PlatformOptions::default(),
        }
    }
}

impl FixtureConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default timeout in milliseconds
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Set poll interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the host title prefix
    #[must_use]
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = prefix.into();
        self
    }

    /// Force the async failure policy
    #[must_use]
    pub const fn with_fail_on_async_exceptions(mut self, fail: bool) -> Self {
        self.fail_on_async_exceptions = Some(fail);
        self
    }

    /// Force debugger detection
    #[must_use]
    pub const fn with_assume_debugger(mut self, attached: bool) -> Self {
        self.assume_debugger = Some(attached);
        self
    }

    /// Set platform options
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformOptions) -> Self {
        self.platform = platform;
        self
    }

    /// Default timeout as Duration
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Title for the host container while `test_name` runs
    #[must_use]
    pub fn title_for(&self, test_name: &str) -> String {
        format!("{}{test_name}", self.title_prefix)
    }

    /// Defaults overlaid with `VIEWBENCH_*` environment variables.
    pub fn from_env() -> ViewbenchResult<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup` onto this config.
    pub fn overlay<L>(mut self, lookup: L) -> ViewbenchResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms = parse_u64(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_u64(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FAIL_ON_ASYNC) {
            self.fail_on_async_exceptions = Some(parse_bool(ENV_FAIL_ON_ASYNC, &raw)?);
        }
        if let Some(raw) = lookup(ENV_ASSUME_DEBUGGER) {
            self.assume_debugger = Some(parse_bool(ENV_ASSUME_DEBUGGER, &raw)?);
        }
        Ok(self)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: &Path) -> ViewbenchResult<Self> {
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            Some("json") => Self::from_json(&text),
            _ => Err(ViewbenchError::Config {
                message: format!("Unsupported config file: {}", path.display()),
            }),
        }
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> ViewbenchResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| ViewbenchError::Config {
            message: format!("Failed to parse YAML config: {e}"),
        })
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> ViewbenchResult<Self> {
        serde_json::from_str(json).map_err(|e| ViewbenchError::Config {
            message: format!("Failed to parse JSON config: {e}"),
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> ViewbenchResult<u64> {
    raw.trim().parse().map_err(|_| ViewbenchError::Config {
        message: format!("{key} must be a whole number of milliseconds, got '{raw}'"),
    })
}

fn parse_bool(key: &str, raw: &str) -> ViewbenchResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ViewbenchError::Config {
            message: format!("{key} must be a boolean, got '{raw}'"),
        }),
    }
}
