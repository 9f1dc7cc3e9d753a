//! Tracing setup for test binaries.

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "viewbench=info";

/// Environment variable selecting the output format (`json` or `text`)
pub const ENV_LOG_FORMAT: &str = "VIEWBENCH_LOG_FORMAT";

static INIT: Once = Once::new();

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

/// Install a fmt subscriber writing through the test writer.
///
/// Emits one JSON object per event when `VIEWBENCH_LOG_FORMAT=json`.
/// Safe to call from every test; only the first call in a process does
/// anything, and a subscriber installed by someone else is left alone.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let json = wants_json(std::env::var(ENV_LOG_FORMAT).ok().as_deref());
        let installed = if json {
            fmt()
                .json()
                .with_env_filter(env_filter())
                .with_test_writer()
                .try_init()
                .is_ok()
        } else {
            fmt()
                .with_env_filter(env_filter())
                .with_test_writer()
                .with_target(true)
                .try_init()
                .is_ok()
        };
        if installed {
            tracing::debug!(json, "test logging initialized");
        }
    });
}
