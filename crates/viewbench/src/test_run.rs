//! Current test metadata.
//!
//! The outer test runner knows the running test's name and whether it has
//! failed. Fixtures only read that information through [`TestMetadata`].

use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Read-only view of the test currently executing.
pub trait TestMetadata {
    /// Display name of the test
    fn display_name(&self) -> &str;

    /// Number of failures recorded so far
    fn failure_count(&self) -> usize;

    /// Whether at least one failure was recorded
    fn has_failed(&self) -> bool {
        self.failure_count() > 0
    }
}

/// Metadata and failure record for one test execution.
///
/// Clones share the failure list, so a runner can hand a clone to the
/// fixture and keep recording into the original.
#[derive(Debug, Clone)]
pub struct TestRun {
    id: Uuid,
    name: String,
    failures: Arc<Mutex<Vec<String>>>,
}

impl TestRun {
    /// Start a run for the named test
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Unique id of this run
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Span carrying the test name and run id, for entering around a test body
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("test_run", test = %self.name, id = %self.id)
    }

    /// Record a failure
    pub fn record_failure(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(test = %self.name, %message, "failure recorded");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// All recorded failure messages
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TestMetadata for TestRun {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn failure_count(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
