//! Async Exception Bridge
//!
//! Failures on background threads happen outside the test's call stack, so
//! the test framework never sees them. The bridge turns each captured
//! failure into a job on the UI dispatcher that fails when pumped, which
//! makes the failure come out of the next wait (or explicit pump) on the
//! test thread.

use crate::dispatcher::{Dispatcher, Priority};
use crate::result::{ViewbenchError, ViewbenchResult};
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A failure captured from a background completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncException {
    /// Where the failure happened (thread or task name), may be empty
    pub origin: String,
    /// Description of the failure
    pub details: String,
}

impl AsyncException {
    /// Create from a description
    #[must_use]
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            origin: String::new(),
            details: details.into(),
        }
    }

    /// Create from any displayable error
    pub fn from_error(err: &dyn Display) -> Self {
        Self::new(err.to_string())
    }

    /// Create from a panic payload
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let details = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(format!("panicked: {details}"))
    }

    /// Set the origin
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

impl Display for AsyncException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.origin.is_empty() {
            write!(f, "{}", self.details)
        } else {
            write!(f, "{} (in {})", self.details, self.origin)
        }
    }
}

/// Routes background failures onto the UI thread as test failures.
#[derive(Debug, Clone)]
pub struct AsyncExceptionBridge {
    dispatcher: Dispatcher,
    fail_on_async: Arc<AtomicBool>,
}

impl AsyncExceptionBridge {
    /// Create a bridge with its own flag
    #[must_use]
    pub fn new(dispatcher: Dispatcher, fail_on_async: bool) -> Self {
        Self::with_flag(dispatcher, Arc::new(AtomicBool::new(fail_on_async)))
    }

    /// Create a bridge sharing an existing flag
    #[must_use]
    pub fn with_flag(dispatcher: Dispatcher, fail_on_async: Arc<AtomicBool>) -> Self {
        Self {
            dispatcher,
            fail_on_async,
        }
    }

    /// Whether captured failures are reported
    #[must_use]
    pub fn fail_on_async_exceptions(&self) -> bool {
        self.fail_on_async.load(Ordering::SeqCst)
    }

    /// Change the reporting policy
    pub fn set_fail_on_async_exceptions(&self, fail: bool) {
        self.fail_on_async.store(fail, Ordering::SeqCst);
    }

    /// Handle one captured failure.
    ///
    /// Returns `true` when a failure report was scheduled on the UI thread.
    /// Never panics and never fails on the calling thread.
    pub fn on_async_exception(&self, exception: &AsyncException) -> bool {
        if !self.fail_on_async_exceptions() {
            tracing::debug!(%exception, "async exception ignored");
            return false;
        }

        tracing::warn!(%exception, "async exception captured");
        let details = exception.to_string();
        self.dispatcher.post(Priority::Normal, move || {
            Err(ViewbenchError::AsyncFailure { details })
        });
        true
    }

    /// Run `work` on a named background thread, forwarding an `Err` or a
    /// panic to [`Self::on_async_exception`].
    ///
    /// The handle yields `Some(value)` on success and `None` when the work
    /// failed.
    pub fn spawn_guarded<T, E, F>(
        &self,
        name: impl Into<String>,
        work: F,
    ) -> ViewbenchResult<JoinHandle<Option<T>>>
    where
        T: Send + 'static,
        E: Display,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let name = name.into();
        let bridge = self.clone();
        let origin = name.clone();
        let handle = std::thread::Builder::new().name(name).spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(value)) => Some(value),
                Ok(Err(err)) => {
                    bridge.on_async_exception(&AsyncException::from_error(&err).with_origin(origin));
                    None
                }
                Err(payload) => {
                    bridge.on_async_exception(
                        &AsyncException::from_panic(payload.as_ref()).with_origin(origin),
                    );
                    None
                }
            }
        })?;
        Ok(handle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::dispatcher::Pump;

    mod async_exception_tests {
        use super::*;

        #[test]
        fn test_display_without_origin() {
            let exception = AsyncException::new("connection reset");
            assert_eq!(exception.to_string(), "connection reset");
        }

        #[test]
        fn test_display_with_origin() {
            let exception = AsyncException::new("connection reset").with_origin("loader");
            assert_eq!(exception.to_string(), "connection reset (in loader)");
        }

        #[test]
        fn test_from_panic_str() {
            let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
            let exception = AsyncException::from_panic(payload.as_ref());
            assert_eq!(exception.details, "panicked: index out of bounds");
        }

        #[test]
        fn test_from_panic_string() {
            let payload: Box<dyn Any + Send> = Box::new(String::from("bad state"));
            let exception = AsyncException::from_panic(payload.as_ref());
            assert_eq!(exception.details, "panicked: bad state");
        }

        #[test]
        fn test_from_panic_other() {
            let payload: Box<dyn Any + Send> = Box::new(17_u8);
            let exception = AsyncException::from_panic(payload.as_ref());
            assert!(exception.details.contains("non-string"));
        }
    }

    mod bridge_tests {
        use super::*;

        #[test]
        fn test_enabled_schedules_exactly_one_report() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), true);

            assert!(bridge.on_async_exception(&AsyncException::new("synthetic failure")));
            assert_eq!(dispatcher.pending(), 1);

            let err = dispatcher.pump_one().unwrap_err();
            match err {
                ViewbenchError::AsyncFailure { details } => {
                    assert!(details.contains("synthetic failure"));
                }
                other => panic!("expected async failure, got {other:?}"),
            }
            assert!(dispatcher.is_idle());
        }

        #[test]
        fn test_report_message_names_async_origin() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), true);
            bridge.on_async_exception(&AsyncException::new("disk full"));

            let err = dispatcher.pump_one().unwrap_err();
            assert_eq!(err.to_string(), "An async exception occurred: disk full");
        }

        #[test]
        fn test_disabled_schedules_nothing() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), false);

            assert!(!bridge.on_async_exception(&AsyncException::new("ignored")));
            assert!(dispatcher.is_idle());
        }

        #[test]
        fn test_flag_is_shared_between_clones() {
            let flag = Arc::new(AtomicBool::new(true));
            let bridge = AsyncExceptionBridge::with_flag(Dispatcher::new(), flag.clone());
            let clone = bridge.clone();

            clone.set_fail_on_async_exceptions(false);
            assert!(!bridge.fail_on_async_exceptions());
            assert!(!flag.load(Ordering::SeqCst));
        }

        #[test]
        fn test_spawn_guarded_success() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), true);

            let handle = bridge
                .spawn_guarded("adder", || Ok::<_, String>(2 + 2))
                .unwrap();
            assert_eq!(handle.join().unwrap(), Some(4));
            assert!(dispatcher.is_idle());
        }

        #[test]
        fn test_spawn_guarded_forwards_error() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), true);

            let handle = bridge
                .spawn_guarded("fetch", || Err::<(), _>("404 from server"))
                .unwrap();
            assert_eq!(handle.join().unwrap(), None);

            let err = dispatcher.pump_one().unwrap_err();
            assert!(err.to_string().contains("404 from server (in fetch)"));
        }

        #[test]
        fn test_spawn_guarded_forwards_panic() {
            let dispatcher = Dispatcher::new();
            let bridge = AsyncExceptionBridge::new(dispatcher.clone(), true);

            let handle = bridge
                .spawn_guarded("render", || -> Result<(), String> {
                    panic!("texture missing")
                })
                .unwrap();
            assert_eq!(handle.join().unwrap(), None);

            let err = dispatcher.pump_one().unwrap_err();
            assert!(err.to_string().contains("panicked: texture missing"));
        }
    }
}
