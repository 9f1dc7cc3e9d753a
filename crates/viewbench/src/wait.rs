//! Condition Waiter
//!
//! Blocks the UI thread until a predicate over externally mutable state
//! becomes true. Between checks the waiter pumps one unit of UI work and
//! yields briefly, so background results posted to the dispatcher get a
//! chance to land and flip the predicate.
//!
//! A wait ends in one of three ways:
//!
//! - the predicate returns `true` (success),
//! - the timeout elapses (`ViewbenchError::Timeout`),
//! - the application context is torn down (`Timeout` with `abandoned`).

use crate::app::ApplicationContext;
use crate::dispatcher::Pump;
use crate::result::{ViewbenchError, ViewbenchResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// WAIT TIMEOUT
// =============================================================================

/// How long a wait may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitTimeout {
    /// Give up once this much wall-clock time has passed
    Bounded(Duration),
    /// Never give up on time alone
    Unbounded,
}

impl WaitTimeout {
    /// Bounded timeout in milliseconds
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self::Bounded(Duration::from_millis(ms))
    }

    /// Whether `elapsed` has used up the budget
    #[must_use]
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        match self {
            Self::Bounded(limit) => elapsed >= *limit,
            Self::Unbounded => false,
        }
    }

    /// The bound, if any
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        match self {
            Self::Bounded(limit) => Some(*limit),
            Self::Unbounded => None,
        }
    }
}

impl From<Duration> for WaitTimeout {
    fn from(duration: Duration) -> Self {
        Self::Bounded(duration)
    }
}

impl std::fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(limit) => write!(f, "{}ms", limit.as_millis()),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

// =============================================================================
// WAIT CONDITION TRAIT
// =============================================================================

/// Trait for reusable wait conditions
pub trait WaitCondition {
    /// Check if the condition is satisfied
    fn check(&self) -> bool;

    /// Get description for error messages
    fn description(&self) -> String;
}

/// A function-based wait condition
pub struct FnCondition<F: Fn() -> bool> {
    func: F,
    description: String,
}

impl<F: Fn() -> bool> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn() -> bool> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

impl<F: Fn() -> bool> WaitCondition for FnCondition<F> {
    fn check(&self) -> bool {
        (self.func)()
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

// =============================================================================
// WAIT REQUEST / RESULT
// =============================================================================

/// One invocation of the waiter
pub struct WaitRequest<P> {
    predicate: P,
    timeout: WaitTimeout,
    purpose: String,
}

impl<P> std::fmt::Debug for WaitRequest<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitRequest")
            .field("timeout", &self.timeout)
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

impl<P: FnMut() -> bool> WaitRequest<P> {
    /// Create a request with an empty purpose label
    pub fn new(predicate: P, timeout: impl Into<WaitTimeout>) -> Self {
        Self {
            predicate,
            timeout: timeout.into(),
            purpose: String::new(),
        }
    }

    /// Set the purpose label used in timeout diagnostics
    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// The timeout of this request
    #[must_use]
    pub const fn timeout(&self) -> WaitTimeout {
        self.timeout
    }

    /// The purpose label of this request
    #[must_use]
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

/// Outcome of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Purpose label of the wait
    pub waited_for: String,
    /// Pump steps performed
    pub pumps: u64,
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Cooperative polling waiter bound to a pump and an application context.
#[derive(Clone)]
pub struct Waiter {
    pump: Arc<dyn Pump + Send + Sync>,
    app: Arc<dyn ApplicationContext>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("poll_interval", &self.poll_interval)
            .field("app_initialized", &self.app.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Waiter {
    /// Create a waiter
    pub fn new(
        pump: Arc<dyn Pump + Send + Sync>,
        app: Arc<dyn ApplicationContext>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pump,
            app,
            poll_interval,
        }
    }

    /// Sleep between pump steps
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `predicate` returns `true`.
    ///
    /// # Errors
    ///
    /// `ViewbenchError::Timeout` naming `purpose` when the timeout elapses
    /// or the application context goes away first. An error raised by a
    /// pumped job is returned as-is.
    pub fn wait_for<P>(
        &self,
        predicate: P,
        timeout: impl Into<WaitTimeout>,
        purpose: &str,
    ) -> ViewbenchResult<WaitResult>
    where
        P: FnMut() -> bool,
    {
        self.run(WaitRequest::new(predicate, timeout).with_purpose(purpose))
    }

    /// Wait for a [`WaitCondition`], using its description as purpose.
    pub fn wait_for_condition<C: WaitCondition>(
        &self,
        condition: &C,
        timeout: impl Into<WaitTimeout>,
    ) -> ViewbenchResult<WaitResult> {
        self.wait_for(|| condition.check(), timeout, &condition.description())
    }

    /// Execute a prepared request.
    pub fn run<P>(&self, mut request: WaitRequest<P>) -> ViewbenchResult<WaitResult>
    where
        P: FnMut() -> bool,
    {
        let start = Instant::now();
        let mut pumps = 0u64;

        let abandoned = loop {
            if (request.predicate)() {
                return Ok(self.finish(&request, start, pumps));
            }
            if request.timeout.is_expired(start.elapsed()) {
                break false;
            }
            if !self.app.is_initialized() {
                break true;
            }
            self.pump.pump_one()?;
            pumps += 1;
            std::thread::sleep(self.poll_interval);
        };

        // The last pump may have satisfied it
        if (request.predicate)() {
            return Ok(self.finish(&request, start, pumps));
        }

        let elapsed = start.elapsed();
        tracing::warn!(
            purpose = %request.purpose,
            timeout = %request.timeout,
            elapsed_ms = elapsed.as_millis() as u64,
            abandoned,
            "wait timed out"
        );
        Err(ViewbenchError::Timeout {
            purpose: request.purpose,
            elapsed_ms: elapsed.as_millis() as u64,
            abandoned,
        })
    }

    fn finish<P>(&self, request: &WaitRequest<P>, start: Instant, pumps: u64) -> WaitResult {
        let elapsed = start.elapsed();
        tracing::debug!(
            purpose = %request.purpose,
            elapsed_ms = elapsed.as_millis() as u64,
            pumps,
            "wait satisfied"
        );
        WaitResult {
            elapsed,
            waited_for: request.purpose.clone(),
            pumps,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::app::{HeadlessApp, PlatformOptions};
    use crate::dispatcher::{Dispatcher, Priority};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn running_app() -> Arc<HeadlessApp> {
        let app = Arc::new(HeadlessApp::new());
        app.initialize(&PlatformOptions::default()).unwrap();
        app
    }

    fn waiter_with(dispatcher: &Dispatcher, app: Arc<HeadlessApp>) -> Waiter {
        Waiter::new(Arc::new(dispatcher.clone()), app, Duration::from_millis(1))
    }

    fn waiter() -> (Waiter, Dispatcher, Arc<HeadlessApp>) {
        let dispatcher = Dispatcher::new();
        let app = running_app();
        (waiter_with(&dispatcher, app.clone()), dispatcher, app)
    }

    // =========================================================================
    // WaitTimeout Tests
    // =========================================================================

    mod wait_timeout_tests {
        use super::*;

        #[test]
        fn test_bounded_expiry() {
            let timeout = WaitTimeout::from_millis(10);
            assert!(!timeout.is_expired(Duration::from_millis(9)));
            assert!(timeout.is_expired(Duration::from_millis(10)));
            assert_eq!(timeout.duration(), Some(Duration::from_millis(10)));
        }

        #[test]
        fn test_unbounded_never_expires() {
            assert!(!WaitTimeout::Unbounded.is_expired(Duration::MAX));
            assert_eq!(WaitTimeout::Unbounded.duration(), None);
        }

        #[test]
        fn test_display() {
            assert_eq!(WaitTimeout::from_millis(200).to_string(), "200ms");
            assert_eq!(WaitTimeout::Unbounded.to_string(), "unbounded");
        }

        #[test]
        fn test_from_duration() {
            let timeout: WaitTimeout = Duration::from_secs(1).into();
            assert_eq!(timeout, WaitTimeout::Bounded(Duration::from_secs(1)));
        }
    }

    // =========================================================================
    // WaitRequest Tests
    // =========================================================================

    mod wait_request_tests {
        use super::*;

        #[test]
        fn test_purpose_defaults_to_empty() {
            let request = WaitRequest::new(|| true, Duration::from_millis(5));
            assert_eq!(request.purpose(), "");
            assert_eq!(request.timeout(), WaitTimeout::from_millis(5));
        }

        #[test]
        fn test_with_purpose() {
            let request = WaitRequest::new(|| true, WaitTimeout::Unbounded).with_purpose("menu");
            assert_eq!(request.purpose(), "menu");
            assert!(format!("{request:?}").contains("menu"));
        }
    }

    // =========================================================================
    // Waiter Tests
    // =========================================================================

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success_does_not_pump() {
            let (waiter, _, _) = waiter();
            let result = waiter
                .wait_for(|| true, Duration::from_millis(100), "ready")
                .unwrap();
            assert_eq!(result.pumps, 0);
            assert_eq!(result.waited_for, "ready");
        }

        #[test]
        fn test_timeout_reports_purpose_and_duration() {
            let (waiter, _, _) = waiter();
            let start = Instant::now();
            let err = waiter
                .wait_for(|| false, Duration::from_millis(50), "widget loaded")
                .unwrap_err();

            assert!(start.elapsed() >= Duration::from_millis(50));
            match err {
                ViewbenchError::Timeout {
                    purpose,
                    elapsed_ms,
                    abandoned,
                } => {
                    assert_eq!(purpose, "widget loaded");
                    assert!(elapsed_ms >= 50);
                    assert!(!abandoned);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_early_success_from_background_thread() {
            let (waiter, _, _) = waiter();
            let flag = Arc::new(AtomicBool::new(false));

            let setter = flag.clone();
            let handle = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                setter.store(true, Ordering::SeqCst);
            });

            let start = Instant::now();
            let result = waiter
                .wait_for(
                    || flag.load(Ordering::SeqCst),
                    Duration::from_millis(200),
                    "widget loaded",
                )
                .unwrap();
            handle.join().unwrap();

            assert!(result.elapsed >= Duration::from_millis(50));
            assert!(start.elapsed() < Duration::from_millis(200));
        }

        #[test]
        fn test_pumping_delivers_posted_work() {
            let (waiter, dispatcher, _) = waiter();
            let flag = Arc::new(AtomicBool::new(false));

            let setter = flag.clone();
            dispatcher.post(Priority::Background, move || {
                setter.store(true, Ordering::SeqCst);
                Ok(())
            });

            let result = waiter
                .wait_for(
                    || flag.load(Ordering::SeqCst),
                    Duration::from_secs(1),
                    "posted work",
                )
                .unwrap();
            assert_eq!(result.pumps, 1);
        }

        #[test]
        fn test_zero_timeout_checks_once_more() {
            let (waiter, _, _) = waiter();
            let calls = AtomicUsize::new(0);
            let err = waiter
                .wait_for(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        false
                    },
                    Duration::ZERO,
                    "nothing",
                )
                .unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }

        #[test]
        fn test_final_check_after_loop_can_succeed() {
            let (waiter, _, _) = waiter();
            let mut calls = 0;
            let result = waiter.wait_for(
                || {
                    calls += 1;
                    calls > 1
                },
                Duration::ZERO,
                "second look",
            );
            assert!(result.is_ok());
        }

        #[test]
        fn test_abandons_when_app_not_initialized() {
            let dispatcher = Dispatcher::new();
            let waiter = waiter_with(&dispatcher, Arc::new(HeadlessApp::new()));

            let err = waiter
                .wait_for(|| false, WaitTimeout::Unbounded, "never")
                .unwrap_err();
            match err {
                ViewbenchError::Timeout { abandoned, .. } => assert!(abandoned),
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_unbounded_wait_ends_on_shutdown() {
            let (waiter, _, app) = waiter();

            let closer = app.clone();
            let handle = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                closer.shutdown();
            });

            let err = waiter
                .wait_for(|| false, WaitTimeout::Unbounded, "forever")
                .unwrap_err();
            handle.join().unwrap();
            assert_eq!(err.timeout_purpose(), Some("forever"));
        }

        #[test]
        fn test_pump_error_propagates() {
            let (waiter, dispatcher, _) = waiter();
            dispatcher.post(Priority::Normal, || {
                Err(ViewbenchError::AsyncFailure {
                    details: "late failure".to_string(),
                })
            });

            let err = waiter
                .wait_for(|| false, Duration::from_secs(1), "anything")
                .unwrap_err();
            assert!(matches!(err, ViewbenchError::AsyncFailure { .. }));
        }

        #[test]
        fn test_wait_for_condition_uses_description() {
            let (waiter, _, _) = waiter();
            let condition = FnCondition::new(|| false, "dialog closed");
            let err = waiter
                .wait_for_condition(&condition, Duration::from_millis(5))
                .unwrap_err();
            assert_eq!(err.timeout_purpose(), Some("dialog closed"));
            assert!(format!("{condition:?}").contains("dialog closed"));
        }

        #[test]
        fn test_debug_output() {
            let (waiter, _, _) = waiter();
            let debug = format!("{waiter:?}");
            assert!(debug.contains("Waiter"));
            assert!(debug.contains("app_initialized: true"));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn prop_timeout_never_early(ms in 0u64..40) {
                let (waiter, _, _) = waiter();
                let start = Instant::now();
                let result = waiter.wait_for(|| false, Duration::from_millis(ms), "prop");
                let elapsed = start.elapsed();

                prop_assert!(result.is_err());
                prop_assert!(elapsed >= Duration::from_millis(ms));
                prop_assert!(elapsed < Duration::from_millis(ms + 250));
            }
        }
    }
}
