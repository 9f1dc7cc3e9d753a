//! Fixture Lifecycle Controller
//!
//! Drives one test class: a host container, a lazily created subject that
//! may be shared by several tests, and the waits a test performs against it.
//!
//! ```text
//! Uninitialized --one_time_setup--> ClassReady --setup--> TestReady
//!                                       ^                    |  \
//!                                       +------teardown------+   +--teardown (debugger + failure)--> SuspendedOnFailure
//! ClassReady --one_time_teardown--> TornDown
//! ```
//!
//! Customization goes through [`FixtureStrategy`] rather than subclassing:
//! the strategy builds the host and the subject, runs the initialization
//! hooks and knows how to open the toolkit's diagnostic console.
//!
//! # Example
//!
//! ```ignore
//! let mut fixture = FixtureHost::builder(GalleryStrategy::default(), HeadlessApp::process())
//!     .config(FixtureConfig::from_env()?)
//!     .build();
//!
//! fixture.one_time_setup()?;
//! let run = TestRun::new("opens_first_image");
//! fixture.setup(&run)?;
//! fixture.wait_for(|| gallery_loaded.load(Ordering::SeqCst), "gallery loaded")?;
//! fixture.teardown(&run)?;
//! fixture.one_time_teardown()?;
//! ```

use crate::app::{ensure_initialized, ApplicationContext};
use crate::bridge::AsyncExceptionBridge;
use crate::config::FixtureConfig;
use crate::debugger::{DebuggerProbe, FixedDebugger, ProcessDebugger};
use crate::dispatcher::{Dispatcher, Pump};
use crate::host::{HostContainer, Mount};
use crate::locator::Locator;
use crate::result::{ViewbenchError, ViewbenchResult};
use crate::subject::{Subject, SubjectSlot};
use crate::suspend::enter_diagnostic_suspension;
use crate::test_run::TestMetadata;
use crate::wait::{WaitResult, WaitTimeout, Waiter};
use std::sync::Arc;

/// Capabilities a concrete fixture supplies.
pub trait FixtureStrategy {
    /// Component under test
    type Subject: Subject;
    /// Surface hosting the subject
    type Host: Mount<Self::Subject>;

    /// Build the host container.
    ///
    /// # Errors
    ///
    /// Setup errors propagate unmodified out of [`FixtureHost::setup`].
    fn create_host(&mut self, title: &str) -> ViewbenchResult<Self::Host>;

    /// Build the subject. `None` leaves the host empty for this test.
    fn create_subject(&mut self) -> ViewbenchResult<Option<Self::Subject>> {
        Ok(Some(Self::Subject::default()))
    }

    /// Runs on a fresh subject before it is mounted.
    fn initialize_view(&mut self, _subject: &mut Self::Subject) -> ViewbenchResult<()> {
        Ok(())
    }

    /// Runs on a fresh subject after it is mounted.
    fn after_initialize_view(&mut self, _subject: &mut Self::Subject) -> ViewbenchResult<()> {
        Ok(())
    }

    /// Open the toolkit's diagnostic console. May do nothing.
    fn show_diagnostics(&mut self);
}

/// Lifecycle state of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// One-time setup has not run.
    Uninitialized,
    /// Between tests.
    ClassReady,
    /// A test is set up.
    TestReady,
    /// Teardown parked for inspection after a failure under a debugger.
    SuspendedOnFailure,
    /// One-time teardown has run.
    TornDown,
}

impl std::fmt::Display for FixtureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::ClassReady => "class-ready",
            Self::TestReady => "test-ready",
            Self::SuspendedOnFailure => "suspended-on-failure",
            Self::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

/// Builder for a [`FixtureHost`].
pub struct FixtureHostBuilder<F: FixtureStrategy> {
    strategy: F,
    app: Arc<dyn ApplicationContext>,
    config: FixtureConfig,
    debugger: Option<Arc<dyn DebuggerProbe>>,
    dispatcher: Option<Dispatcher>,
}

impl<F: FixtureStrategy> std::fmt::Debug for FixtureHostBuilder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureHostBuilder")
            .field("config", &self.config)
            .field("custom_debugger", &self.debugger.is_some())
            .finish_non_exhaustive()
    }
}

impl<F: FixtureStrategy> FixtureHostBuilder<F> {
    /// Use this configuration
    #[must_use]
    pub fn config(mut self, config: FixtureConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this debugger probe instead of the configured one
    #[must_use]
    pub fn debugger(mut self, probe: Arc<dyn DebuggerProbe>) -> Self {
        self.debugger = Some(probe);
        self
    }

    /// Pump this dispatcher instead of a private one
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build the fixture.
    #[must_use]
    pub fn build(self) -> FixtureHost<F> {
        let debugger: Arc<dyn DebuggerProbe> = match (self.debugger, self.config.assume_debugger) {
            (Some(probe), _) => probe,
            (None, Some(attached)) => Arc::new(FixedDebugger(attached)),
            (None, None) => Arc::new(ProcessDebugger),
        };
        let fail_on_async = self
            .config
            .fail_on_async_exceptions
            .unwrap_or_else(|| !debugger.is_attached());
        let dispatcher = self.dispatcher.unwrap_or_default();
        let waiter = Waiter::new(
            Arc::new(dispatcher.clone()),
            self.app.clone(),
            self.config.poll_interval(),
        );
        let bridge = AsyncExceptionBridge::new(dispatcher.clone(), fail_on_async);

        FixtureHost {
            strategy: self.strategy,
            config: self.config,
            app: self.app,
            debugger,
            dispatcher,
            waiter,
            bridge,
            locator: Locator::new(),
            host: None,
            subject: SubjectSlot::new(),
            state: FixtureState::Uninitialized,
            current_test: None,
        }
    }
}

/// Owns the host container and subject of one test class.
pub struct FixtureHost<F: FixtureStrategy> {
    strategy: F,
    config: FixtureConfig,
    app: Arc<dyn ApplicationContext>,
    debugger: Arc<dyn DebuggerProbe>,
    dispatcher: Dispatcher,
    waiter: Waiter,
    bridge: AsyncExceptionBridge,
    locator: Locator,
    host: Option<F::Host>,
    subject: SubjectSlot<F::Subject>,
    state: FixtureState,
    current_test: Option<String>,
}

impl<F: FixtureStrategy> std::fmt::Debug for FixtureHost<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureHost")
            .field("state", &self.state)
            .field("current_test", &self.current_test)
            .field("has_host", &self.host.is_some())
            .field("subject_live", &self.subject.is_live())
            .field("subjects_created", &self.subject.created_count())
            .field("subjects_disposed", &self.subject.disposed_count())
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl<F: FixtureStrategy> FixtureHost<F> {
    /// Start building a fixture around `strategy` and the process-wide
    /// application context `app`.
    pub fn builder(strategy: F, app: Arc<dyn ApplicationContext>) -> FixtureHostBuilder<F> {
        FixtureHostBuilder {
            strategy,
            app,
            config: FixtureConfig::default(),
            debugger: None,
            dispatcher: None,
        }
    }

    /// Fixture with default configuration.
    pub fn new(strategy: F, app: Arc<dyn ApplicationContext>) -> Self {
        Self::builder(strategy, app).build()
    }

    fn expect_state(&self, operation: &str, allowed: &[FixtureState]) -> ViewbenchResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ViewbenchError::InvalidState {
                message: format!("{operation} called while fixture is {}", self.state),
            })
        }
    }

    /// Make sure the application context exists. Runs once per class.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside `Uninitialized`; initialization errors from
    /// the application context.
    pub fn one_time_setup(&mut self) -> ViewbenchResult<()> {
        self.expect_state("one_time_setup", &[FixtureState::Uninitialized])?;
        ensure_initialized(self.app.as_ref(), &self.config.platform)?;
        self.state = FixtureState::ClassReady;
        tracing::info!("fixture ready");
        Ok(())
    }

    /// Prepare for `test`.
    ///
    /// Enters a fresh locator scope, creates or retitles the host and shows
    /// it. A subject is created, initialized and mounted only when none is
    /// live; a live subject from an earlier test is reused as-is.
    ///
    /// # Errors
    ///
    /// Strategy and host errors propagate unmodified. The fixture is left
    /// in `TestReady` so teardown can still run.
    pub fn setup(&mut self, test: &dyn TestMetadata) -> ViewbenchResult<()> {
        self.expect_state("setup", &[FixtureState::ClassReady, FixtureState::TestReady])?;

        if self.state == FixtureState::TestReady {
            self.locator.exit_scope();
        }
        self.locator.enter_scope();
        self.state = FixtureState::TestReady;
        self.current_test = Some(test.display_name().to_string());

        let title = self.config.title_for(test.display_name());
        let host = match self.host.take() {
            Some(mut host) => {
                host.set_title(&title);
                host
            }
            None => self.strategy.create_host(&title)?,
        };
        let host = self.host.insert(host);
        host.show()?;

        if self.subject.is_live() {
            tracing::debug!(test = test.display_name(), "reusing live subject");
            return Ok(());
        }

        let Some(mut subject) = self.strategy.create_subject()? else {
            tracing::debug!(test = test.display_name(), "strategy produced no subject");
            return Ok(());
        };
        if let Err(e) = self.strategy.initialize_view(&mut subject) {
            subject.dispose();
            return Err(e);
        }
        if let Err(e) = host.mount(&mut subject) {
            subject.dispose();
            return Err(e);
        }
        let subject = self.subject.fill(subject)?;
        self.strategy.after_initialize_view(subject)?;

        tracing::info!(test = test.display_name(), "subject created");
        Ok(())
    }

    /// Clean up after `test`.
    ///
    /// If a debugger is attached and the test failed, opens diagnostics and
    /// suspends instead: nothing is disposed and the call does not return
    /// unless the application context is torn down underneath it.
    /// Otherwise runs the work still queued on the dispatcher, then
    /// disposes the subject, empties the host and leaves the test's locator
    /// scope.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside `TestReady`; the abandoned wait that ended a
    /// suspension; the first error raised by queued work, such as an async
    /// failure report scheduled during the test. Cleanup still completes in
    /// the last case.
    pub fn teardown(&mut self, test: &dyn TestMetadata) -> ViewbenchResult<()> {
        self.expect_state("teardown", &[FixtureState::TestReady])?;

        if test.has_failed() && self.debugger.is_attached() {
            self.state = FixtureState::SuspendedOnFailure;
            tracing::warn!(
                test = test.display_name(),
                failures = test.failure_count(),
                "entering diagnostic suspension"
            );
            let strategy = &mut self.strategy;
            let never =
                enter_diagnostic_suspension(|| strategy.show_diagnostics(), &self.waiter)?;
            match never {}
        }

        let pending = self.drain_pending_work();

        let disposed = self.subject.dispose();
        if let Some(host) = self.host.as_mut() {
            host.unmount();
        }
        self.locator.exit_scope();
        self.current_test = None;
        self.state = FixtureState::ClassReady;

        tracing::info!(
            test = test.display_name(),
            disposed,
            subjects_disposed = self.subject.disposed_count(),
            "test torn down"
        );
        pending
    }

    /// Dispose a subject still alive and close the host. Runs once per
    /// class, including classes that never ran a test.
    ///
    /// # Errors
    ///
    /// `InvalidState` when suspended or already torn down. Otherwise the
    /// first error raised by work still queued on the dispatcher, reported
    /// after the class has been torn down.
    pub fn one_time_teardown(&mut self) -> ViewbenchResult<()> {
        self.expect_state(
            "one_time_teardown",
            &[
                FixtureState::Uninitialized,
                FixtureState::ClassReady,
                FixtureState::TestReady,
            ],
        )?;

        let pending = self.drain_pending_work();

        let disposed = self.subject.dispose();
        if let Some(mut host) = self.host.take() {
            if disposed {
                host.unmount();
            }
            host.close();
        }
        while self.locator.exit_scope() {}
        self.current_test = None;
        self.state = FixtureState::TornDown;

        tracing::info!(
            disposed,
            subjects_created = self.subject.created_count(),
            subjects_disposed = self.subject.disposed_count(),
            "fixture torn down"
        );
        pending
    }

    // Runs everything still queued so failure reports land on the test that
    // caused them. Keeps pumping past errors and returns the first one.
    fn drain_pending_work(&self) -> ViewbenchResult<()> {
        let mut first = None;
        while let Err(e) = self.dispatcher.run_until_idle() {
            tracing::warn!(error = %e, "queued work failed during teardown");
            first.get_or_insert(e);
        }
        first.map_or(Ok(()), Err)
    }

    /// Wait with the configured default timeout.
    pub fn wait_for<P>(&self, predicate: P, purpose: &str) -> ViewbenchResult<WaitResult>
    where
        P: FnMut() -> bool,
    {
        self.waiter
            .wait_for(predicate, self.config.default_timeout(), purpose)
    }

    /// Wait with an explicit timeout.
    pub fn wait_for_within<P>(
        &self,
        predicate: P,
        timeout: impl Into<WaitTimeout>,
        purpose: &str,
    ) -> ViewbenchResult<WaitResult>
    where
        P: FnMut() -> bool,
    {
        self.waiter.wait_for(predicate, timeout, purpose)
    }

    /// Pump one unit of UI work and yield for the poll interval.
    pub fn do_events(&self) -> ViewbenchResult<()> {
        self.dispatcher.pump_one()?;
        std::thread::sleep(self.config.poll_interval());
        Ok(())
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> FixtureState {
        self.state
    }

    /// Display name of the test currently set up
    #[must_use]
    pub fn current_test(&self) -> Option<&str> {
        self.current_test.as_deref()
    }

    /// The live subject
    #[must_use]
    pub const fn subject(&self) -> Option<&F::Subject> {
        self.subject.get()
    }

    /// The live subject, mutably
    #[must_use]
    pub fn subject_mut(&mut self) -> Option<&mut F::Subject> {
        self.subject.get_mut()
    }

    /// The host container, once a test has been set up
    #[must_use]
    pub const fn host(&self) -> Option<&F::Host> {
        self.host.as_ref()
    }

    /// The strategy
    #[must_use]
    pub const fn strategy(&self) -> &F {
        &self.strategy
    }

    /// Service locator; registrations go into the current test's scope
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Service locator, mutably
    #[must_use]
    pub fn locator_mut(&mut self) -> &mut Locator {
        &mut self.locator
    }

    /// Dispatcher the fixture pumps while waiting
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The fixture's waiter
    #[must_use]
    pub const fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Bridge for reporting background failures; clone it into callbacks
    #[must_use]
    pub const fn async_bridge(&self) -> &AsyncExceptionBridge {
        &self.bridge
    }

    /// Whether background failures fail the test
    #[must_use]
    pub fn fail_on_async_exceptions(&self) -> bool {
        self.bridge.fail_on_async_exceptions()
    }

    /// Change the background failure policy
    pub fn set_fail_on_async_exceptions(&self, fail: bool) {
        self.bridge.set_fail_on_async_exceptions(fail);
    }

    /// Timeout used by [`Self::wait_for`]
    #[must_use]
    pub const fn default_timeout(&self) -> std::time::Duration {
        self.config.default_timeout()
    }

    /// The fixture's configuration
    #[must_use]
    pub const fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// The application context
    #[must_use]
    pub fn app(&self) -> &dyn ApplicationContext {
        self.app.as_ref()
    }
}
