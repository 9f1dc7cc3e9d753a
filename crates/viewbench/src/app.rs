//! Application context provider.
//!
//! A UI toolkit needs exactly one runtime context per process. Fixtures
//! receive the context as an explicit dependency and initialize it through
//! [`ensure_initialized`], which skips the work when an earlier fixture in
//! the same process already did it.

use crate::result::ViewbenchResult;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Options passed to the toolkit when the application context is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformOptions {
    /// Run without a visible display where the toolkit supports it
    pub headless: bool,
    /// Application name reported to the toolkit
    pub app_name: String,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            headless: true,
            app_name: "viewbench".to_string(),
        }
    }
}

impl PlatformOptions {
    /// Create default platform options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set application name
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }
}

/// Process-wide UI application context.
pub trait ApplicationContext: Send + Sync {
    /// Whether the context exists and is usable.
    fn is_initialized(&self) -> bool;

    /// Create the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolkit refuses to start.
    fn initialize(&self, options: &PlatformOptions) -> ViewbenchResult<()>;
}

/// Initialize `app` unless it already is.
///
/// Returns `true` when this call performed the initialization. Test
/// execution is serialized by the outer runner, so check-then-init is
/// enough here.
pub fn ensure_initialized(
    app: &dyn ApplicationContext,
    options: &PlatformOptions,
) -> ViewbenchResult<bool> {
    if app.is_initialized() {
        tracing::debug!("application context already initialized");
        return Ok(false);
    }
    app.initialize(options)?;
    tracing::info!(app = %options.app_name, headless = options.headless, "application context initialized");
    Ok(true)
}

/// In-process application context with no real toolkit behind it.
///
/// Useful for headless fixtures and for tests of the lifecycle itself.
/// [`HeadlessApp::shutdown`] tears the context down, which makes any
/// in-progress wait give up.
#[derive(Debug, Default)]
pub struct HeadlessApp {
    initialized: AtomicBool,
    init_count: AtomicUsize,
}

impl HeadlessApp {
    /// Create an uninitialized context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance for every fixture in the process.
    #[must_use]
    pub fn process() -> Arc<Self> {
        static PROCESS_APP: OnceLock<Arc<HeadlessApp>> = OnceLock::new();
        PROCESS_APP.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Tear the context down.
    pub fn shutdown(&self) {
        if self.initialized.swap(false, Ordering::SeqCst) {
            tracing::info!("application context shut down");
        }
    }

    /// Number of times `initialize` actually ran.
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }
}

impl ApplicationContext for HeadlessApp {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn initialize(&self, _options: &PlatformOptions) -> ViewbenchResult<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }
}
