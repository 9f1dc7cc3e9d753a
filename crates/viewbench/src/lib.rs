//! Viewbench: Lifecycle Management for UI Component Test Fixtures
//!
//! A fixture owns a host container (a window) and one subject (the component
//! under test) for a whole test class. Before each test the container is
//! shown and retitled, and a subject is created if none is alive; after each
//! test the subject is disposed. Tests block on asynchronous UI state with a
//! cooperative wait that keeps pumping the UI work queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      FixtureHost<Strategy>                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  one_time_setup ─► setup ─► (test body) ─► teardown ─► ...        │
//! │                      │          │             │                   │
//! │                      ▼          ▼             ▼                   │
//! │              HostContainer    Waiter    debugger + failure?       │
//! │              SubjectSlot        │          yes ─► suspension      │
//! │                                 ▼                                 │
//! │   background ─► AsyncExceptionBridge ─► Dispatcher ─► pump_one    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The toolkit itself stays outside: it is plugged in through
//! [`ApplicationContext`], [`HostContainer`], [`Mount`], [`Subject`] and
//! [`FixtureStrategy`]. [`HeadlessApp`] and [`HeadlessHost`] are in-memory
//! implementations for headless runs.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod app;
mod bridge;
pub mod config;
mod debugger;
mod dispatcher;
mod fixture;
mod host;
mod locator;
pub mod logging;
mod result;
mod subject;
mod suspend;
mod test_run;
mod wait;

pub use app::{ensure_initialized, ApplicationContext, HeadlessApp, PlatformOptions};
pub use bridge::{AsyncException, AsyncExceptionBridge};
pub use config::FixtureConfig;
pub use debugger::{DebuggerProbe, FixedDebugger, ProcessDebugger};
pub use dispatcher::{Dispatcher, Job, Priority, Pump};
pub use fixture::{FixtureHost, FixtureHostBuilder, FixtureState, FixtureStrategy};
pub use host::{HeadlessHost, HostContainer, HostEvent, HostLog, Mount};
pub use locator::Locator;
pub use result::{ViewbenchError, ViewbenchResult};
pub use subject::{Subject, SubjectSlot};
pub use suspend::{enter_diagnostic_suspension, SUSPENSION_PURPOSE};
pub use test_run::{TestMetadata, TestRun};
pub use wait::{FnCondition, WaitCondition, WaitRequest, WaitResult, WaitTimeout, Waiter};

/// Everything a fixture author usually needs
pub mod prelude {
    pub use super::app::*;
    pub use super::bridge::*;
    pub use super::config::FixtureConfig;
    pub use super::debugger::*;
    pub use super::dispatcher::{Dispatcher, Priority, Pump};
    pub use super::fixture::*;
    pub use super::host::*;
    pub use super::locator::*;
    pub use super::result::*;
    pub use super::subject::*;
    pub use super::test_run::*;
    pub use super::wait::*;
}
