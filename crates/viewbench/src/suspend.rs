//! Debug Escape Hook
//!
//! When a test fails while a debugger is attached, teardown would destroy
//! exactly the state someone wants to look at. Instead the fixture opens the
//! toolkit's diagnostic console and parks the UI thread in an endless wait
//! that keeps pumping UI work, so the live UI stays inspectable.

use crate::result::{ViewbenchError, ViewbenchResult};
use crate::wait::{WaitTimeout, Waiter};
use std::convert::Infallible;

/// Purpose label of the suspension wait
pub const SUSPENSION_PURPOSE: &str = "diagnostic suspension";

/// Show diagnostics, then block forever.
///
/// The success type is uninhabited. The call only comes back when the
/// application context is torn down (an abandoned `Timeout`). Errors raised
/// by pumped jobs, late async failure reports included, are logged and the
/// wait resumes.
pub fn enter_diagnostic_suspension<D>(
    show_diagnostics: D,
    waiter: &Waiter,
) -> ViewbenchResult<Infallible>
where
    D: FnOnce(),
{
    tracing::warn!("test failed under a debugger, suspending teardown for inspection");
    show_diagnostics();
    loop {
        match waiter.wait_for(|| false, WaitTimeout::Unbounded, SUSPENSION_PURPOSE) {
            Err(e @ ViewbenchError::Timeout {
                abandoned: true, ..
            }) => return Err(e),
            Err(e) => tracing::warn!(error = %e, "error while suspended, still waiting"),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::app::{ApplicationContext, HeadlessApp, PlatformOptions};
    use crate::dispatcher::{Dispatcher, Priority};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    fn running_app() -> Arc<HeadlessApp> {
        let app = Arc::new(HeadlessApp::new());
        app.initialize(&PlatformOptions::default()).unwrap();
        app
    }

    #[test]
    fn test_blocks_until_app_torn_down() {
        let app = running_app();
        let waiter = Waiter::new(
            Arc::new(Dispatcher::new()),
            app.clone(),
            Duration::from_millis(1),
        );
        let shown = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::channel();
        let shown_flag = shown.clone();
        let handle = std::thread::spawn(move || {
            let result = enter_diagnostic_suspension(
                || shown_flag.store(true, Ordering::SeqCst),
                &waiter,
            );
            let _ = tx.send(result.map(|never| match never {}));
        });

        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        assert!(shown.load(Ordering::SeqCst));

        app.shutdown();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();

        match result {
            Err(ViewbenchError::Timeout {
                purpose, abandoned, ..
            }) => {
                assert_eq!(purpose, SUSPENSION_PURPOSE);
                assert!(abandoned);
            }
            other => panic!("expected abandoned timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_failing_jobs_do_not_end_suspension() {
        let app = running_app();
        let dispatcher = Dispatcher::new();
        let waiter = Waiter::new(
            Arc::new(dispatcher.clone()),
            app.clone(),
            Duration::from_millis(1),
        );

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let result = enter_diagnostic_suspension(|| {}, &waiter);
            let _ = tx.send(result.map(|never| match never {}));
        });

        dispatcher.post(Priority::Normal, || {
            Err(ViewbenchError::AsyncFailure {
                details: "late background error".to_string(),
            })
        });
        dispatcher.post(Priority::Background, || Err(ViewbenchError::setup("job failed")));

        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        assert!(dispatcher.is_idle());

        app.shutdown();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(matches!(
            result,
            Err(ViewbenchError::Timeout {
                abandoned: true,
                ..
            })
        ));
    }

    #[test]
    fn test_returns_immediately_without_app() {
        let waiter = Waiter::new(
            Arc::new(Dispatcher::new()),
            Arc::new(HeadlessApp::new()),
            Duration::from_millis(1),
        );
        let result = enter_diagnostic_suspension(|| {}, &waiter);
        assert!(result.is_err());
    }
}
