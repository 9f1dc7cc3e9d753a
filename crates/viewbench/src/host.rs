//! Host container contract.
//!
//! The host is the top-level UI surface (a window, a frame) whose content
//! slot holds the subject under test. Toolkit bindings implement
//! [`HostContainer`] for the surface and [`Mount`] for each subject type it
//! accepts; [`HeadlessHost`] is an in-memory implementation that records
//! what happened to it.

use crate::result::{ViewbenchError, ViewbenchResult};
use std::sync::{Arc, Mutex, PoisonError};

/// Top-level surface with a content slot.
pub trait HostContainer {
    /// Current title
    fn title(&self) -> &str;

    /// Replace the title
    fn set_title(&mut self, title: &str);

    /// Make the container visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolkit cannot show the surface.
    fn show(&mut self) -> ViewbenchResult<()>;

    /// Empty the content slot
    fn unmount(&mut self);

    /// Whether the content slot is occupied
    fn has_content(&self) -> bool;

    /// Close the container
    fn close(&mut self);
}

/// A host container that can hold subjects of type `S`.
pub trait Mount<S>: HostContainer {
    /// Place `subject` in the content slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolkit rejects the content.
    fn mount(&mut self, subject: &mut S) -> ViewbenchResult<()>;
}

/// Something that happened to a [`HeadlessHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Created with a title
    Created(String),
    /// Retitled
    Titled(String),
    /// Shown
    Shown,
    /// Content mounted
    Mounted,
    /// Content removed
    Unmounted,
    /// Closed
    Closed,
}

/// Shared, cloneable record of host events.
#[derive(Debug, Clone, Default)]
pub struct HostLog {
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl HostLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: HostEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of all events so far
    #[must_use]
    pub fn events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `event` was recorded
    #[must_use]
    pub fn count(&self, event: &HostEvent) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| *e == event)
            .count()
    }
}

/// In-memory host container.
#[derive(Debug)]
pub struct HeadlessHost {
    title: String,
    visible: bool,
    occupied: bool,
    closed: bool,
    log: HostLog,
}

impl HeadlessHost {
    /// Create a host with its own log
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self::with_log(title, HostLog::new())
    }

    /// Create a host recording into `log`
    #[must_use]
    pub fn with_log(title: &str, log: HostLog) -> Self {
        log.push(HostEvent::Created(title.to_string()));
        Self {
            title: title.to_string(),
            visible: false,
            occupied: false,
            closed: false,
            log,
        }
    }

    /// Whether `show` has been called
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether `close` has been called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The event log
    #[must_use]
    pub fn log(&self) -> HostLog {
        self.log.clone()
    }
}

impl HostContainer for HeadlessHost {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: &str) {
        title.clone_into(&mut self.title);
        self.log.push(HostEvent::Titled(title.to_string()));
    }

    fn show(&mut self) -> ViewbenchResult<()> {
        if self.closed {
            return Err(ViewbenchError::InvalidState {
                message: "cannot show a closed host".to_string(),
            });
        }
        self.visible = true;
        self.log.push(HostEvent::Shown);
        Ok(())
    }

    fn unmount(&mut self) {
        self.occupied = false;
        self.log.push(HostEvent::Unmounted);
    }

    fn has_content(&self) -> bool {
        self.occupied
    }

    fn close(&mut self) {
        self.visible = false;
        self.occupied = false;
        self.closed = true;
        self.log.push(HostEvent::Closed);
    }
}

impl<S> Mount<S> for HeadlessHost {
    fn mount(&mut self, _subject: &mut S) -> ViewbenchResult<()> {
        self.occupied = true;
        self.log.push(HostEvent::Mounted);
        Ok(())
    }
}
