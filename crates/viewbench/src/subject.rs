//! The component under test and the slot that owns it.

use crate::result::{ViewbenchError, ViewbenchResult};

/// A component that can be hosted by a fixture.
///
/// Subjects are default-constructible and hold resources that must be
/// released explicitly.
pub trait Subject: Default {
    /// Release the subject's resources.
    fn dispose(&mut self);
}

/// Optional-owned slot for the live subject.
///
/// Filling and disposing are the only ways the slot changes, and a live
/// subject is never replaced silently.
#[derive(Debug)]
pub struct SubjectSlot<S> {
    subject: Option<S>,
    created: usize,
    disposed: usize,
}

impl<S> Default for SubjectSlot<S> {
    fn default() -> Self {
        Self {
            subject: None,
            created: 0,
            disposed: 0,
        }
    }
}

impl<S: Subject> SubjectSlot<S> {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a subject is live
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.subject.is_some()
    }

    /// The live subject
    #[must_use]
    pub const fn get(&self) -> Option<&S> {
        self.subject.as_ref()
    }

    /// The live subject, mutably
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.subject.as_mut()
    }

    /// Store a freshly created subject.
    ///
    /// # Errors
    ///
    /// `InvalidState` if a subject is already live; the new one is disposed.
    pub fn fill(&mut self, mut subject: S) -> ViewbenchResult<&mut S> {
        if self.subject.is_some() {
            subject.dispose();
            return Err(ViewbenchError::InvalidState {
                message: "a live subject cannot be replaced".to_string(),
            });
        }
        self.created += 1;
        Ok(self.subject.insert(subject))
    }

    /// Dispose the live subject, if any, and empty the slot.
    ///
    /// Returns `true` when a subject was disposed.
    pub fn dispose(&mut self) -> bool {
        match self.subject.take() {
            Some(mut subject) => {
                subject.dispose();
                self.disposed += 1;
                true
            }
            None => false,
        }
    }

    /// Subjects stored over the slot's lifetime
    #[must_use]
    pub const fn created_count(&self) -> usize {
        self.created
    }

    /// Subjects disposed over the slot's lifetime
    #[must_use]
    pub const fn disposed_count(&self) -> usize {
        self.disposed
    }
}
