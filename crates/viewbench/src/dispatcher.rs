//! UI work queue and the pump primitive.
//!
//! Background threads hand results to the UI thread by posting jobs onto a
//! [`Dispatcher`]. Jobs only run when the UI thread pumps, which is what
//! the condition waiter does between predicate checks.

use crate::result::ViewbenchResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A unit of UI work. An `Err` surfaces on the thread that pumped it.
pub type Job = Box<dyn FnOnce() -> ViewbenchResult<()> + Send>;

/// Scheduling priority of a posted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// Runs on every pump step
    #[default]
    Normal,
    /// At most one runs per pump step, after all normal work
    Background,
}

/// Processes one unit of queued UI work.
pub trait Pump {
    /// Run pending work up to and including one background-priority unit.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a job; jobs after it stay queued.
    fn pump_one(&self) -> ViewbenchResult<()>;
}

#[derive(Default)]
struct Queues {
    normal: VecDeque<Job>,
    background: VecDeque<Job>,
}

/// Cloneable handle to the UI thread's work queue.
///
/// Any thread may post; jobs run on whichever thread calls
/// [`Pump::pump_one`], never while the queue lock is held.
#[derive(Clone, Default)]
pub struct Dispatcher {
    queues: Arc<Mutex<Queues>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queues = self.lock();
        f.debug_struct("Dispatcher")
            .field("normal", &queues.normal.len())
            .field("background", &queues.background.len())
            .finish()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a fallible job
    pub fn post<F>(&self, priority: Priority, job: F)
    where
        F: FnOnce() -> ViewbenchResult<()> + Send + 'static,
    {
        let mut queues = self.lock();
        match priority {
            Priority::Normal => queues.normal.push_back(Box::new(job)),
            Priority::Background => queues.background.push_back(Box::new(job)),
        }
    }

    /// Queue an infallible job at normal priority
    pub fn invoke<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Priority::Normal, move || {
            job();
            Ok(())
        });
    }

    /// Number of queued jobs across both priorities
    #[must_use]
    pub fn pending(&self) -> usize {
        let queues = self.lock();
        queues.normal.len() + queues.background.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Pump until the queue is empty, returning the number of pump steps.
    pub fn run_until_idle(&self) -> ViewbenchResult<usize> {
        let mut steps = 0;
        while !self.is_idle() {
            self.pump_one()?;
            steps += 1;
        }
        Ok(steps)
    }

    fn requeue_front(&self, jobs: VecDeque<Job>) {
        let mut queues = self.lock();
        for job in jobs.into_iter().rev() {
            queues.normal.push_front(job);
        }
    }
}

impl Pump for Dispatcher {
    fn pump_one(&self) -> ViewbenchResult<()> {
        let mut batch = std::mem::take(&mut self.lock().normal);
        while let Some(job) = batch.pop_front() {
            if let Err(e) = job() {
                self.requeue_front(batch);
                return Err(e);
            }
        }

        let background = self.lock().background.pop_front();
        if let Some(job) = background {
            job()?;
        }
        Ok(())
    }
}
