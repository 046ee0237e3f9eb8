//! Single-assignment, multi-read completion cell with bounded-wait reads.

use std::fmt;

use tracing::trace;
use web_time::{Duration, Instant};

use crate::recorder::MAX_WAIT;
use crate::report_violation;
use crate::sync::{lock, wait_until, Arc, Condvar, Mutex};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::HarnessError;

/// Observer handle shared with producer threads.
pub type SharedObserver = std::sync::Arc<dyn ViolationObserver>;

struct Shared<T> {
    name: &'static str,
    value: Mutex<Option<T>>,
    completed: Condvar,
    observer: Option<SharedObserver>,
}

/// A value that is set once and read many times.
///
/// For events that happen at most once per session, such as "opened" or
/// "closed". The first [`complete`](Self::complete) wins: later calls return
/// `false`, leave the stored value untouched and are reported as a
/// [`ViolationKind::DuplicateCompletion`] warning.
///
/// Cloning a `OneShot` yields another handle to the same cell.
///
/// # Examples
///
/// ```
/// use ike_harness::OneShot;
/// use std::time::Duration;
///
/// let config = OneShot::new("config");
/// assert!(config.complete("ike-config"));
/// assert!(!config.complete("other"));
/// assert_eq!(config.get(Duration::from_millis(10)).unwrap(), "ike-config");
/// ```
pub struct OneShot<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("name", &self.shared.name)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> OneShot<T> {
    /// Creates an uncompleted cell. Duplicate completions are logged through
    /// [`TracingObserver`](crate::telemetry::TracingObserver).
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::build(name, None)
    }

    /// Creates an uncompleted cell that reports duplicate completions to `observer`.
    #[must_use]
    pub fn with_observer(name: &'static str, observer: SharedObserver) -> Self {
        Self::build(name, Some(observer))
    }

    fn build(name: &'static str, observer: Option<SharedObserver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                value: Mutex::new(None),
                completed: Condvar::new(),
                observer,
            }),
        }
    }

    /// The name given at construction.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Stores `value` and releases every waiter. Returns `false` without
    /// touching the stored value if the cell was already completed.
    pub fn complete(&self, value: T) -> bool {
        {
            let mut slot = lock(&self.shared.value);
            if slot.is_some() {
                drop(slot);
                self.report_duplicate();
                return false;
            }
            *slot = Some(value);
        }
        self.shared.completed.notify_all();
        trace!(name = self.shared.name, "one-shot completed");
        true
    }

    /// Returns `true` once [`complete`](Self::complete) has succeeded.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        lock(&self.shared.value).is_some()
    }

    fn report_duplicate(&self) {
        report_violation!(
            self.shared.observer.as_ref(),
            ViolationSeverity::Warning,
            ViolationKind::DuplicateCompletion,
            "{} completed more than once; keeping the first value",
            self.shared.name
        );
    }
}

impl<T: Clone> OneShot<T> {
    /// Returns the value if the cell has been completed.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        lock(&self.shared.value).clone()
    }

    /// Waits up to `timeout` for the cell to be completed.
    pub fn get(&self, timeout: Duration) -> Result<T, HarnessError> {
        let timed_out = || HarnessError::Timeout {
            category: self.shared.name,
            index: None,
            waited: timeout,
        };
        let deadline = Instant::now()
            .checked_add(timeout.min(MAX_WAIT))
            .ok_or_else(timed_out)?;

        let mut slot = lock(&self.shared.value);
        loop {
            if let Some(value) = slot.as_ref() {
                return Ok(value.clone());
            }
            let (guard, expired) = wait_until(&self.shared.completed, slot, deadline);
            slot = guard;
            if expired {
                return slot.clone().ok_or_else(|| {
                    trace!(name = self.shared.name, "timed out waiting for one-shot");
                    timed_out()
                });
            }
        }
    }
}
