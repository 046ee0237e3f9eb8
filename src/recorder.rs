//! Append-only, thread-safe event log with bounded-wait indexed reads.
//!
//! An [`EventRecorder`] is shared between any number of producers (protocol
//! callbacks running on arbitrary threads) and a consumer that asks "has the
//! N-th event of this category arrived yet?". Index `i` always refers to the
//! `i`-th event ever appended, so a consumer can start waiting before anything
//! was recorded, and can go back and re-inspect earlier positions.
//!
//! ```
//! use ike_harness::EventRecorder;
//! use std::time::Duration;
//!
//! let errors = EventRecorder::new("errors");
//! let producer = errors.clone();
//! std::thread::spawn(move || {
//!     producer.append("NO_PROPOSAL_CHOSEN");
//! });
//!
//! let first = errors.await_at(0, |_| true, Duration::from_secs(1)).unwrap();
//! assert_eq!(first, "NO_PROPOSAL_CHOSEN");
//! ```

use std::fmt;

use tracing::trace;
use web_time::{Duration, Instant};

use crate::sync::{lock, wait_until, Arc, Condvar, Mutex};
use crate::HarnessError;

/// Upper bound on a single wait; longer timeouts are clamped to this.
pub(crate) const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// One recorded event together with its arrival position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord<T> {
    /// Position in the recorder; the `index`-th event ever appended.
    pub index: usize,
    /// The recorded payload.
    pub event: T,
}

struct Shared<T> {
    category: &'static str,
    events: Mutex<Vec<T>>,
    appended: Condvar,
}

/// An append-only, ordered log of events of one category.
///
/// Cloning an `EventRecorder` yields another handle to the same log.
/// [`append`](Self::append) never waits on consumers: it holds the lock only
/// long enough to push and then wakes every waiter, which re-checks its own
/// condition.
pub struct EventRecorder<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for EventRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for EventRecorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("category", &self.shared.category)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> EventRecorder<T> {
    /// Creates an empty recorder. `category` names the events in logs and
    /// timeout errors.
    #[must_use]
    pub fn new(category: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                category,
                events: Mutex::new(Vec::new()),
                appended: Condvar::new(),
            }),
        }
    }

    /// The category name given at construction.
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.shared.category
    }

    /// Appends `event` and returns the index it was assigned.
    ///
    /// The event is visible to every reader before this returns.
    pub fn append(&self, event: T) -> usize {
        let index = {
            let mut events = lock(&self.shared.events);
            events.push(event);
            events.len() - 1
        };
        self.shared.appended.notify_all();
        trace!(category = self.shared.category, index, "event recorded");
        index
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.shared.events).len()
    }

    /// Returns `true` if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a cursor that starts at index 0.
    #[must_use]
    pub fn reader(&self) -> ReadHead<T> {
        ReadHead {
            recorder: self.clone(),
            next: 0,
        }
    }

    fn timeout(&self, index: usize, waited: Duration) -> HarnessError {
        HarnessError::Timeout {
            category: self.shared.category,
            index: Some(index),
            waited,
        }
    }
}

impl<T: Clone> EventRecorder<T> {
    /// Returns the event at `index` if it has already been recorded.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        lock(&self.shared.events).get(index).cloned()
    }

    /// Returns a copy of every event recorded so far, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.shared.events).clone()
    }

    /// Waits until the event at `index` exists and satisfies `predicate`.
    ///
    /// The event stored at an index never changes, so if it exists but is
    /// rejected by `predicate` this keeps waiting and eventually fails with
    /// [`HarnessError::Timeout`]. Returns no later than `timeout` (plus
    /// scheduling slack) after the call.
    pub fn await_at<F>(&self, index: usize, predicate: F, timeout: Duration) -> Result<T, HarnessError>
    where
        F: Fn(&T) -> bool,
    {
        self.wait_for(timeout, index, |events| {
            events.get(index).filter(|e| predicate(*e)).cloned()
        })
    }

    /// Waits for the first event at position `start` or later that satisfies
    /// `predicate` and returns it with its index.
    pub fn await_matching_from<F>(
        &self,
        start: usize,
        predicate: F,
        timeout: Duration,
    ) -> Result<EventRecord<T>, HarnessError>
    where
        F: Fn(&T) -> bool,
    {
        self.wait_for(timeout, start, |events| {
            events
                .iter()
                .enumerate()
                .skip(start)
                .find(|(_, e)| predicate(*e))
                .map(|(index, event)| EventRecord {
                    index,
                    event: event.clone(),
                })
        })
    }

    /// Blocks until `probe` yields a value or the deadline passes.
    fn wait_for<R, P>(&self, timeout: Duration, index: usize, probe: P) -> Result<R, HarnessError>
    where
        P: Fn(&[T]) -> Option<R>,
    {
        let deadline = match Instant::now().checked_add(timeout.min(MAX_WAIT)) {
            Some(deadline) => deadline,
            None => return Err(self.timeout(index, timeout)),
        };
        let mut events = lock(&self.shared.events);
        loop {
            if let Some(found) = probe(events.as_slice()) {
                return Ok(found);
            }
            let (guard, timed_out) = wait_until(&self.shared.appended, events, deadline);
            events = guard;
            if timed_out {
                // One last look: the append may have raced the deadline.
                return probe(events.as_slice()).ok_or_else(|| {
                    trace!(
                        category = self.shared.category,
                        index,
                        "timed out waiting for event"
                    );
                    self.timeout(index, timeout)
                });
            }
        }
    }
}

impl<T> Default for EventRecorder<T> {
    fn default() -> Self {
        Self::new("events")
    }
}

/// A consumer's cursor over an [`EventRecorder`].
///
/// Holds the implicit "next index I have not consumed" for one logical
/// consumer. Cursors over the same recorder are independent. The cursor only
/// moves when a read succeeds, so a timed-out read can be retried.
#[derive(Debug, Clone)]
pub struct ReadHead<T> {
    recorder: EventRecorder<T>,
    next: usize,
}

impl<T: Clone> ReadHead<T> {
    /// Index the next call to [`next`](Self::next) will wait for.
    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }

    /// Waits for the next unconsumed event and advances past it.
    pub fn next(&mut self, timeout: Duration) -> Result<T, HarnessError> {
        let event = self.recorder.await_at(self.next, |_| true, timeout)?;
        self.next += 1;
        Ok(event)
    }

    /// Waits for the next unconsumed event satisfying `predicate`, skipping
    /// any that do not, and advances past the match.
    pub fn next_matching<F>(&mut self, predicate: F, timeout: Duration) -> Result<T, HarnessError>
    where
        F: Fn(&T) -> bool,
    {
        let record = self
            .recorder
            .await_matching_from(self.next, predicate, timeout)?;
        self.next = record.index + 1;
        Ok(record.event)
    }
}
