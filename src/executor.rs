//! A single-thread executor for delivering protocol callbacks.
//!
//! Protocol implementations deliver notifications on an executor chosen by
//! the test. Using one dedicated worker per session means notifications reach
//! the capture adapters from a thread other than the test's, in the order the
//! protocol issued them.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::HarnessError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs one at a time, in submission order, on a named
/// worker thread.
///
/// Dropping the executor stops accepting jobs, lets the worker finish the
/// ones already queued, and joins it.
///
/// # Example
///
/// ```
/// use ike_harness::{EventRecorder, SerialExecutor};
/// use std::time::Duration;
///
/// let executor = SerialExecutor::new("callbacks").unwrap();
/// let recorder = EventRecorder::new("created");
/// let producer = recorder.clone();
/// executor.execute(move || { producer.append(1); }).unwrap();
/// assert_eq!(recorder.await_at(0, |_| true, Duration::from_secs(1)).unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct SerialExecutor {
    name: String,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialExecutor {
    /// Spawns the worker thread.
    pub fn new(name: impl Into<String>) -> Result<Self, HarnessError> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|err| HarnessError::ExecutorSpawn {
                context: err.to_string(),
            })?;
        debug!(executor = %name, "callback executor started");
        Ok(Self {
            name,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// The worker thread's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `job` behind every job submitted before it.
    ///
    /// Fails with [`HarnessError::ExecutorShutdown`] if the worker is gone,
    /// e.g. because an earlier job panicked.
    pub fn execute<F>(&self, job: F) -> Result<(), HarnessError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(HarnessError::ExecutorShutdown)?;
        sender
            .send(Box::new(job))
            .map_err(|_closed| HarnessError::ExecutorShutdown)
    }

    /// Stops accepting jobs, runs the ones already queued and joins the
    /// worker. Later calls do nothing; later [`execute`](Self::execute) calls
    /// fail with [`HarnessError::ExecutorShutdown`].
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(executor = %self.name, "callback executor worker panicked");
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
