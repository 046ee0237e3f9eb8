use std::error::Error;
use std::fmt;
use std::fmt::Display;

use web_time::Duration;

/// This enum contains all error messages this library can return. Most API functions will generally return a [`Result<T, HarnessError>`].
///
/// A [`HarnessError::Timeout`] is the normal way of learning that an awaited
/// event did not happen; it is not a crash and leaves all shared state intact.
///
/// [`Result<T, HarnessError>`]: std::result::Result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HarnessError {
    /// A bounded wait ended before the awaited event became available.
    Timeout {
        /// The event category that was awaited (e.g. `"created"`, `"config"`).
        category: &'static str,
        /// The recorder index that was awaited, or `None` for one-shot completions.
        index: Option<usize>,
        /// How long the caller was willing to wait.
        waited: Duration,
    },
    /// A configuration value is out of range. Reported when the configured
    /// object is constructed, never later.
    InvalidConfig {
        /// Further specifies why the configuration was rejected.
        info: String,
    },
    /// The callback executor's worker thread could not be started.
    ExecutorSpawn {
        /// The underlying I/O error.
        context: String,
    },
    /// The callback executor's worker thread is gone and cannot accept jobs.
    ExecutorShutdown,
    /// The test network collaborator failed to bring an interface up or down.
    Network {
        /// A description of the network failure.
        context: String,
    },
}

impl HarnessError {
    /// Returns `true` if this error is a [`HarnessError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Timeout {
                category,
                index: Some(index),
                waited,
            } => {
                write!(
                    f,
                    "Timed out after {:?} waiting for {} event #{}",
                    waited, category, index
                )
            }
            HarnessError::Timeout {
                category,
                index: None,
                waited,
            } => {
                write!(f, "Timed out after {:?} waiting for {}", waited, category)
            }
            HarnessError::InvalidConfig { info } => {
                write!(f, "Invalid configuration: {}", info)
            }
            HarnessError::ExecutorSpawn { context } => {
                write!(f, "Failed to start the callback executor: {}", context)
            }
            HarnessError::ExecutorShutdown => {
                write!(f, "The callback executor has shut down.")
            }
            HarnessError::Network { context } => {
                write!(f, "Test network error: {}", context)
            }
        }
    }
}

impl Error for HarnessError {}
