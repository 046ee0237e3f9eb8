//! Structured reporting of harness contract violations.
//!
//! Some misuse of the harness is not an error the caller can handle, for
//! example completing a [`OneShot`](crate::OneShot) twice. Instead of just
//! logging with `tracing::warn!`, such violations are structured data that can be:
//!
//! - Logged via tracing (the default)
//! - Collected programmatically for testing
//!
//! # Example
//!
//! ```
//! use ike_harness::telemetry::CollectingObserver;
//! use ike_harness::OneShot;
//! use std::sync::Arc;
//!
//! let observer = Arc::new(CollectingObserver::new());
//! let closed = OneShot::<u8>::with_observer("closed", observer.clone());
//!
//! assert!(closed.complete(1));
//! assert!(!closed.complete(2));
//! assert_eq!(observer.len(), 1);
//! ```

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity of a contract violation.
///
/// Severities are ordered from least to most severe, allowing filtering
/// and comparison operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Unexpected but harmless: the call was ignored.
    Warning,
    /// The harness state is intact but a test is probably wrong.
    Error,
}

impl ViolationSeverity {
    /// Returns a string representation suitable for logging labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of contract violations.
///
/// This enum is marked `#[non_exhaustive]`; always include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationKind {
    /// A one-shot completion was completed more than once.
    DuplicateCompletion,
    /// A notification arrived after the session reported it was closed.
    NotificationAfterClose,
    /// A session reported both a normal and an abnormal close.
    ConflictingClose,
}

impl ViolationKind {
    /// Returns a string representation suitable for logging labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateCompletion => "duplicate_completion",
            Self::NotificationAfterClose => "notification_after_close",
            Self::ConflictingClose => "conflicting_close",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported contract violation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContractViolation {
    /// The severity level of this violation.
    pub severity: ViolationSeverity,
    /// The kind of misuse.
    pub kind: ViolationKind,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location where the violation was detected (file:line).
    pub location: &'static str,
    /// Additional structured context as key-value pairs.
    pub context: BTreeMap<String, String>,
}

impl ContractViolation {
    /// Creates a new contract violation.
    #[must_use]
    pub fn new(
        severity: ViolationSeverity,
        kind: ViolationKind,
        message: impl Into<String>,
        location: &'static str,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
            context: BTreeMap::new(),
        }
    }

    /// Adds a context key-value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Serializes this violation to a JSON string.
    ///
    /// Returns `None` if serialization fails.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} (at {}",
            self.severity, self.kind, self.message, self.location
        )?;
        if !self.context.is_empty() {
            write!(f, ", context={:?}", self.context)?;
        }
        write!(f, ")")
    }
}

/// Trait for observing contract violations.
///
/// Observers are shared with the protocol's callback threads, so they must be
/// `Send + Sync`.
pub trait ViolationObserver: Send + Sync {
    /// Called when a contract violation is detected. Runs on the producer's
    /// thread, so it should be quick.
    fn on_violation(&self, violation: &ContractViolation);
}

/// Built-in observer that logs violations via the `tracing` crate.
///
/// `Warning` maps to `tracing::warn!`, `Error` to `tracing::error!`. The
/// severity, kind, location and context are emitted as structured fields.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates a new tracing observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ViolationObserver for TracingObserver {
    fn on_violation(&self, violation: &ContractViolation) {
        let severity = violation.severity.as_str();
        let kind = violation.kind.as_str();
        let location = violation.location;
        let context = format!("{:?}", violation.context);

        match violation.severity {
            ViolationSeverity::Warning => {
                tracing::warn!(severity, kind, location, context = %context, "{}", violation.message);
            }
            ViolationSeverity::Error => {
                tracing::error!(severity, kind, location, context = %context, "{}", violation.message);
            }
        }
    }
}

/// Built-in observer that collects violations for testing.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    violations: Mutex<Vec<ContractViolation>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer with an empty violation list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all collected violations.
    #[must_use]
    pub fn violations(&self) -> Vec<ContractViolation> {
        self.violations.lock().clone()
    }

    /// Returns the number of collected violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// Returns true if no violations have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// Checks if any violation of the specified kind has been collected.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.lock().iter().any(|v| v.kind == kind)
    }

    /// Clears all collected violations.
    pub fn clear(&self) {
        self.violations.lock().clear();
    }
}

impl ViolationObserver for CollectingObserver {
    fn on_violation(&self, violation: &ContractViolation) {
        self.violations.lock().push(violation.clone());
    }
}

/// Hands `violation` to `observer`, or to [`TracingObserver`] if there is none.
pub fn report_to_observer<O: ViolationObserver + ?Sized>(
    observer: Option<&Arc<O>>,
    violation: &ContractViolation,
) {
    match observer {
        Some(observer) => observer.on_violation(violation),
        None => TracingObserver.on_violation(violation),
    }
}

/// Macro for reporting contract violations with location tracking.
///
/// Builds a [`ContractViolation`] stamped with the current file and line and
/// hands it to [`report_to_observer`]: `$observer` is an
/// `Option<&Arc<impl ViolationObserver>>`, and `None` falls back to
/// [`TracingObserver`].
///
/// # Syntax
///
/// ```text
/// report_violation!(observer, severity, kind, "message");
/// report_violation!(observer, severity, kind, "message with {}", format_args);
/// ```
///
/// # Example
///
/// ```
/// use ike_harness::report_violation;
/// use ike_harness::telemetry::{CollectingObserver, ViolationKind, ViolationSeverity};
/// use std::sync::Arc;
///
/// let observer = Arc::new(CollectingObserver::new());
/// report_violation!(Some(&observer), ViolationSeverity::Warning,
///     ViolationKind::DuplicateCompletion, "{} completed twice", "config");
/// assert_eq!(observer.len(), 1);
/// ```
#[macro_export]
macro_rules! report_violation {
    ($observer:expr, $severity:expr, $kind:expr, $msg:literal) => {{
        let violation = $crate::telemetry::ContractViolation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::report_to_observer($observer, &violation);
    }};

    ($observer:expr, $severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        let violation = $crate::telemetry::ContractViolation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::report_to_observer($observer, &violation);
    }};
}
