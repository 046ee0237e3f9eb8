//! Event sinks for protocol notifications and the adapters that capture them.
//!
//! The protocol implementation reports progress by calling "on X" methods on
//! an injected sink, from whatever thread it likes. [`SessionCapture`] and
//! [`ChildSessionCapture`] are sinks that route each notification into a
//! [`OneShot`] (events that happen at most once) or an [`EventRecorder`]
//! (events that may repeat), so test code can later ask for them with a
//! bounded wait.
//!
//! ```
//! use ike_harness::{ChildSessionCapture, ChildSessionEventSink, Direction, Protocol};
//! use std::time::Duration;
//!
//! # #[derive(Debug)]
//! # struct Fake;
//! # impl Protocol for Fake {
//! #     type SessionConfig = ();
//! #     type ChildConfig = &'static str;
//! #     type Error = ();
//! #     type ProtocolError = ();
//! #     type Transform = u32;
//! # }
//! let child = ChildSessionCapture::<Fake>::new(Duration::from_millis(100));
//! child.on_opened("child-config");
//! child.on_transform_created(1, Direction::Inbound);
//!
//! assert_eq!(child.await_config().unwrap(), "child-config");
//! assert_eq!(child.await_next_created().unwrap().transform, 1);
//! assert!(child.await_next_created().is_err());
//! ```

use std::fmt;

use tracing::{debug, trace};
use web_time::Duration;

use crate::completion::{OneShot, SharedObserver};
use crate::protocol::{Direction, Protocol, TransformRecord};
use crate::recorder::EventRecorder;
use crate::sync::{AtomicUsize, Ordering};
use crate::telemetry::{report_to_observer, ContractViolation, ViolationKind, ViolationSeverity};
use crate::{HarnessError, DEFAULT_TIMEOUT};

/// Notifications emitted by an IKE session.
pub trait SessionEventSink<P: Protocol> {
    /// The session finished negotiating.
    fn on_opened(&self, config: P::SessionConfig);
    /// The session closed normally.
    fn on_closed(&self);
    /// The session closed because of a fatal error.
    fn on_closed_exceptionally(&self, error: P::Error);
    /// A recoverable protocol error occurred; the session stays up.
    fn on_error(&self, error: P::ProtocolError);
}

/// Notifications emitted by a child session.
pub trait ChildSessionEventSink<P: Protocol> {
    /// The child session finished negotiating.
    fn on_opened(&self, config: P::ChildConfig);
    /// The child session closed normally.
    fn on_closed(&self);
    /// The child session closed because of a fatal error.
    fn on_closed_exceptionally(&self, error: P::Error);
    /// A transform was installed.
    fn on_transform_created(&self, transform: P::Transform, direction: Direction);
    /// A transform was removed.
    fn on_transform_deleted(&self, transform: P::Transform, direction: Direction);
}

/// A recorder plus the index of the next event the test has not asked for.
///
/// Every `await_next` call claims an index, even one that times out.
struct Tracked<T> {
    recorder: EventRecorder<T>,
    claimed: AtomicUsize,
}

impl<T: Clone> Tracked<T> {
    fn new(category: &'static str) -> Self {
        Self {
            recorder: EventRecorder::new(category),
            claimed: AtomicUsize::new(0),
        }
    }

    fn await_next(&self, timeout: Duration) -> Result<T, HarnessError> {
        let index = self.claimed.fetch_add(1, Ordering::SeqCst);
        self.recorder.await_at(index, |_| true, timeout)
    }
}

fn one_shot<T>(name: &'static str, observer: Option<&SharedObserver>) -> OneShot<T> {
    match observer {
        Some(observer) => OneShot::with_observer(name, observer.clone()),
        None => OneShot::new(name),
    }
}

/// Completion cells shared by both session kinds.
struct Lifecycle<C, E> {
    config: OneShot<C>,
    closed: OneShot<()>,
    closed_exceptionally: OneShot<E>,
    observer: Option<SharedObserver>,
}

impl<C, E> Lifecycle<C, E> {
    fn new(observer: Option<SharedObserver>) -> Self {
        Self {
            config: one_shot("config", observer.as_ref()),
            closed: one_shot("closed", observer.as_ref()),
            closed_exceptionally: one_shot("closed exceptionally", observer.as_ref()),
            observer,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_completed() || self.closed_exceptionally.is_completed()
    }

    /// Reports `category` notifications that arrive once the session is closed.
    /// The event is still recorded.
    fn check_open(&self, category: &'static str) {
        if !self.is_closed() {
            return;
        }
        let violation = ContractViolation::new(
            ViolationSeverity::Warning,
            ViolationKind::NotificationAfterClose,
            format!("{category} notification after the session closed"),
            concat!(file!(), ":", line!()),
        )
        .with_context("category", category);
        report_to_observer(self.observer.as_ref(), &violation);
    }

    fn close(&self) {
        if self.closed_exceptionally.is_completed() {
            self.report_conflicting_close("closed");
        }
        self.closed.complete(());
    }

    fn close_exceptionally(&self, error: E) {
        if self.closed.is_completed() {
            self.report_conflicting_close("closed exceptionally");
        }
        self.closed_exceptionally.complete(error);
    }

    /// Both close kinds are still recorded; the test decides which one it
    /// expected.
    fn report_conflicting_close(&self, arriving: &'static str) {
        let violation = ContractViolation::new(
            ViolationSeverity::Error,
            ViolationKind::ConflictingClose,
            "session reported both a normal and an abnormal close",
            concat!(file!(), ":", line!()),
        )
        .with_context("arriving", arriving);
        report_to_observer(self.observer.as_ref(), &violation);
    }
}

/// Captures the notifications of one IKE session.
///
/// | Notification | Captured in |
/// |---|---|
/// | `on_opened` | [`config`](Self::config) one-shot |
/// | `on_closed` | [`closed`](Self::closed) one-shot |
/// | `on_closed_exceptionally` | [`closed_exceptionally`](Self::closed_exceptionally) one-shot |
/// | `on_error` | [`errors`](Self::errors) recorder |
pub struct SessionCapture<P: Protocol> {
    lifecycle: Lifecycle<P::SessionConfig, P::Error>,
    errors: Tracked<P::ProtocolError>,
    timeout: Duration,
}

impl<P: Protocol> SessionCapture<P> {
    /// Creates a capture whose `await_*` methods wait up to `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::build(timeout, None)
    }

    /// Like [`new`](Self::new), but contract violations go to `observer`.
    #[must_use]
    pub fn with_observer(timeout: Duration, observer: SharedObserver) -> Self {
        Self::build(timeout, Some(observer))
    }

    fn build(timeout: Duration, observer: Option<SharedObserver>) -> Self {
        Self {
            lifecycle: Lifecycle::new(observer),
            errors: Tracked::new("errors"),
            timeout,
        }
    }

    /// The bound used by every `await_*` method.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The one-shot completed by `on_opened`.
    #[must_use]
    pub fn config(&self) -> &OneShot<P::SessionConfig> {
        &self.lifecycle.config
    }

    /// The one-shot completed by `on_closed`.
    #[must_use]
    pub fn closed(&self) -> &OneShot<()> {
        &self.lifecycle.closed
    }

    /// The one-shot completed by `on_closed_exceptionally`.
    #[must_use]
    pub fn closed_exceptionally(&self) -> &OneShot<P::Error> {
        &self.lifecycle.closed_exceptionally
    }

    /// Every error reported by `on_error`, in arrival order.
    #[must_use]
    pub fn errors(&self) -> &EventRecorder<P::ProtocolError> {
        &self.errors.recorder
    }

    /// Waits for the session configuration.
    pub fn await_config(&self) -> Result<P::SessionConfig, HarnessError> {
        self.lifecycle.config.get(self.timeout)
    }

    /// Waits for a normal close.
    pub fn await_closed(&self) -> Result<(), HarnessError> {
        self.lifecycle.closed.get(self.timeout)
    }

    /// Waits for an abnormal close and returns its error.
    pub fn await_closed_exceptionally(&self) -> Result<P::Error, HarnessError> {
        self.lifecycle.closed_exceptionally.get(self.timeout)
    }

    /// Waits for the next protocol error not yet returned by this method.
    pub fn await_next_error(&self) -> Result<P::ProtocolError, HarnessError> {
        self.errors.await_next(self.timeout)
    }
}

impl<P: Protocol> Default for SessionCapture<P> {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl<P: Protocol> fmt::Debug for SessionCapture<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCapture")
            .field("config", &self.lifecycle.config)
            .field("closed", &self.lifecycle.closed)
            .field("closed_exceptionally", &self.lifecycle.closed_exceptionally)
            .field("errors", &self.errors.recorder)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: Protocol> SessionEventSink<P> for SessionCapture<P> {
    fn on_opened(&self, config: P::SessionConfig) {
        debug!(?config, "IKE session opened");
        self.lifecycle.config.complete(config);
    }

    fn on_closed(&self) {
        debug!("IKE session closed");
        self.lifecycle.close();
    }

    fn on_closed_exceptionally(&self, error: P::Error) {
        debug!(?error, "IKE session closed exceptionally");
        self.lifecycle.close_exceptionally(error);
    }

    fn on_error(&self, error: P::ProtocolError) {
        trace!(?error, "IKE protocol error");
        self.lifecycle.check_open("error");
        self.errors.recorder.append(error);
    }
}

/// Captures the notifications of one child session.
///
/// | Notification | Captured in |
/// |---|---|
/// | `on_opened` | [`config`](Self::config) one-shot |
/// | `on_closed` | [`closed`](Self::closed) one-shot |
/// | `on_closed_exceptionally` | [`closed_exceptionally`](Self::closed_exceptionally) one-shot |
/// | `on_transform_created` | [`created`](Self::created) recorder |
/// | `on_transform_deleted` | [`deleted`](Self::deleted) recorder |
pub struct ChildSessionCapture<P: Protocol> {
    lifecycle: Lifecycle<P::ChildConfig, P::Error>,
    created: Tracked<TransformRecord<P::Transform>>,
    deleted: Tracked<TransformRecord<P::Transform>>,
    timeout: Duration,
}

impl<P: Protocol> ChildSessionCapture<P> {
    /// Creates a capture whose `await_*` methods wait up to `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::build(timeout, None)
    }

    /// Like [`new`](Self::new), but contract violations go to `observer`.
    #[must_use]
    pub fn with_observer(timeout: Duration, observer: SharedObserver) -> Self {
        Self::build(timeout, Some(observer))
    }

    fn build(timeout: Duration, observer: Option<SharedObserver>) -> Self {
        Self {
            lifecycle: Lifecycle::new(observer),
            created: Tracked::new("created"),
            deleted: Tracked::new("deleted"),
            timeout,
        }
    }

    /// The bound used by every `await_*` method.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The one-shot completed by `on_opened`.
    #[must_use]
    pub fn config(&self) -> &OneShot<P::ChildConfig> {
        &self.lifecycle.config
    }

    /// The one-shot completed by `on_closed`.
    #[must_use]
    pub fn closed(&self) -> &OneShot<()> {
        &self.lifecycle.closed
    }

    /// The one-shot completed by `on_closed_exceptionally`.
    #[must_use]
    pub fn closed_exceptionally(&self) -> &OneShot<P::Error> {
        &self.lifecycle.closed_exceptionally
    }

    /// Every transform reported by `on_transform_created`, in arrival order.
    #[must_use]
    pub fn created(&self) -> &EventRecorder<TransformRecord<P::Transform>> {
        &self.created.recorder
    }

    /// Every transform reported by `on_transform_deleted`, in arrival order.
    #[must_use]
    pub fn deleted(&self) -> &EventRecorder<TransformRecord<P::Transform>> {
        &self.deleted.recorder
    }

    /// Waits for the child session configuration.
    pub fn await_config(&self) -> Result<P::ChildConfig, HarnessError> {
        self.lifecycle.config.get(self.timeout)
    }

    /// Waits for a normal close.
    pub fn await_closed(&self) -> Result<(), HarnessError> {
        self.lifecycle.closed.get(self.timeout)
    }

    /// Waits for an abnormal close and returns its error.
    pub fn await_closed_exceptionally(&self) -> Result<P::Error, HarnessError> {
        self.lifecycle.closed_exceptionally.get(self.timeout)
    }

    /// Waits for the next created transform not yet returned by this method.
    pub fn await_next_created(&self) -> Result<TransformRecord<P::Transform>, HarnessError> {
        self.created.await_next(self.timeout)
    }

    /// Waits for the next deleted transform not yet returned by this method.
    pub fn await_next_deleted(&self) -> Result<TransformRecord<P::Transform>, HarnessError> {
        self.deleted.await_next(self.timeout)
    }
}

impl<P: Protocol> Default for ChildSessionCapture<P> {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl<P: Protocol> fmt::Debug for ChildSessionCapture<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSessionCapture")
            .field("config", &self.lifecycle.config)
            .field("closed", &self.lifecycle.closed)
            .field("closed_exceptionally", &self.lifecycle.closed_exceptionally)
            .field("created", &self.created.recorder)
            .field("deleted", &self.deleted.recorder)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: Protocol> ChildSessionEventSink<P> for ChildSessionCapture<P> {
    fn on_opened(&self, config: P::ChildConfig) {
        debug!(?config, "child session opened");
        self.lifecycle.config.complete(config);
    }

    fn on_closed(&self) {
        debug!("child session closed");
        self.lifecycle.close();
    }

    fn on_closed_exceptionally(&self, error: P::Error) {
        debug!(?error, "child session closed exceptionally");
        self.lifecycle.close_exceptionally(error);
    }

    fn on_transform_created(&self, transform: P::Transform, direction: Direction) {
        trace!(?transform, ?direction, "transform created");
        self.lifecycle.check_open("created");
        self.created
            .recorder
            .append(TransformRecord::new(transform, direction));
    }

    fn on_transform_deleted(&self, transform: P::Transform, direction: Direction) {
        trace!(?transform, ?direction, "transform deleted");
        self.lifecycle.check_open("deleted");
        self.deleted
            .recorder
            .append(TransformRecord::new(transform, direction));
    }
}

#[cfg(all(test, not(loom)))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::telemetry::CollectingObserver;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug)]
    struct Fake;

    impl Protocol for Fake {
        type SessionConfig = &'static str;
        type ChildConfig = &'static str;
        type Error = String;
        type ProtocolError = u16;
        type Transform = u32;
    }

    const SHORT: Duration = Duration::from_millis(30);

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn captures_are_send_and_sync() {
        assert_send_sync::<SessionCapture<Fake>>();
        assert_send_sync::<ChildSessionCapture<Fake>>();
    }

    #[test]
    fn session_routes_each_notification() {
        let capture = SessionCapture::<Fake>::new(SHORT);
        capture.on_opened("ike");
        capture.on_error(14);
        capture.on_error(24);
        capture.on_closed_exceptionally("AUTHENTICATION_FAILED".to_owned());

        assert_eq!(capture.await_config().unwrap(), "ike");
        assert_eq!(capture.await_next_error().unwrap(), 14);
        assert_eq!(capture.await_next_error().unwrap(), 24);
        assert!(capture.await_next_error().unwrap_err().is_timeout());
        assert_eq!(
            capture.await_closed_exceptionally().unwrap(),
            "AUTHENTICATION_FAILED"
        );
        assert!(capture.await_closed().is_err());
        assert_eq!(capture.errors().snapshot(), vec![14, 24]);
    }

    #[test]
    fn child_created_and_deleted_are_independent() {
        let capture = ChildSessionCapture::<Fake>::new(SHORT);
        capture.on_transform_created(1, Direction::Inbound);
        capture.on_transform_created(2, Direction::Outbound);
        capture.on_transform_deleted(1, Direction::Inbound);

        assert_eq!(
            capture.await_next_deleted().unwrap(),
            TransformRecord::new(1, Direction::Inbound)
        );
        assert_eq!(capture.await_next_created().unwrap().transform, 1);
        assert_eq!(
            capture.await_next_created().unwrap(),
            TransformRecord::new(2, Direction::Outbound)
        );
        assert!(capture.await_next_deleted().is_err());
    }

    #[test]
    fn notifications_from_another_thread_are_seen() {
        let capture = Arc::new(ChildSessionCapture::<Fake>::new(Duration::from_secs(5)));
        let sink: Arc<dyn ChildSessionEventSink<Fake> + Send + Sync> = capture.clone();
        let producer = thread::spawn(move || {
            sink.on_opened("child");
            sink.on_transform_created(9, Direction::Outbound);
            sink.on_closed();
        });

        assert_eq!(capture.await_config().unwrap(), "child");
        assert_eq!(capture.await_next_created().unwrap().transform, 9);
        capture.await_closed().unwrap();
        producer.join().unwrap();
    }

    #[test]
    fn late_notification_is_recorded_and_reported() {
        let observer = Arc::new(CollectingObserver::new());
        let capture = ChildSessionCapture::<Fake>::with_observer(SHORT, observer.clone());
        capture.on_transform_created(1, Direction::Inbound);
        capture.on_closed();
        assert!(observer.is_empty());

        capture.on_transform_deleted(1, Direction::Inbound);
        assert!(observer.has_violation(ViolationKind::NotificationAfterClose));
        assert_eq!(capture.deleted().len(), 1);
        let violation = &observer.violations()[0];
        assert_eq!(violation.severity, ViolationSeverity::Warning);
        assert_eq!(
            violation.context.get("category").map(String::as_str),
            Some("deleted")
        );
    }

    #[test]
    fn conflicting_closes_are_both_recorded_and_reported_as_errors() {
        let observer = Arc::new(CollectingObserver::new());
        let capture = SessionCapture::<Fake>::with_observer(SHORT, observer.clone());
        capture.on_closed_exceptionally("TIMEOUT".to_owned());
        assert!(observer.is_empty());
        capture.on_closed();

        capture.await_closed().unwrap();
        assert_eq!(capture.await_closed_exceptionally().unwrap(), "TIMEOUT");
        let violations = observer.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ConflictingClose);
        assert_eq!(violations[0].severity, ViolationSeverity::Error);
        assert_eq!(
            violations[0].context.get("arriving").map(String::as_str),
            Some("closed")
        );
    }

    #[test]
    fn duplicate_open_keeps_first_config() {
        let observer = Arc::new(CollectingObserver::new());
        let capture = SessionCapture::<Fake>::with_observer(SHORT, observer.clone());
        capture.on_opened("first");
        capture.on_opened("second");
        assert_eq!(capture.await_config().unwrap(), "first");
        assert!(observer.has_violation(ViolationKind::DuplicateCompletion));
    }

    #[test]
    fn default_uses_default_timeout() {
        assert_eq!(SessionCapture::<Fake>::default().timeout(), DEFAULT_TIMEOUT);
        assert_eq!(
            ChildSessionCapture::<Fake>::default().timeout(),
            DEFAULT_TIMEOUT
        );
    }
}
