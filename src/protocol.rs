//! Types describing the protocol collaborator whose notifications are captured.

use std::fmt::Debug;

/// Compile-time description of the protocol implementation under test.
///
/// The harness never inspects these types; it only stores and hands back the
/// values the protocol reports. Bundling them in one trait keeps the capture
/// adapters to a single type parameter.
///
/// # Example
///
/// ```
/// use ike_harness::Protocol;
///
/// #[derive(Debug)]
/// struct FakeIke;
///
/// impl Protocol for FakeIke {
///     type SessionConfig = String;
///     type ChildConfig = String;
///     type Error = String;
///     type ProtocolError = u16;
///     type Transform = u32;
/// }
/// ```
pub trait Protocol: 'static {
    /// Snapshot reported when the IKE session opens.
    type SessionConfig: Clone + Debug + Send;
    /// Snapshot reported when a child session opens.
    type ChildConfig: Clone + Debug + Send;
    /// Fatal error carried by an abnormal close.
    type Error: Clone + Debug + Send;
    /// Recoverable error reported while the session stays up.
    type ProtocolError: Clone + Debug + Send;
    /// A negotiated security transform, e.g. an installed IPsec SA.
    type Transform: Clone + Debug + Send;
}

/// Direction of traffic a transform applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Traffic arriving at the local endpoint.
    Inbound,
    /// Traffic leaving the local endpoint.
    Outbound,
}

/// A transform created or deleted by a child session, with its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRecord<R> {
    /// The transform the protocol reported.
    pub transform: R,
    /// The direction it applies to.
    pub direction: Direction,
}

impl<R> TransformRecord<R> {
    /// Creates a record.
    #[must_use]
    pub const fn new(transform: R, direction: Direction) -> Self {
        Self {
            transform,
            direction,
        }
    }
}
