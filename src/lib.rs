//! # ike-harness
//!
//! Test support for callback-driven session protocols such as IKE/IPsec.
//!
//! A protocol implementation under test reports progress by invoking
//! callbacks ("opened", "transform created", "closed", ...) on threads of its
//! own choosing. Test code, running on its own thread, wants to ask simple
//! questions with a bounded wait: *did the 2nd transform get created, and
//! which one was it?* This crate provides the pieces that make those answers
//! deterministic:
//!
//! - [`EventRecorder`]: an append-only, thread-safe log with indexed,
//!   bounded-wait reads, for notifications that may repeat.
//! - [`OneShot`]: a single-assignment cell with bounded-wait reads, for
//!   notifications that happen at most once.
//! - [`SessionCapture`] / [`ChildSessionCapture`]: event sinks that route
//!   each protocol notification into the right recorder or one-shot.
//! - [`AddressAllocator`]: cyclic per-role IPv4 address pools so that tests
//!   get disjoint endpoint addresses.
//! - [`SessionFixture`]: per-test setup and teardown over a [`TestNetwork`].
//!
//! # Example
//!
//! ```
//! use ike_harness::prelude::*;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Ike;
//! impl Protocol for Ike {
//!     type SessionConfig = &'static str;
//!     type ChildConfig = &'static str;
//!     type Error = String;
//!     type ProtocolError = u16;
//!     type Transform = u32;
//! }
//!
//! let child = std::sync::Arc::new(ChildSessionCapture::<Ike>::new(Duration::from_millis(200)));
//! let sink = child.clone();
//! let protocol = std::thread::spawn(move || {
//!     sink.on_opened("child");
//!     sink.on_transform_created(0x100, Direction::Inbound);
//!     sink.on_transform_created(0x101, Direction::Outbound);
//!     sink.on_closed();
//! });
//!
//! assert_eq!(child.await_config().unwrap(), "child");
//! assert_eq!(child.await_next_created().unwrap().transform, 0x100);
//! assert_eq!(child.await_next_created().unwrap().transform, 0x101);
//! child.await_closed().unwrap();
//! assert!(child.await_next_created().unwrap_err().is_timeout());
//! protocol.join().unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use web_time::Duration;

pub use address::{AddressAllocator, AddressPool, Role};
pub use capture::{ChildSessionCapture, ChildSessionEventSink, SessionCapture, SessionEventSink};
pub use completion::{OneShot, SharedObserver};
pub use config::{AddressPoolConfig, HarnessConfig, DEFAULT_LAST_OCTET_MAX};
pub use error::HarnessError;
pub use executor::SerialExecutor;
pub use fixture::{
    SessionFixture, TestNetwork, EXPECTED_INTERNAL_ADDR, EXPECTED_PROTOCOL_ERROR_DATA_NONE,
    EXPECTED_REMOTE_APP_VERSION_EMPTY,
};
pub use protocol::{Direction, Protocol, TransformRecord};
pub use recorder::{EventRecord, EventRecorder, ReadHead};

pub mod address;
pub mod capture;
pub mod completion;
pub mod config;
#[doc(hidden)]
pub mod error;
pub mod executor;
pub mod fixture;
pub mod prelude;
pub mod protocol;
pub mod recorder;
#[doc(hidden)]
pub mod sync;
pub mod telemetry;
#[doc(hidden)]
pub mod test_config;

/// Default bound on every `await_*` call of the capture adapters.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
