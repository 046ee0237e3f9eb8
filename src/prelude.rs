//! Convenient re-exports for common usage.
//!
//! This module provides a convenient way to import the most commonly used
//! types and traits from ike-harness with a single glob import.
//!
//! # Usage
//!
//! ```
//! use ike_harness::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Capture**: [`SessionCapture`], [`ChildSessionCapture`] and the sink
//!   traits [`SessionEventSink`], [`ChildSessionEventSink`]
//! - **Primitives**: [`EventRecorder`], [`ReadHead`], [`OneShot`]
//! - **Protocol types**: [`Protocol`], [`Direction`], [`TransformRecord`]
//! - **Addresses**: [`AddressAllocator`], [`Role`]
//! - **Lifecycle**: [`SessionFixture`], [`TestNetwork`], [`SerialExecutor`]
//! - **Config and errors**: [`HarnessConfig`], [`HarnessError`]
//!
//! # What's NOT Included
//!
//! Telemetry types ([`crate::telemetry`]) and pool internals
//! ([`crate::AddressPool`], [`crate::AddressPoolConfig`]) are imported
//! explicitly by the few tests that need them.

pub use crate::{
    AddressAllocator, ChildSessionCapture, ChildSessionEventSink, Direction, EventRecorder,
    HarnessConfig, HarnessError, OneShot, Protocol, ReadHead, Role, SerialExecutor,
    SessionCapture, SessionEventSink, SessionFixture, TestNetwork, TransformRecord,
    DEFAULT_TIMEOUT,
};
