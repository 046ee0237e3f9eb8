//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: a fake IKE protocol (`FakeIke`) and a scripted peer that drives
//!   capture adapters from another thread
//! - `network`: an in-memory `TestNetwork` that records bring-up/tear-down
//!
//! # Usage
//!
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::stubs::{FakeIke, ScriptedPeer};
//! ```

pub mod network;
pub mod stubs;

use std::time::Duration;

/// Generous bound for waits that are expected to succeed.
#[allow(dead_code)]
pub const LONG: Duration = Duration::from_secs(5);

/// Short bound for waits that are expected to time out.
#[allow(dead_code)]
pub const SHORT: Duration = Duration::from_millis(40);

/// Routes `tracing` output to the test harness's captured stdout.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
