//! Synchronization primitives abstraction for loom testing compatibility.
//!
//! This module provides a unified interface to synchronization primitives that works
//! with both production code (using `parking_lot` for performance) and loom tests
//! (using `loom::sync` for model checking).
//!
//! # Usage
//!
//! Import from this module instead of directly from `parking_lot` or `std::sync`:
//!
//! ```ignore
//! use crate::sync::{lock, wait_until, Arc, Condvar, Mutex};
//! ```
//!
//! The free functions [`lock`] and [`wait_until`] hide the API differences
//! between `parking_lot` (guards returned directly, `wait_until` takes a
//! deadline) and loom (poisoning `LockResult`s, relative `wait_timeout`).
//!
//! # Loom Testing
//!
//! Run loom tests from the isolated `loom-tests/` crate:
//! ```bash
//! cd loom-tests
//! RUSTFLAGS="--cfg loom" cargo test --release
//! ```

use web_time::Instant;

// ============================================================================
// LOOM CONFIGURATION
// ============================================================================

/// When running under loom (`RUSTFLAGS="--cfg loom"`), use loom's types
#[cfg(loom)]
pub(crate) mod inner {
    pub use loom::sync::atomic::{AtomicUsize, Ordering};
    pub use loom::sync::Arc;
    pub use loom::sync::Condvar;
    pub use loom::sync::Mutex;
    pub use loom::sync::MutexGuard;
}

/// In production, use parking_lot for performance
#[cfg(not(loom))]
pub(crate) mod inner {
    pub use parking_lot::Condvar;
    pub use parking_lot::Mutex;
    pub use parking_lot::MutexGuard;
    pub use std::sync::atomic::{AtomicUsize, Ordering};
    pub use std::sync::Arc;
}

// Re-export at module level for convenience
pub(crate) use inner::*;

/// Acquires `mutex`, ignoring poisoning under loom.
#[cfg(not(loom))]
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock()
}

/// Acquires `mutex`, ignoring poisoning under loom.
#[cfg(loom)]
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Blocks on `condvar` until notified or until `deadline` passes.
///
/// Returns the re-acquired guard and whether the deadline was reached. Callers
/// must re-check their condition either way: wake-ups may be spurious.
#[cfg(not(loom))]
#[inline]
pub(crate) fn wait_until<'a, T>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Instant,
) -> (MutexGuard<'a, T>, bool) {
    let timed_out = condvar.wait_until(&mut guard, deadline).timed_out();
    (guard, timed_out)
}

/// Blocks on `condvar` until notified or until `deadline` passes (loom version).
///
/// Loom does not model wall-clock time, so the timeout here only bounds real
/// execution; model checking explores the notified paths.
#[cfg(loom)]
#[inline]
pub(crate) fn wait_until<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    deadline: Instant,
) -> (MutexGuard<'a, T>, bool) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match condvar.wait_timeout(guard, remaining) {
        Ok((guard, result)) => (guard, result.timed_out()),
        Err(poisoned) => {
            let (guard, result) = poisoned.into_inner();
            (guard, result.timed_out())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
