//! Case counts for property-based tests.
//!
//! Miri interprets every instruction, so property tests shrink to a handful
//! of cases there. Tests that spawn threads per case use a smaller count
//! still, since each case pays for thread creation and joins.
//!
//! ```ignore
//! use crate::test_config::threaded_case_count;
//!
//! proptest! {
//!     #![proptest_config(ProptestConfig {
//!         cases: threaded_case_count(),
//!         ..ProptestConfig::default()
//!     })]
//!     #[test]
//!     fn producers_never_lose_events(n in 1usize..8) { /* ... */ }
//! }
//! ```

/// Cases for single-threaded property tests: 256, or 5 under Miri.
#[must_use]
pub const fn miri_case_count() -> u32 {
    if cfg!(miri) {
        5
    } else {
        256
    }
}

/// Cases for property tests that spawn threads: 32, or 2 under Miri.
#[must_use]
pub const fn threaded_case_count() -> u32 {
    if cfg!(miri) {
        2
    } else {
        32
    }
}
