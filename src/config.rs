//! Configuration types for the harness.
//!
//! | Config Type | Purpose | Presets |
//! |-------------|---------|---------|
//! | `HarnessConfig` | Await timeout and both address pools | `ci()`, `fast()` |
//! | `AddressPoolConfig` | One role's address range | `local()`, `remote()` |
//!
//! # Example
//!
//! ```
//! use ike_harness::HarnessConfig;
//! use std::time::Duration;
//!
//! let config = HarnessConfig {
//!     timeout: Duration::from_secs(1),
//!     ..HarnessConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::{HarnessError, DEFAULT_TIMEOUT};

/// Default last-octet bound of every address pool. The bound itself is never
/// handed out; reaching it triggers wraparound.
pub const DEFAULT_LAST_OCTET_MAX: u16 = 100;

/// The address range one role allocates from.
///
/// Only the last octet of `origin` advances. Allocation yields
/// `origin.last..last_octet_max` (exclusive) and then wraps.
///
/// `last_octet_max` is wider than an octet so that out-of-range values in
/// hand-written or deserialized configs can be rejected instead of silently
/// truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "AddressPoolConfig has no effect unless used to build an AddressPool"]
pub struct AddressPoolConfig {
    /// First address handed out, and the address a reset returns to.
    pub origin: Ipv4Addr,
    /// Value of the last octet at which the pool wraps back to `origin`.
    ///
    /// Default: 100
    pub last_octet_max: u16,
}

impl AddressPoolConfig {
    /// Creates a pool config.
    pub const fn new(origin: Ipv4Addr, last_octet_max: u16) -> Self {
        Self {
            origin,
            last_octet_max,
        }
    }

    /// Local endpoint pool: `192.0.2.1` (TEST-NET-1) up to `.99`.
    pub const fn local() -> Self {
        Self::new(Ipv4Addr::new(192, 0, 2, 1), DEFAULT_LAST_OCTET_MAX)
    }

    /// Remote endpoint pool: `198.51.100.1` (TEST-NET-2) up to `.99`.
    pub const fn remote() -> Self {
        Self::new(Ipv4Addr::new(198, 51, 100, 1), DEFAULT_LAST_OCTET_MAX)
    }

    /// Checks that the pool can hand out at least one address.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let first = self.origin.octets()[3];
        if self.last_octet_max > u16::from(u8::MAX) {
            return Err(HarnessError::InvalidConfig {
                info: format!(
                    "last_octet_max {} does not fit in an address octet",
                    self.last_octet_max
                ),
            });
        }
        if self.last_octet_max <= u16::from(first) {
            return Err(HarnessError::InvalidConfig {
                info: format!(
                    "last_octet_max {} must be greater than the origin's last octet {} ({})",
                    self.last_octet_max, first, self.origin
                ),
            });
        }
        Ok(())
    }

    /// Number of distinct addresses handed out before wrapping.
    #[must_use]
    pub fn capacity(&self) -> usize {
        usize::from(self.last_octet_max).saturating_sub(usize::from(self.origin.octets()[3]))
    }
}

/// Top-level harness configuration.
///
/// # Forward Compatibility
///
/// New fields may be added; construct with `..HarnessConfig::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[must_use = "HarnessConfig has no effect unless passed to a fixture or capture"]
pub struct HarnessConfig {
    /// Bound on every `await_*` call of the capture adapters.
    ///
    /// Default: 500ms
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Pool for local endpoint addresses.
    pub local_pool: AddressPoolConfig,
    /// Pool for remote endpoint addresses.
    pub remote_pool: AddressPoolConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            local_pool: AddressPoolConfig::local(),
            remote_pool: AddressPoolConfig::remote(),
        }
    }
}

impl HarnessConfig {
    /// Creates a new `HarnessConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for slow or heavily loaded CI machines: 2s timeout.
    pub fn ci() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// Preset for fully in-process fakes where events arrive almost
    /// immediately: 50ms timeout.
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Checks the timeout and both pools.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.timeout.is_zero() {
            return Err(HarnessError::InvalidConfig {
                info: "timeout must be non-zero".to_owned(),
            });
        }
        self.local_pool.validate()?;
        self.remote_pool.validate()
    }

    /// Parses and validates a JSON config. Missing fields take their defaults;
    /// `timeout` is given in milliseconds.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| HarnessError::InvalidConfig {
                info: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes this config to JSON.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use web_time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
