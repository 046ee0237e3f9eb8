//! Cyclic IPv4 address allocation for test endpoints.
//!
//! Each test needs a local and a remote address that do not collide with the
//! addresses of tests running before or alongside it. An [`AddressPool`]
//! hands out consecutive addresses by advancing only the last octet, and wraps
//! back to its origin when the octet reaches the configured bound. The bound
//! itself is never handed out.
//!
//! ```
//! use ike_harness::{AddressAllocator, HarnessConfig, Role};
//! use std::net::Ipv4Addr;
//!
//! let allocator = AddressAllocator::new(&HarnessConfig::default()).unwrap();
//! assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
//! assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 2));
//! assert_eq!(allocator.next(Role::Remote), Ipv4Addr::new(198, 51, 100, 1));
//!
//! allocator.reset_all();
//! assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::config::{AddressPoolConfig, HarnessConfig};
use crate::sync::{lock, Mutex};
use crate::HarnessError;

const LAST: usize = 3;

/// Which endpoint of a test session an address is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The endpoint running the protocol implementation under test.
    Local,
    /// The simulated peer.
    Remote,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// One role's cyclic address pool.
///
/// The current address lives behind the pool's own mutex and callers only
/// ever receive copies, so concurrent [`next`](Self::next) calls never observe
/// the same pre-increment address.
pub struct AddressPool {
    origin: [u8; 4],
    max: u8,
    next: Mutex<[u8; 4]>,
}

impl AddressPool {
    /// Builds a pool, rejecting configs that could never hand out an address.
    pub fn new(config: AddressPoolConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let max = u8::try_from(config.last_octet_max).map_err(|err| {
            HarnessError::InvalidConfig {
                info: err.to_string(),
            }
        })?;
        let origin = config.origin.octets();
        Ok(Self {
            origin,
            max,
            next: Mutex::new(origin),
        })
    }

    /// The address the pool starts from and resets to.
    #[must_use]
    pub fn origin(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.origin)
    }

    /// Hands out the current address and advances the last octet, wrapping to
    /// the origin first if the octet has reached the bound.
    #[must_use = "allocating an address without using it wastes a slot in the pool"]
    pub fn next(&self) -> Ipv4Addr {
        let mut next = lock(&self.next);
        if next[LAST] >= self.max {
            debug!(origin = %Ipv4Addr::from(self.origin), "address pool wrapped");
            *next = self.origin;
        }
        let address = Ipv4Addr::from(*next);
        // Cannot overflow: the octet is below `max`, which is at most 255.
        next[LAST] += 1;
        address
    }

    /// Returns the address the next call to [`next`](Self::next) would hand out
    /// (after any wraparound), without allocating it.
    #[must_use]
    pub fn peek(&self) -> Ipv4Addr {
        let next = lock(&self.next);
        if next[LAST] >= self.max {
            Ipv4Addr::from(self.origin)
        } else {
            Ipv4Addr::from(*next)
        }
    }

    /// Restores the pool to its origin.
    pub fn reset(&self) {
        *lock(&self.next) = self.origin;
    }
}

impl fmt::Debug for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressPool")
            .field("origin", &self.origin())
            .field("max", &self.max)
            .field("next", &self.peek())
            .finish()
    }
}

/// Independent local and remote address pools.
#[derive(Debug)]
pub struct AddressAllocator {
    local: AddressPool,
    remote: AddressPool,
}

impl AddressAllocator {
    /// Builds both pools from `config`.
    pub fn new(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            local: AddressPool::new(config.local_pool)?,
            remote: AddressPool::new(config.remote_pool)?,
        })
    }

    /// The process-wide allocator with the default pools.
    ///
    /// Tests running in the same process share it, which keeps their
    /// addresses disjoint until the pools are reset at teardown.
    #[cfg(not(loom))]
    pub fn global() -> &'static Self {
        static GLOBAL: std::sync::OnceLock<AddressAllocator> = std::sync::OnceLock::new();
        GLOBAL.get_or_init(|| Self {
            local: AddressPool::with_valid_config(AddressPoolConfig::local()),
            remote: AddressPool::with_valid_config(AddressPoolConfig::remote()),
        })
    }

    /// The pool for `role`.
    #[must_use]
    pub fn pool(&self, role: Role) -> &AddressPool {
        match role {
            Role::Local => &self.local,
            Role::Remote => &self.remote,
        }
    }

    /// Hands out the next address for `role`.
    #[must_use = "allocating an address without using it wastes a slot in the pool"]
    pub fn next(&self, role: Role) -> Ipv4Addr {
        let address = self.pool(role).next();
        debug!(%role, %address, "allocated address");
        address
    }

    /// Resets `role`'s pool to its origin.
    pub fn reset(&self, role: Role) {
        debug!(%role, "address pool reset");
        self.pool(role).reset();
    }

    /// Hands out the next local address.
    #[must_use = "allocating an address without using it wastes a slot in the pool"]
    pub fn next_local_address(&self) -> Ipv4Addr {
        self.next(Role::Local)
    }

    /// Hands out the next remote address.
    #[must_use = "allocating an address without using it wastes a slot in the pool"]
    pub fn next_remote_address(&self) -> Ipv4Addr {
        self.next(Role::Remote)
    }

    /// Resets both pools to their origins.
    pub fn reset_all(&self) {
        self.reset(Role::Local);
        self.reset(Role::Remote);
    }
}

impl AddressPool {
    /// Builds a pool from a config known to be valid at compile time.
    #[cfg(not(loom))]
    fn with_valid_config(config: AddressPoolConfig) -> Self {
        let origin = config.origin.octets();
        Self {
            origin,
            max: u8::try_from(config.last_octet_max).unwrap_or(u8::MAX),
            next: Mutex::new(origin),
        }
    }
}
