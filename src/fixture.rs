//! Per-test setup and teardown around a simulated network.
//!
//! [`SessionFixture::set_up`] does what every session test needs before it can
//! start a session: pick fresh local and remote addresses, bring up a
//! point-to-point test network on the local one, and create the callback
//! executor plus the capture adapters. [`SessionFixture::tear_down`] undoes it
//! and resets the address pools so the next test starts from the origin.
//! Dropping a fixture that was not torn down, e.g. because an assertion
//! panicked, does the same and logs any network error.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::address::AddressAllocator;
use crate::capture::{ChildSessionCapture, SessionCapture};
use crate::config::HarnessConfig;
use crate::executor::SerialExecutor;
use crate::protocol::Protocol;
use crate::HarnessError;

/// Internal address the test responder assigns to the initiator.
pub const EXPECTED_INTERNAL_ADDR: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 10);

/// Remote application version the test responder reports (none).
pub const EXPECTED_REMOTE_APP_VERSION_EMPTY: &str = "";

/// Error data carried by protocol errors that have none.
pub const EXPECTED_PROTOCOL_ERROR_DATA_NONE: &[u8] = &[];

/// The environment-specific collaborator that provides test networks.
///
/// Implementations typically create a TUN interface with the given address
/// and register it as a network; tests in this crate use in-memory fakes.
pub trait TestNetwork {
    /// Whatever the implementation needs to tear the network down again.
    type Handle;

    /// Brings up a point-to-point network whose local end has `local`.
    fn bring_up(&mut self, local: Ipv4Addr) -> Result<Self::Handle, HarnessError>;

    /// Tears down a network previously returned by [`bring_up`](Self::bring_up).
    fn tear_down(&mut self, handle: Self::Handle) -> Result<(), HarnessError>;
}

/// Everything one session test needs, set up in one call.
///
/// The capture adapters are behind [`Arc`] so they can be handed to the
/// protocol implementation as its event sinks.
pub struct SessionFixture<'a, P: Protocol, N: TestNetwork> {
    network: N,
    /// `None` once torn down.
    handle: Option<N::Handle>,
    allocator: &'a AddressAllocator,
    local_address: Ipv4Addr,
    remote_address: Ipv4Addr,
    executor: SerialExecutor,
    session: Arc<SessionCapture<P>>,
    first_child: Arc<ChildSessionCapture<P>>,
}

impl<'a, P: Protocol, N: TestNetwork> SessionFixture<'a, P, N> {
    /// Allocates addresses from `allocator`, brings up `network` and creates
    /// the executor and capture adapters with `config.timeout`.
    ///
    /// If a later step fails the network is torn down again and the
    /// allocation stands; the pools are reset at the next successful teardown.
    pub fn set_up(
        mut network: N,
        allocator: &'a AddressAllocator,
        config: &HarnessConfig,
    ) -> Result<Self, HarnessError> {
        config.validate()?;
        let local_address = allocator.next_local_address();
        let remote_address = allocator.next_remote_address();

        let handle = network.bring_up(local_address)?;
        let executor = match SerialExecutor::new(format!("callbacks-{local_address}")) {
            Ok(executor) => executor,
            Err(err) => {
                if let Err(teardown) = network.tear_down(handle) {
                    warn!(%teardown, "failed to tear down network after setup error");
                }
                return Err(err);
            }
        };
        debug!(%local_address, %remote_address, "session fixture set up");

        Ok(Self {
            network,
            handle: Some(handle),
            allocator,
            local_address,
            remote_address,
            executor,
            session: Arc::new(SessionCapture::new(config.timeout)),
            first_child: Arc::new(ChildSessionCapture::new(config.timeout)),
        })
    }

    /// Address of the local endpoint; the test network is up on it.
    #[must_use]
    pub fn local_address(&self) -> Ipv4Addr {
        self.local_address
    }

    /// Address of the simulated remote endpoint.
    #[must_use]
    pub fn remote_address(&self) -> Ipv4Addr {
        self.remote_address
    }

    /// Executor on which the protocol should deliver callbacks.
    #[must_use]
    pub fn executor(&self) -> &SerialExecutor {
        &self.executor
    }

    /// Capture for the IKE session's notifications.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionCapture<P>> {
        &self.session
    }

    /// Capture for the first child session's notifications.
    #[must_use]
    pub fn first_child(&self) -> &Arc<ChildSessionCapture<P>> {
        &self.first_child
    }

    /// The network handle returned by [`TestNetwork::bring_up`].
    #[must_use]
    pub fn network_handle(&self) -> Option<&N::Handle> {
        self.handle.as_ref()
    }

    /// Tears the network down and resets both address pools.
    ///
    /// The pools are reset even if tearing the network down fails; that
    /// error is returned afterwards. Pending callbacks are drained before
    /// the network goes away.
    pub fn tear_down(mut self) -> Result<(), HarnessError> {
        self.release()
    }

    /// Runs at most once: the handle is taken on the first call.
    fn release(&mut self) -> Result<(), HarnessError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.executor.shutdown();
        let result = self.network.tear_down(handle);
        self.allocator.reset_all();
        debug!(
            local_address = %self.local_address,
            ok = result.is_ok(),
            "session fixture torn down"
        );
        result
    }
}

impl<P: Protocol, N: TestNetwork> fmt::Debug for SessionFixture<'_, P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFixture")
            .field("local_address", &self.local_address)
            .field("remote_address", &self.remote_address)
            .field("torn_down", &self.handle.is_none())
            .field("executor", &self.executor)
            .field("session", &self.session)
            .field("first_child", &self.first_child)
            .finish_non_exhaustive()
    }
}

impl<P: Protocol, N: TestNetwork> Drop for SessionFixture<'_, P, N> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(%err, local_address = %self.local_address, "failed to tear down network on drop");
        }
    }
}

#[cfg(all(test, not(loom)))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capture::ChildSessionEventSink;
    use crate::protocol::Direction;

    #[derive(Debug)]
    struct Fake;

    impl Protocol for Fake {
        type SessionConfig = ();
        type ChildConfig = ();
        type Error = ();
        type ProtocolError = ();
        type Transform = u8;
    }

    #[derive(Default)]
    struct CountingNetwork {
        up: Vec<Ipv4Addr>,
        down: usize,
        fail_tear_down: bool,
    }

    impl TestNetwork for &mut CountingNetwork {
        type Handle = Ipv4Addr;

        fn bring_up(&mut self, local: Ipv4Addr) -> Result<Ipv4Addr, HarnessError> {
            self.up.push(local);
            Ok(local)
        }

        fn tear_down(&mut self, _handle: Ipv4Addr) -> Result<(), HarnessError> {
            self.down += 1;
            if self.fail_tear_down {
                return Err(HarnessError::Network {
                    context: "interface busy".to_owned(),
                });
            }
            Ok(())
        }
    }

    fn allocator() -> AddressAllocator {
        AddressAllocator::new(&HarnessConfig::default()).unwrap()
    }

    #[test]
    fn set_up_allocates_and_brings_up_local_address() {
        let allocator = allocator();
        let mut network = CountingNetwork::default();
        let fixture =
            SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &HarnessConfig::fast())
                .unwrap();

        assert_eq!(fixture.local_address(), Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(fixture.remote_address(), Ipv4Addr::new(198, 51, 100, 1));
        assert_eq!(fixture.network_handle(), Some(&Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(fixture.session().timeout(), HarnessConfig::fast().timeout);
        fixture.tear_down().unwrap();

        assert_eq!(network.up, vec![Ipv4Addr::new(192, 0, 2, 1)]);
        assert_eq!(network.down, 1);
    }

    #[test]
    fn tear_down_resets_pools_even_on_failure() {
        let allocator = allocator();
        let mut network = CountingNetwork {
            fail_tear_down: true,
            ..CountingNetwork::default()
        };
        let fixture =
            SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &HarnessConfig::fast())
                .unwrap();
        let _ = allocator.next_local_address();

        assert!(matches!(
            fixture.tear_down(),
            Err(HarnessError::Network { .. })
        ));
        assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
    }

    #[test]
    fn tear_down_drains_pending_callbacks() {
        let allocator = allocator();
        let mut network = CountingNetwork::default();
        let fixture =
            SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &HarnessConfig::fast())
                .unwrap();
        let child = fixture.first_child().clone();
        let sink = child.clone();
        fixture
            .executor()
            .execute(move || sink.on_transform_created(3, Direction::Inbound))
            .unwrap();
        fixture.tear_down().unwrap();
        assert_eq!(child.created().len(), 1);
    }

    #[test]
    fn drop_without_tear_down_cleans_up_once() {
        let allocator = allocator();
        let mut network = CountingNetwork::default();
        {
            let fixture =
                SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &HarnessConfig::fast())
                    .unwrap();
            assert_eq!(fixture.local_address(), Ipv4Addr::new(192, 0, 2, 1));
        }
        assert_eq!(network.down, 1);
        assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(allocator.next_remote_address(), Ipv4Addr::new(198, 51, 100, 1));
    }

    #[test]
    fn failed_drop_tear_down_still_resets_pools() {
        let allocator = allocator();
        let mut network = CountingNetwork {
            fail_tear_down: true,
            ..CountingNetwork::default()
        };
        drop(
            SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &HarnessConfig::fast())
                .unwrap(),
        );
        assert_eq!(network.down, 1);
        assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
    }

    #[test]
    fn invalid_config_rejected_before_allocating() {
        let allocator = allocator();
        let mut network = CountingNetwork::default();
        let config = HarnessConfig {
            timeout: web_time::Duration::ZERO,
            ..HarnessConfig::default()
        };
        assert!(SessionFixture::<Fake, _>::set_up(&mut network, &allocator, &config).is_err());
        assert!(network.up.is_empty());
        assert_eq!(allocator.next_local_address(), Ipv4Addr::new(192, 0, 2, 1));
    }
}
