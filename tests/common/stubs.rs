//! A fake IKE protocol and a peer that replays notifications.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code
)]

use std::net::Ipv4Addr;
use std::sync::Arc;

use ike_harness::{
    ChildSessionCapture, ChildSessionEventSink, Direction, Protocol, SerialExecutor,
    SessionCapture, SessionEventSink, EXPECTED_INTERNAL_ADDR, EXPECTED_PROTOCOL_ERROR_DATA_NONE,
    EXPECTED_REMOTE_APP_VERSION_EMPTY,
};

#[derive(Debug)]
pub struct FakeIke;

impl Protocol for FakeIke {
    type SessionConfig = IkeConfig;
    type ChildConfig = ChildConfig;
    type Error = IkeError;
    type ProtocolError = ProtocolError;
    type Transform = FakeTransform;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IkeConfig {
    pub remote_app_version: String,
    pub remote: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildConfig {
    pub internal_addr: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IkeError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub error_type: u16,
    pub data: Vec<u8>,
}

impl ProtocolError {
    pub fn without_data(error_type: u16) -> Self {
        Self {
            error_type,
            data: EXPECTED_PROTOCOL_ERROR_DATA_NONE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeTransform {
    pub spi: u32,
}

pub fn ike_config(remote: Ipv4Addr) -> IkeConfig {
    IkeConfig {
        remote_app_version: EXPECTED_REMOTE_APP_VERSION_EMPTY.to_owned(),
        remote,
    }
}

pub fn child_config() -> ChildConfig {
    ChildConfig {
        internal_addr: EXPECTED_INTERNAL_ADDR,
    }
}

/// Plays the protocol side: every notification is delivered on `executor`,
/// never on the calling thread.
pub struct ScriptedPeer<'a> {
    pub executor: &'a SerialExecutor,
    pub session: Arc<SessionCapture<FakeIke>>,
    pub child: Arc<ChildSessionCapture<FakeIke>>,
}

impl ScriptedPeer<'_> {
    pub fn open(&self, remote: Ipv4Addr) {
        let session = self.session.clone();
        let child = self.child.clone();
        self.executor
            .execute(move || {
                session.on_opened(ike_config(remote));
                child.on_opened(child_config());
            })
            .unwrap();
    }

    /// Installs an inbound/outbound transform pair with consecutive SPIs.
    pub fn install_pair(&self, first_spi: u32) {
        let child = self.child.clone();
        self.executor
            .execute(move || {
                child.on_transform_created(FakeTransform { spi: first_spi }, Direction::Inbound);
                child.on_transform_created(
                    FakeTransform { spi: first_spi + 1 },
                    Direction::Outbound,
                );
            })
            .unwrap();
    }

    pub fn remove_pair(&self, first_spi: u32) {
        let child = self.child.clone();
        self.executor
            .execute(move || {
                child.on_transform_deleted(FakeTransform { spi: first_spi }, Direction::Inbound);
                child.on_transform_deleted(
                    FakeTransform { spi: first_spi + 1 },
                    Direction::Outbound,
                );
            })
            .unwrap();
    }

    pub fn error(&self, error_type: u16) {
        let session = self.session.clone();
        self.executor
            .execute(move || session.on_error(ProtocolError::without_data(error_type)))
            .unwrap();
    }

    pub fn close(&self) {
        let session = self.session.clone();
        let child = self.child.clone();
        self.executor
            .execute(move || {
                child.on_closed();
                session.on_closed();
            })
            .unwrap();
    }

    pub fn fail(&self, reason: &str) {
        let session = self.session.clone();
        let child = self.child.clone();
        let reason = reason.to_owned();
        self.executor
            .execute(move || {
                child.on_closed_exceptionally(IkeError(reason.clone()));
                session.on_closed_exceptionally(IkeError(reason));
            })
            .unwrap();
    }
}
