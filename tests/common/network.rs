//! In-memory stand-in for the platform's test network service.

#![allow(clippy::unwrap_used, dead_code)]

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use ike_harness::{HarnessError, TestNetwork};

#[derive(Debug, Default)]
pub struct NetworkLog {
    pub brought_up: Vec<Ipv4Addr>,
    pub torn_down: Vec<u32>,
    next_id: u32,
}

/// Hands out increasing interface ids and logs every call. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    log: Arc<Mutex<NetworkLog>>,
    refuse_local: Option<Ipv4Addr>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network whose `bring_up` fails for `local`.
    pub fn refusing(local: Ipv4Addr) -> Self {
        Self {
            refuse_local: Some(local),
            ..Self::default()
        }
    }

    pub fn brought_up(&self) -> Vec<Ipv4Addr> {
        self.log.lock().unwrap().brought_up.clone()
    }

    pub fn torn_down(&self) -> Vec<u32> {
        self.log.lock().unwrap().torn_down.clone()
    }
}

impl TestNetwork for FakeNetwork {
    type Handle = u32;

    fn bring_up(&mut self, local: Ipv4Addr) -> Result<u32, HarnessError> {
        if self.refuse_local == Some(local) {
            return Err(HarnessError::Network {
                context: format!("cannot create interface for {local}"),
            });
        }
        let mut log = self.log.lock().unwrap();
        log.brought_up.push(local);
        log.next_id += 1;
        Ok(log.next_id)
    }

    fn tear_down(&mut self, handle: u32) -> Result<(), HarnessError> {
        self.log.lock().unwrap().torn_down.push(handle);
        Ok(())
    }
}
