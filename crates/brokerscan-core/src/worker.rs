//! Worker nodes and network addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `host:port` pair. Used as the key of the broker connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub host: String,
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A worker node as seen by the registry at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerNode {
    pub id: u64,
    pub host: String,
    /// Port the executor uses to hand scan work to this worker.
    pub service_port: u16,
    /// Port used for row data exchange.
    pub data_port: u16,
    #[serde(default = "default_alive")]
    pub alive: bool,
}

fn default_alive() -> bool {
    true
}

impl WorkerNode {
    pub fn new(id: u64, host: impl Into<String>, service_port: u16, data_port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            service_port,
            data_port,
            alive: true,
        }
    }

    /// Mark the node dead. Convenience for building registry snapshots.
    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }

    pub fn service_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.host.clone(), self.service_port)
    }
}
