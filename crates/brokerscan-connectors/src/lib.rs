//! Brokerscan Connectors - talking to file brokers
//!
//! This crate provides everything the planner needs from a broker:
//! - the list-path protocol types and client/connector traits
//! - a keyed connection pool with scoped acquisition
//! - file listing with bounded retry
//! - a broker served from the local filesystem

pub mod error;
pub mod lister;
pub mod local;
pub mod metrics;
pub mod pool;
pub mod protocol;

pub use error::BrokerError;
pub use lister::BrokerFileLister;
pub use local::LocalFsConnector;
pub use metrics::BrokerMetrics;
pub use pool::{BrokerClientPool, PoolConfig, PooledClient};
pub use protocol::{
    BrokerClient, BrokerConnector, BrokerVersion, ListPathRequest, ListPathResponse,
    OperationStatus, StatusCode, TransportError,
};
