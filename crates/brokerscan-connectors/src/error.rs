//! Typed errors for the connectors crate.

use brokerscan_core::{CatalogError, NetworkAddress};
use thiserror::Error;

/// Errors that can occur while listing files through a broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No broker instance could be resolved for the request.
    #[error(transparent)]
    UnknownBroker(#[from] CatalogError),

    /// A pooled connection could not be obtained, even after one retry.
    #[error("create connection to broker({address}) failed: {message}")]
    Unavailable {
        address: NetworkAddress,
        message: String,
    },

    /// The broker answered with a non-OK status.
    #[error("broker list path failed. path={path}, broker={address}, msg={message}")]
    ListFailed {
        path: String,
        address: NetworkAddress,
        message: String,
    },

    /// The call failed at the transport level twice (once before and once
    /// after reopening the connection).
    #[error("broker list path exception. path={path}, broker={address}: {message}")]
    ListException {
        path: String,
        address: NetworkAddress,
        message: String,
    },
}
