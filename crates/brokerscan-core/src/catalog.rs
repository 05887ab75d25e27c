//! Read-only catalog collaborators, injected into each planning pass.

use std::collections::HashMap;

use crate::endpoint::BrokerEndpoint;
use crate::error::CatalogError;
use crate::worker::WorkerNode;

/// Snapshot source for the worker nodes known to the cluster.
pub trait WorkerRegistry: Send + Sync {
    /// Every registered worker, alive or not, keyed by id.
    fn current_workers(&self) -> HashMap<u64, WorkerNode>;
}

/// Resolves a logical broker name to a concrete instance. Resolution may
/// prefer an instance close to `locality_host`.
pub trait BrokerResolver: Send + Sync {
    fn resolve_broker(
        &self,
        name: &str,
        locality_host: &str,
    ) -> Result<BrokerEndpoint, CatalogError>;
}
