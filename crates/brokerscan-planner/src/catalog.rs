//! In-memory catalog: a fixed worker snapshot plus registered brokers.

use std::collections::HashMap;

use brokerscan_core::{BrokerEndpoint, BrokerResolver, CatalogError, WorkerNode, WorkerRegistry};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub workers: Vec<WorkerNode>,
    #[serde(default)]
    pub brokers: Vec<BrokerEndpoint>,
}

impl StaticCatalog {
    pub fn new(workers: Vec<WorkerNode>, brokers: Vec<BrokerEndpoint>) -> Self {
        Self { workers, brokers }
    }
}

impl WorkerRegistry for StaticCatalog {
    fn current_workers(&self) -> HashMap<u64, WorkerNode> {
        self.workers.iter().map(|w| (w.id, w.clone())).collect()
    }
}

impl BrokerResolver for StaticCatalog {
    /// Prefers an instance on `locality_host`, otherwise any instance of
    /// the named broker.
    fn resolve_broker(
        &self,
        name: &str,
        locality_host: &str,
    ) -> Result<BrokerEndpoint, CatalogError> {
        let instances: Vec<&BrokerEndpoint> =
            self.brokers.iter().filter(|b| b.name == name).collect();

        if let Some(local) = instances.iter().find(|b| b.host == locality_host) {
            return Ok((*local).clone());
        }
        instances
            .choose(&mut rand::thread_rng())
            .map(|b| (*b).clone())
            .ok_or_else(|| CatalogError::UnknownBroker {
                name: name.to_string(),
                locality: locality_host.to_string(),
            })
    }
}
