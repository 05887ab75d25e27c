//! File discovery through a broker.

use std::sync::Arc;

use brokerscan_core::{BrokerDesc, BrokerResolver, FileStatus, NetworkAddress};
use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::pool::{BrokerClientPool, PooledClient};
use crate::protocol::{ListPathRequest, StatusCode};

/// Lists the files under a path through a pooled broker connection.
///
/// Failure handling:
/// - broker resolution errors are returned as-is
/// - a failed borrow is retried once
/// - a transport failure during the call reopens the connection and retries
///   the call once
/// - a non-OK status is returned immediately with the broker's message
///
/// The connection goes back to the pool only on success.
#[derive(Clone)]
pub struct BrokerFileLister {
    resolver: Arc<dyn BrokerResolver>,
    pool: Arc<BrokerClientPool>,
}

impl BrokerFileLister {
    pub fn new(resolver: Arc<dyn BrokerResolver>, pool: Arc<BrokerClientPool>) -> Self {
        Self { resolver, pool }
    }

    pub fn pool(&self) -> &Arc<BrokerClientPool> {
        &self.pool
    }

    pub async fn list_files(
        &self,
        path: &str,
        broker: &BrokerDesc,
        locality_host: &str,
    ) -> Result<Vec<FileStatus>, BrokerError> {
        let endpoint = self.resolver.resolve_broker(&broker.name, locality_host)?;
        let address = endpoint.address();

        let mut client = self.borrow_with_retry(&address).await?;
        let request = ListPathRequest::new(path, broker.properties.clone());
        let metrics = self.pool.metrics();
        metrics.list_requests.inc();

        let response = match client.list_path(&request).await {
            Ok(response) => response,
            Err(first) => {
                warn!(
                    "List path {} on broker {} failed, reopening connection: {}",
                    path, address, first
                );
                metrics.call_retries.inc();
                if let Err(e) = client.reopen().await {
                    return Err(list_exception(path, &address, e.to_string()));
                }
                metrics.list_requests.inc();
                client
                    .list_path(&request)
                    .await
                    .map_err(|e| list_exception(path, &address, e.to_string()))?
            }
        };

        if response.status.code != StatusCode::Ok {
            warn!(
                "Broker {} rejected list path {}: {:?} {}",
                address, path, response.status.code, response.status.message
            );
            return Err(BrokerError::ListFailed {
                path: path.to_string(),
                address,
                message: response.status.message,
            });
        }

        client.release();

        let files: Vec<FileStatus> = response.files.into_iter().filter(|f| !f.is_dir).collect();
        debug!("Listed {} files under {} via {}", files.len(), path, address);
        Ok(files)
    }

    async fn borrow_with_retry(&self, address: &NetworkAddress) -> Result<PooledClient, BrokerError> {
        match self.pool.borrow(address).await {
            Ok(client) => Ok(client),
            Err(first) => {
                warn!("Borrow broker connection to {} failed, retrying: {}", address, first);
                self.pool.metrics().borrow_retries.inc();
                self.pool
                    .borrow(address)
                    .await
                    .map_err(|e| BrokerError::Unavailable {
                        address: address.clone(),
                        message: e.0,
                    })
            }
        }
    }
}

fn list_exception(path: &str, address: &NetworkAddress, message: String) -> BrokerError {
    BrokerError::ListException {
        path: path.to_string(),
        address: address.clone(),
        message,
    }
}
