//! Broker connection pool, keyed by broker address.
//!
//! Each address gets its own permit budget. A borrowed connection comes
//! back as a [`PooledClient`] guard: it goes back to the idle list only when
//! the caller calls [`PooledClient::release`]; dropping it any other way
//! discards the connection, so a client that failed mid-call is never handed
//! to the next borrower.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use brokerscan_core::{NetworkAddress, PlannerConfig};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::metrics::BrokerMetrics;
use crate::protocol::{
    BrokerClient, BrokerConnector, ListPathRequest, ListPathResponse, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_per_address: usize,
    pub borrow_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&PlannerConfig::default())
    }
}

impl From<&PlannerConfig> for PoolConfig {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            max_per_address: config.broker_pool_max_per_address,
            borrow_timeout: config.broker_borrow_timeout,
        }
    }
}

struct AddressPool {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn BrokerClient>>>,
}

pub struct BrokerClientPool {
    connector: Arc<dyn BrokerConnector>,
    config: PoolConfig,
    pools: Mutex<HashMap<NetworkAddress, Arc<AddressPool>>>,
    metrics: BrokerMetrics,
}

impl BrokerClientPool {
    pub fn new(connector: Arc<dyn BrokerConnector>, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            pools: Mutex::new(HashMap::new()),
            metrics: BrokerMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: BrokerMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &BrokerMetrics {
        &self.metrics
    }

    /// Number of idle connections held for `address`.
    pub fn idle_count(&self, address: &NetworkAddress) -> usize {
        let pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        pools
            .get(address)
            .map(|p| p.idle.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    fn address_pool(&self, address: &NetworkAddress) -> Arc<AddressPool> {
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        pools
            .entry(address.clone())
            .or_insert_with(|| {
                Arc::new(AddressPool {
                    permits: Arc::new(Semaphore::new(self.config.max_per_address)),
                    idle: Mutex::new(Vec::new()),
                })
            })
            .clone()
    }

    /// Borrow a connection to `address`, waiting up to the configured timeout
    /// when every connection for that address is in use.
    pub async fn borrow(&self, address: &NetworkAddress) -> Result<PooledClient, TransportError> {
        let pool = self.address_pool(address);

        let permit = match tokio::time::timeout(
            self.config.borrow_timeout,
            pool.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(TransportError(format!("connection pool for {} is closed", address)))
            }
            Err(_) => {
                return Err(TransportError(format!(
                    "timed out after {:?} waiting for a connection to {}",
                    self.config.borrow_timeout, address
                )))
            }
        };

        let reused = pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let client = match reused {
            Some(client) => {
                self.metrics.idle_connections.dec();
                client
            }
            None => {
                debug!("Opening broker connection to {}", address);
                match self.connector.connect(address).await {
                    Ok(client) => client,
                    Err(e) => {
                        self.metrics.connect_failures.inc();
                        return Err(e);
                    }
                }
            }
        };

        Ok(PooledClient {
            client: Some(client),
            address: address.clone(),
            pool,
            connector: self.connector.clone(),
            metrics: self.metrics.clone(),
            reusable: false,
            _permit: permit,
        })
    }
}

/// Scoped handle on one borrowed connection.
pub struct PooledClient {
    client: Option<Box<dyn BrokerClient>>,
    address: NetworkAddress,
    pool: Arc<AddressPool>,
    connector: Arc<dyn BrokerConnector>,
    metrics: BrokerMetrics,
    reusable: bool,
    // Held until the guard is dropped; frees the address slot.
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub fn address(&self) -> &NetworkAddress {
        &self.address
    }

    pub async fn list_path(
        &mut self,
        request: &ListPathRequest,
    ) -> Result<ListPathResponse, TransportError> {
        match self.client.as_mut() {
            Some(client) => client.list_path(request).await,
            None => Err(TransportError(format!(
                "connection to {} was not reopened",
                self.address
            ))),
        }
    }

    /// Replace the underlying connection with a fresh one. The old
    /// connection is discarded even if reconnecting fails.
    pub async fn reopen(&mut self) -> Result<(), TransportError> {
        if self.client.take().is_some() {
            self.metrics.connections_invalidated.inc();
        }
        match self.connector.connect(&self.address).await {
            Ok(client) => {
                self.client = Some(client);
                Ok(())
            }
            Err(e) => {
                self.metrics.connect_failures.inc();
                Err(e)
            }
        }
    }

    /// Return the connection to the pool for reuse.
    pub fn release(mut self) {
        self.reusable = true;
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if self.reusable {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(client);
            self.metrics.idle_connections.inc();
        } else {
            self.metrics.connections_invalidated.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OperationStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoClient;

    #[async_trait]
    impl BrokerClient for EchoClient {
        async fn list_path(
            &mut self,
            _request: &ListPathRequest,
        ) -> Result<ListPathResponse, TransportError> {
            Ok(ListPathResponse {
                status: OperationStatus::ok(),
                files: vec![],
            })
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl BrokerConnector for CountingConnector {
        async fn connect(
            &self,
            _address: &NetworkAddress,
        ) -> Result<Box<dyn BrokerClient>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(TransportError("connection refused".into()));
            }
            Ok(Box::new(EchoClient))
        }
    }

    fn config(max: usize) -> PoolConfig {
        PoolConfig {
            max_per_address: max,
            borrow_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let connector = Arc::new(CountingConnector::default());
        let pool = BrokerClientPool::new(connector.clone(), config(2));
        let addr = NetworkAddress::new("10.0.0.1", 8000);

        let client = pool.borrow(&addr).await.unwrap();
        client.release();
        assert_eq!(pool.idle_count(&addr), 1);

        let client = pool.borrow(&addr).await.unwrap();
        assert_eq!(pool.idle_count(&addr), 0);
        client.release();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(pool.metrics().idle_connections.get(), 1);
    }

    #[tokio::test]
    async fn test_dropped_connection_is_invalidated() {
        let connector = Arc::new(CountingConnector::default());
        let pool = BrokerClientPool::new(connector.clone(), config(2));
        let addr = NetworkAddress::new("10.0.0.1", 8000);

        let client = pool.borrow(&addr).await.unwrap();
        drop(client);
        assert_eq!(pool.idle_count(&addr), 0);
        assert_eq!(pool.metrics().connections_invalidated.get(), 1);

        let _client = pool.borrow(&addr).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_borrow_times_out_when_exhausted() {
        let connector = Arc::new(CountingConnector::default());
        let pool = BrokerClientPool::new(connector, config(1));
        let addr = NetworkAddress::new("10.0.0.1", 8000);

        let held = pool.borrow(&addr).await.unwrap();
        let err = pool.borrow(&addr).await.err().unwrap();
        assert!(err.0.contains("timed out"));

        // Other addresses have their own budget.
        let other = NetworkAddress::new("10.0.0.2", 8000);
        assert!(pool.borrow(&other).await.is_ok());

        held.release();
        assert!(pool.borrow(&addr).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_failure_frees_the_slot() {
        let connector = Arc::new(CountingConnector {
            refuse: true,
            ..Default::default()
        });
        let pool = BrokerClientPool::new(connector.clone(), config(1));
        let addr = NetworkAddress::new("10.0.0.1", 8000);

        assert!(pool.borrow(&addr).await.is_err());
        assert!(pool.borrow(&addr).await.is_err());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.metrics().connect_failures.get(), 2);
    }

    #[tokio::test]
    async fn test_reopen_replaces_connection() {
        let connector = Arc::new(CountingConnector::default());
        let pool = BrokerClientPool::new(connector.clone(), config(1));
        let addr = NetworkAddress::new("10.0.0.1", 8000);

        let mut client = pool.borrow(&addr).await.unwrap();
        client.reopen().await.unwrap();
        let resp = client
            .list_path(&ListPathRequest::new("/data", Default::default()))
            .await
            .unwrap();
        assert_eq!(resp.status, OperationStatus::ok());
        client.release();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.metrics().connections_invalidated.get(), 1);
        assert_eq!(pool.idle_count(&addr), 1);
    }
}
