//! Prometheus metrics for broker pool health.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct BrokerMetrics {
    pub list_requests: Counter,
    pub call_retries: Counter,
    pub borrow_retries: Counter,
    pub connections_invalidated: Counter,
    pub connect_failures: Counter,
    pub idle_connections: Gauge,
    pub registry: Arc<Registry>,
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let list_requests = Counter::default();
        registry.register(
            "brokerscan_broker_list_requests",
            "List-path requests sent to brokers",
            list_requests.clone(),
        );

        let call_retries = Counter::default();
        registry.register(
            "brokerscan_broker_call_retries",
            "List-path calls retried after reopening the connection",
            call_retries.clone(),
        );

        let borrow_retries = Counter::default();
        registry.register(
            "brokerscan_broker_borrow_retries",
            "Connection borrows retried after a failed first attempt",
            borrow_retries.clone(),
        );

        let connections_invalidated = Counter::default();
        registry.register(
            "brokerscan_broker_connections_invalidated",
            "Pooled connections discarded after a failure",
            connections_invalidated.clone(),
        );

        let connect_failures = Counter::default();
        registry.register(
            "brokerscan_broker_connect_failures",
            "Failed attempts to open a broker connection",
            connect_failures.clone(),
        );

        let idle_connections = Gauge::default();
        registry.register(
            "brokerscan_broker_idle_connections",
            "Connections currently idle in the pool",
            idle_connections.clone(),
        );

        Self {
            list_requests,
            call_retries,
            borrow_retries,
            connections_invalidated,
            connect_failures,
            idle_connections,
            registry: Arc::new(registry),
        }
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}
