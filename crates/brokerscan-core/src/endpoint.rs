//! Broker endpoints and broker descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::worker::NetworkAddress;

/// A broker instance resolved for one requesting host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> NetworkAddress {
        NetworkAddress::new(self.host.clone(), self.port)
    }
}

/// Which broker to use for a statement, plus the properties forwarded on
/// every broker request (credentials, endpoint options).
///
/// Property values are redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDesc {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl std::fmt::Debug for BrokerDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        f.debug_struct("BrokerDesc")
            .field("name", &self.name)
            .field("properties", &keys)
            .finish()
    }
}

impl BrokerDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
