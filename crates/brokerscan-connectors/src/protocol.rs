//! Broker list-path protocol: request/response types and the client traits
//! a transport implements.
//!
//! Wire encoding is the transport's business; these types are what the
//! planner sends and expects back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use brokerscan_core::{FileStatus, NetworkAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerVersion {
    V1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPathRequest {
    pub version: BrokerVersion,
    pub path: String,
    pub recursive: bool,
    pub properties: BTreeMap<String, String>,
}

impl ListPathRequest {
    /// A non-recursive listing at the current protocol version.
    pub fn new(path: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            version: BrokerVersion::V1,
            path: path.into(),
            recursive: false,
            properties,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    EndOfFile,
    NotAuthorized,
    DuplicateRequest,
    InvalidInputOffset,
    InvalidArgument,
    InvalidInputFilePath,
    FileNotFound,
    TargetStorageServiceError,
    OperationNotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub code: StatusCode,
    #[serde(default)]
    pub message: String,
}

impl OperationStatus {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPathResponse {
    pub status: OperationStatus,
    #[serde(default)]
    pub files: Vec<FileStatus>,
}

/// A transport-level failure (connection refused, reset, timeout). Says
/// nothing about the data; the call may be retried on a fresh connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// One open connection to a broker instance.
#[async_trait]
pub trait BrokerClient: Send {
    async fn list_path(
        &mut self,
        request: &ListPathRequest,
    ) -> Result<ListPathResponse, TransportError>;
}

/// Opens connections to broker instances. The pool calls this for fresh
/// connections and to reopen broken ones.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(
        &self,
        address: &NetworkAddress,
    ) -> Result<Box<dyn BrokerClient>, TransportError>;
}
