//! Typed errors raised by catalog collaborators.

use thiserror::Error;

/// Errors returned by a [`crate::BrokerResolver`] or [`crate::WorkerRegistry`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No broker instance is registered under the requested name.
    #[error("unknown broker '{name}' (locality {locality})")]
    UnknownBroker { name: String, locality: String },
}
