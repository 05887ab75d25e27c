//! Typed errors for the planner crate.

use brokerscan_connectors::BrokerError;
use brokerscan_core::CatalogError;
use brokerscan_transform::TransformError;
use thiserror::Error;

/// The single error a planning pass surfaces. No partial plan accompanies it.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The worker registry has no live worker.
    #[error("No alive workers")]
    NoAvailableWorkers,

    /// A load statement matched no file at all.
    #[error("No source file in this table({table})")]
    NoSourceFiles { table: String },

    /// A file group's field or line delimiter is the empty string.
    #[error("File group {group} has an empty {delimiter}")]
    EmptyDelimiter {
        group: usize,
        delimiter: &'static str,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}
