//! Brokerscan Core - data model for the broker scan planner
//!
//! This crate holds the types shared by every planning stage: worker nodes
//! and broker endpoints, listed file statuses, file groups and destination
//! tables, the slot/tuple descriptor table, the expression AST, and the
//! scan tasks handed to the executor.

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod endpoint;
pub mod error;
pub mod expr;
pub mod file;
pub mod functions;
pub mod scan;
pub mod table;
pub mod types;
pub mod worker;

pub use catalog::{BrokerResolver, WorkerRegistry};
pub use config::PlannerConfig;
pub use descriptor::{DescriptorTable, SlotDescriptor, SlotId, TupleDescriptor, TupleId, TupleLayout};
pub use endpoint::{BrokerDesc, BrokerEndpoint};
pub use error::CatalogError;
pub use expr::{BinaryOperator, ColumnRef, Expr, ScalarValue};
pub use file::{FileFormat, FileStatus, FileType};
pub use scan::{ScanLocation, ScanRange, ScanRangeParams, ScanTask};
pub use table::{BrokerTable, Column, FileGroup, RangePartition, RangePartitioning, TableSchema};
pub use types::ColumnType;
pub use worker::{NetworkAddress, WorkerNode};
