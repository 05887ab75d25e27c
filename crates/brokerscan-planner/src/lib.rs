//! Brokerscan Planner - turning broker file groups into scan tasks
//!
//! A planning pass snapshots the live workers, lists every file through the
//! broker, sizes the plan from the total byte volume and packs the files into
//! per-worker scan tasks, each carrying the row transform of its file group.

pub mod catalog;
pub mod error;
pub mod explain;
pub mod partition;
pub mod scan_node;
pub mod selector;

pub use catalog::StaticCatalog;
pub use error::PlanError;
pub use explain::render_explain;
pub use partition::{sort_by_size, InstanceBudget, ScanRangePartitioner};
pub use scan_node::{
    BrokerScanNode, InitializedScan, PartitionRouting, PlanContext, ScanPlan, ScanSource,
};
pub use selector::{WorkerSelector, MAX_CANDIDATES};
