//! Scan tasks: the units of parallel work handed to the executor.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::{SlotId, TupleId};
use crate::expr::Expr;
use crate::file::{FileFormat, FileType};
use crate::worker::NetworkAddress;

/// A contiguous byte span of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRange {
    pub file_type: FileType,
    pub format: FileFormat,
    pub path: String,
    pub start_offset: u64,
    pub size: u64,
    pub splittable: bool,
}

impl ScanRange {
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.size
    }
}

/// A candidate worker for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLocation {
    pub worker_id: u64,
    pub server: NetworkAddress,
}

/// Parameters shared by every task of one file group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRangeParams {
    pub column_separator: u8,
    pub line_delimiter: u8,
    /// Broker connection properties, forwarded verbatim.
    pub properties: BTreeMap<String, String>,
    pub src_tuple_id: TupleId,
    pub src_slot_ids: Vec<SlotId>,
    pub dest_tuple_id: TupleId,
    /// One expression per materialized destination slot.
    pub expr_of_dest_slot: BTreeMap<SlotId, Expr>,
    #[serde(default)]
    pub partition_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTask {
    pub params: Arc<ScanRangeParams>,
    pub ranges: Vec<ScanRange>,
    pub locations: Vec<ScanLocation>,
    pub broker_addresses: Vec<NetworkAddress>,
}

impl ScanTask {
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(|r| r.size).sum()
    }
}
