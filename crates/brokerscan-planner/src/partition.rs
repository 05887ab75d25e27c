//! Packing discovered files into balanced scan tasks.

use std::sync::Arc;

use brokerscan_core::{
    BrokerResolver, FileStatus, FileType, PlannerConfig, ScanLocation, ScanRange,
    ScanRangeParams, ScanTask,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::selector::WorkerSelector;

/// How many tasks a statement should be split into, and how many bytes
/// each task should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBudget {
    pub total_bytes: u64,
    pub num_instances: usize,
    pub bytes_per_instance: u64,
}

impl InstanceBudget {
    /// `total / min_bytes` clamped to `[1, min(live workers, max concurrency)]`.
    pub fn compute(total_bytes: u64, live_workers: usize, config: &PlannerConfig) -> Self {
        let by_volume = total_bytes / config.min_bytes_per_broker_scanner.max(1);
        let by_volume = usize::try_from(by_volume).unwrap_or(usize::MAX);
        let num_instances = by_volume
            .min(live_workers)
            .min(config.max_broker_concurrency)
            .max(1);
        // +1 keeps the running total of a full task strictly below the split point.
        let bytes_per_instance = total_bytes / num_instances as u64 + 1;
        Self {
            total_bytes,
            num_instances,
            bytes_per_instance,
        }
    }
}

/// Stable ascending size sort; equal sizes keep discovery order.
pub fn sort_by_size(files: &mut [FileStatus]) {
    files.sort_by_key(|f| f.size);
}

/// Packs files into tasks of at most `bytes_per_instance` bytes each,
/// splitting plain splittable files at task boundaries.
///
/// Tasks are opened lazily, on their first range, and each new task takes
/// the next candidates from the shared selector.
pub struct ScanRangePartitioner<'a> {
    selector: &'a mut WorkerSelector,
    resolver: &'a dyn BrokerResolver,
    broker_name: &'a str,
    bytes_per_instance: u64,
}

impl<'a> ScanRangePartitioner<'a> {
    pub fn new(
        selector: &'a mut WorkerSelector,
        resolver: &'a dyn BrokerResolver,
        broker_name: &'a str,
        bytes_per_instance: u64,
    ) -> Self {
        Self {
            selector,
            resolver,
            broker_name,
            bytes_per_instance,
        }
    }

    /// Tasks for one file group. `files` are packed in the order given.
    ///
    /// A group always starts a fresh task, so a plan has at least one task
    /// per non-empty group whatever the instance count.
    pub fn partition_group(
        &mut self,
        params: Arc<ScanRangeParams>,
        files: &[FileStatus],
    ) -> Result<Vec<ScanTask>, PlanError> {
        let budget = self.bytes_per_instance;
        let mut tasks = Vec::new();
        let mut current: Option<ScanTask> = None;
        let mut current_bytes = 0u64;
        let mut file_offset = 0u64;

        let mut i = 0;
        while i < files.len() {
            let file = &files[i];
            let left_bytes = file.size.saturating_sub(file_offset);

            if current_bytes + left_bytes > budget {
                if file.format().supports_split() && file.is_splittable {
                    let range_bytes = budget - current_bytes;
                    if range_bytes > 0 {
                        self.append(&mut current, &params, file, file_offset, range_bytes)?;
                        file_offset += range_bytes;
                    }
                } else {
                    self.append(&mut current, &params, file, file_offset, left_bytes)?;
                    file_offset = 0;
                    i += 1;
                }
                if let Some(task) = current.take() {
                    tasks.push(task);
                }
                current_bytes = 0;
            } else {
                self.append(&mut current, &params, file, file_offset, left_bytes)?;
                current_bytes += left_bytes;
                file_offset = 0;
                i += 1;
            }
        }

        if let Some(task) = current.take() {
            if !task.ranges.is_empty() {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    fn append(
        &mut self,
        current: &mut Option<ScanTask>,
        params: &Arc<ScanRangeParams>,
        file: &FileStatus,
        start_offset: u64,
        size: u64,
    ) -> Result<(), PlanError> {
        let range = ScanRange {
            file_type: FileType::Broker,
            format: file.format(),
            path: file.path.clone(),
            start_offset,
            size,
            splittable: file.is_splittable,
        };
        match current {
            Some(task) => task.ranges.push(range),
            None => {
                let mut task = self.open_task(params.clone())?;
                task.ranges.push(range);
                *current = Some(task);
            }
        }
        Ok(())
    }

    /// A task with the next candidate workers and one broker resolved near
    /// each of them.
    fn open_task(&mut self, params: Arc<ScanRangeParams>) -> Result<ScanTask, PlanError> {
        let candidates = self.selector.next_candidates();
        let broker_addresses = candidates
            .iter()
            .map(|w| {
                self.resolver
                    .resolve_broker(self.broker_name, &w.host)
                    .map(|b| b.address())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let locations = candidates
            .iter()
            .map(|w| ScanLocation {
                worker_id: w.id,
                server: w.service_address(),
            })
            .collect();
        debug!(
            "Opened scan task on workers {:?}",
            candidates.iter().map(|w| w.id).collect::<Vec<_>>()
        );
        Ok(ScanTask {
            params,
            ranges: Vec::new(),
            locations,
            broker_addresses,
        })
    }
}
