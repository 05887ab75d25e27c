//! Live worker selection with a per-pass round-robin cursor.

use brokerscan_core::{WorkerNode, WorkerRegistry};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::PlanError;

/// Most candidate workers (and brokers) handed to one scan task.
pub const MAX_CANDIDATES: usize = 3;

/// A shuffled snapshot of the live workers, taken once per planning pass.
///
/// Each pass owns its own selector; the cursor is never shared between
/// passes.
#[derive(Debug, Clone)]
pub struct WorkerSelector {
    workers: Vec<WorkerNode>,
    cursor: usize,
}

impl WorkerSelector {
    pub fn select(registry: &dyn WorkerRegistry) -> Result<Self, PlanError> {
        Self::select_with_rng(registry, &mut rand::thread_rng())
    }

    pub fn select_with_rng<R: Rng + ?Sized>(
        registry: &dyn WorkerRegistry,
        rng: &mut R,
    ) -> Result<Self, PlanError> {
        let mut workers: Vec<WorkerNode> = registry
            .current_workers()
            .into_values()
            .filter(|w| w.alive)
            .collect();
        if workers.is_empty() {
            return Err(PlanError::NoAvailableWorkers);
        }
        // Registry order is unspecified; sort so a seeded rng is reproducible.
        workers.sort_by_key(|w| w.id);
        workers.shuffle(rng);
        Ok(Self { workers, cursor: 0 })
    }

    pub fn workers(&self) -> &[WorkerNode] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// The next `min(3, live workers)` workers, advancing the cursor.
    pub fn next_candidates(&mut self) -> Vec<WorkerNode> {
        let count = MAX_CANDIDATES.min(self.workers.len());
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.workers[self.cursor].clone());
            self.cursor = (self.cursor + 1) % self.workers.len();
        }
        out
    }
}
