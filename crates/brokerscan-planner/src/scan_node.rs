//! The broker scan node: discovery and staging in `init`, binding and task
//! generation in `finalize`.
//!
//! The two phases are separate types. [`BrokerScanNode::init`] consumes the
//! node and returns an [`InitializedScan`] holding the file listings, the
//! instance budget and the staged file groups; [`InitializedScan::finalize`]
//! consumes that and returns the complete [`ScanPlan`]. Either the whole
//! plan comes back or a single [`PlanError`].

use std::sync::Arc;

use brokerscan_connectors::{BrokerClientPool, BrokerConnector, BrokerFileLister, PoolConfig};
use brokerscan_core::{
    BrokerDesc, BrokerResolver, BrokerTable, DescriptorTable, Expr, FileGroup, FileStatus,
    PlannerConfig, RangePartition, ScanRangeParams, ScanTask, TableSchema, TupleId,
    WorkerRegistry,
};
use brokerscan_transform::{RowSchemaBinder, StagedGroup, TransformError};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PlanError;
use crate::explain::render_explain;
use crate::partition::{sort_by_size, InstanceBudget, ScanRangePartitioner};
use crate::selector::WorkerSelector;

/// What the node reads: files for a load into `table`, or the files behind
/// an external broker table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Load {
        table: TableSchema,
        broker: BrokerDesc,
        file_groups: Vec<FileGroup>,
    },
    External(BrokerTable),
}

impl ScanSource {
    pub fn is_load(&self) -> bool {
        matches!(self, ScanSource::Load { .. })
    }

    pub fn table(&self) -> &TableSchema {
        match self {
            ScanSource::Load { table, .. } => table,
            ScanSource::External(t) => &t.schema,
        }
    }

    pub fn broker(&self) -> &BrokerDesc {
        match self {
            ScanSource::Load { broker, .. } => broker,
            ScanSource::External(t) => &t.broker,
        }
    }

    pub fn external_table(&self) -> Option<&BrokerTable> {
        match self {
            ScanSource::Load { .. } => None,
            ScanSource::External(t) => Some(t),
        }
    }

    /// The declared file groups, or the single synthetic group of an
    /// external table.
    pub fn file_groups(&self) -> Vec<FileGroup> {
        match self {
            ScanSource::Load { file_groups, .. } => file_groups.clone(),
            ScanSource::External(t) => vec![FileGroup::from_broker_table(t)],
        }
    }
}

/// Collaborators for one planning pass.
#[derive(Clone)]
pub struct PlanContext {
    pub registry: Arc<dyn WorkerRegistry>,
    pub resolver: Arc<dyn BrokerResolver>,
    pub lister: BrokerFileLister,
    pub config: PlannerConfig,
}

impl PlanContext {
    /// Wire a catalog that is both registry and resolver to a broker
    /// connector, with a fresh connection pool sized from `config`.
    pub fn from_catalog<C>(
        catalog: Arc<C>,
        connector: Arc<dyn BrokerConnector>,
        config: PlannerConfig,
    ) -> Self
    where
        C: WorkerRegistry + BrokerResolver + 'static,
    {
        let pool = Arc::new(BrokerClientPool::new(connector, PoolConfig::from(&config)));
        let resolver: Arc<dyn BrokerResolver> = catalog.clone();
        Self {
            registry: catalog,
            lister: BrokerFileLister::new(resolver.clone(), pool),
            resolver,
            config,
        }
    }
}

/// Expressions routing each row to a range partition, one per partition
/// column, bound to the destination slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionRouting {
    pub exprs: Vec<Expr>,
    pub partitions: Vec<RangePartition>,
}

/// The finished plan handed to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPlan {
    pub plan_id: Uuid,
    pub tasks: Vec<ScanTask>,
    pub num_instances: usize,
    pub bytes_per_instance: u64,
    pub total_bytes: u64,
    #[serde(default)]
    pub partition_routing: Option<PartitionRouting>,
    pub explain: String,
}

pub struct BrokerScanNode {
    source: ScanSource,
    dest_tuple: TupleId,
}

impl BrokerScanNode {
    /// `dest_tuple` is the destination row schema, already allocated in the
    /// statement's descriptor table.
    pub fn new(source: ScanSource, dest_tuple: TupleId) -> Self {
        Self { source, dest_tuple }
    }

    pub fn source(&self) -> &ScanSource {
        &self.source
    }

    pub fn explain(&self, prefix: &str) -> String {
        render_explain(prefix, self.source.external_table(), self.source.broker())
    }

    /// Snapshot live workers, list every file, size the plan and stage each
    /// file group.
    pub async fn init(
        self,
        ctx: &PlanContext,
        descs: &mut DescriptorTable,
    ) -> Result<InitializedScan, PlanError> {
        let plan_id = Uuid::new_v4();
        let table = self.source.table();
        info!("Planning broker scan {} of table {}", plan_id, table.name);

        let selector = WorkerSelector::select(ctx.registry.as_ref())?;
        let file_groups = self.source.file_groups();
        let listings = discover(ctx, self.source.broker(), &file_groups).await?;

        let total_files: usize = listings.iter().map(Vec::len).sum();
        if self.source.is_load() && total_files == 0 {
            return Err(PlanError::NoSourceFiles {
                table: table.name.clone(),
            });
        }

        let total_bytes = listings.iter().flatten().map(|f| f.size).sum();
        let budget = InstanceBudget::compute(total_bytes, selector.len(), &ctx.config);
        info!(
            "Broker scan {}: {} files, {} bytes, {} instances, {} bytes per instance",
            plan_id, total_files, budget.total_bytes, budget.num_instances, budget.bytes_per_instance
        );

        let binder = RowSchemaBinder::new(table, self.dest_tuple);
        let mut groups = Vec::with_capacity(file_groups.len());
        let mut partition_routing = None;
        for (index, (group, files)) in file_groups.into_iter().zip(listings).enumerate() {
            let column_separator =
                group
                    .column_separator_byte()
                    .ok_or(PlanError::EmptyDelimiter {
                        group: index,
                        delimiter: "column separator",
                    })?;
            let line_delimiter = group
                .line_delimiter_byte()
                .ok_or(PlanError::EmptyDelimiter {
                    group: index,
                    delimiter: "line delimiter",
                })?;

            if !group.partition_ids.is_empty() && partition_routing.is_none() {
                partition_routing = build_partition_routing(table, self.dest_tuple, descs)?;
            }

            let staged = binder.init(&group, descs)?;
            groups.push(GroupState {
                group,
                files,
                staged,
                column_separator,
                line_delimiter,
            });
        }

        Ok(InitializedScan {
            plan_id,
            source: self.source,
            dest_tuple: self.dest_tuple,
            selector,
            groups,
            budget,
            partition_routing,
        })
    }
}

struct GroupState {
    group: FileGroup,
    files: Vec<FileStatus>,
    staged: StagedGroup,
    column_separator: u8,
    line_delimiter: u8,
}

/// A scan between init and finalize.
pub struct InitializedScan {
    plan_id: Uuid,
    source: ScanSource,
    dest_tuple: TupleId,
    selector: WorkerSelector,
    groups: Vec<GroupState>,
    budget: InstanceBudget,
    partition_routing: Option<PartitionRouting>,
}

impl InitializedScan {
    pub fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    pub fn budget(&self) -> InstanceBudget {
        self.budget
    }

    pub fn num_instances(&self) -> usize {
        self.budget.num_instances
    }

    /// Listed files per file group, size-ascending.
    pub fn file_statuses(&self) -> Vec<&[FileStatus]> {
        self.groups.iter().map(|g| g.files.as_slice()).collect()
    }

    pub fn staged_groups(&self) -> impl Iterator<Item = &StagedGroup> {
        self.groups.iter().map(|g| &g.staged)
    }

    pub fn partition_routing(&self) -> Option<&PartitionRouting> {
        self.partition_routing.as_ref()
    }

    pub fn explain(&self, prefix: &str) -> String {
        render_explain(prefix, self.source.external_table(), self.source.broker())
    }

    /// Bind every non-empty file group and pack its files into tasks.
    pub fn finalize(
        self,
        ctx: &PlanContext,
        descs: &mut DescriptorTable,
    ) -> Result<ScanPlan, PlanError> {
        let explain = self.explain("");
        let InitializedScan {
            plan_id,
            source,
            dest_tuple,
            mut selector,
            groups,
            budget,
            partition_routing,
        } = self;

        let binder = RowSchemaBinder::new(source.table(), dest_tuple);
        let broker = source.broker();
        let mut partitioner = ScanRangePartitioner::new(
            &mut selector,
            ctx.resolver.as_ref(),
            &broker.name,
            budget.bytes_per_instance,
        );

        let mut tasks = Vec::new();
        for state in &groups {
            if state.files.is_empty() {
                continue;
            }
            let transform = binder.finalize(&state.staged, descs)?;
            let params = ScanRangeParams {
                column_separator: state.column_separator,
                line_delimiter: state.line_delimiter,
                properties: broker.properties.clone(),
                src_tuple_id: transform.src_tuple_id,
                src_slot_ids: transform.src_slot_ids,
                dest_tuple_id: transform.dest_tuple_id,
                expr_of_dest_slot: transform.expr_of_dest_slot,
                partition_ids: (!state.group.partition_ids.is_empty())
                    .then(|| state.group.partition_ids.clone()),
            };
            tasks.extend(partitioner.partition_group(Arc::new(params), &state.files)?);
        }

        for task in &tasks {
            debug!(
                "Scan task of {} bytes on workers {:?}: {:?}",
                task.total_bytes(),
                task.locations.iter().map(|l| l.worker_id).collect::<Vec<_>>(),
                task.ranges
            );
        }
        info!("Broker scan {} produced {} tasks", plan_id, tasks.len());

        Ok(ScanPlan {
            plan_id,
            tasks,
            num_instances: budget.num_instances,
            bytes_per_instance: budget.bytes_per_instance,
            total_bytes: budget.total_bytes,
            partition_routing,
            explain,
        })
    }
}

/// List every path of every group, at most one listing per pooled
/// connection in flight. Results come back per group in declaration order,
/// then each group is sorted by size.
async fn discover(
    ctx: &PlanContext,
    broker: &BrokerDesc,
    file_groups: &[FileGroup],
) -> Result<Vec<Vec<FileStatus>>, PlanError> {
    let requests = file_groups.iter().enumerate().flat_map(|(index, group)| {
        group.file_paths.iter().map(move |path| (index, path.as_str()))
    });
    let listings: Vec<(usize, Vec<FileStatus>)> = stream::iter(requests)
        .map(|(index, path)| async move {
            ctx.lister
                .list_files(path, broker, &ctx.config.local_host)
                .await
                .map(|files| (index, files))
        })
        .buffered(ctx.config.broker_pool_max_per_address.max(1))
        .try_collect()
        .await?;

    let mut per_group: Vec<Vec<FileStatus>> = vec![Vec::new(); file_groups.len()];
    for (index, files) in listings {
        per_group[index].extend(files);
    }
    for files in &mut per_group {
        sort_by_size(files);
        for file in files.iter() {
            debug!("Add file status {:?}", file);
        }
    }
    Ok(per_group)
}

fn build_partition_routing(
    table: &TableSchema,
    dest_tuple: TupleId,
    descs: &DescriptorTable,
) -> Result<Option<PartitionRouting>, PlanError> {
    let Some(partitioning) = &table.partitioning else {
        return Ok(None);
    };
    let dest = descs
        .tuple(dest_tuple)
        .ok_or(TransformError::UnknownTuple(dest_tuple))?;
    let exprs = partitioning
        .columns
        .iter()
        .map(|name| {
            dest.slots
                .iter()
                .find(|s| s.name == *name)
                .map(|s| Expr::slot(s.id, name.clone()))
                .ok_or_else(|| TransformError::UnknownColumn {
                    column: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(PartitionRouting {
        exprs,
        partitions: partitioning.partitions.clone(),
    }))
}
