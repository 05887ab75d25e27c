//! Brokerscan CLI - plan broker scans from a JSON request

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use brokerscan_connectors::LocalFsConnector;
use brokerscan_core::{
    BrokerEndpoint, DescriptorTable, PlannerConfig, TupleDescriptor, WorkerNode,
};
use brokerscan_planner::{BrokerScanNode, InitializedScan, PlanContext, ScanSource, StaticCatalog};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "brokerscan")]
#[command(about = "Plan distributed scans of broker-backed files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a statement and print its scan tasks
    Plan {
        /// Path to the request JSON file
        #[arg(short, long)]
        request: PathBuf,

        /// Print only the explain text
        #[arg(long)]
        explain_only: bool,

        /// Print broker pool metrics to stderr when done
        #[arg(long)]
        metrics: bool,
    },

    /// Discover files and stage the row transform without generating tasks
    Validate {
        /// Path to the request JSON file
        #[arg(short, long)]
        request: PathBuf,
    },
}

/// A statement plus the cluster it is planned against. Files are listed
/// from the local filesystem whatever broker the statement names.
#[derive(Debug, Deserialize)]
struct PlanRequest {
    #[serde(default)]
    workers: Vec<WorkerNode>,
    #[serde(default)]
    brokers: Vec<BrokerEndpoint>,
    source: ScanSource,
}

impl PlanRequest {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid request {:?}", path))
    }

    fn context(&self, config: PlannerConfig) -> PlanContext {
        let catalog = StaticCatalog::new(self.workers.clone(), self.brokers.clone());
        PlanContext::from_catalog(Arc::new(catalog), Arc::new(LocalFsConnector::new()), config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = PlannerConfig::from_env()?;

    match cli.command {
        Commands::Plan {
            request,
            explain_only,
            metrics,
        } => {
            plan(&request, config, explain_only, metrics).await?;
        }
        Commands::Validate { request } => {
            validate(&request, config).await?;
        }
    }

    Ok(())
}

async fn init(
    request: &PlanRequest,
    ctx: &PlanContext,
    descs: &mut DescriptorTable,
) -> Result<InitializedScan> {
    let dest = descs.create_table_tuple(request.source.table());
    let node = BrokerScanNode::new(request.source.clone(), dest);
    Ok(node.init(ctx, descs).await?)
}

async fn plan(path: &Path, config: PlannerConfig, explain_only: bool, metrics: bool) -> Result<()> {
    info!("Loading request from {:?}", path);
    let request = PlanRequest::load(path)?;
    let ctx = request.context(config);

    let mut descs = DescriptorTable::new();
    let scan = init(&request, &ctx, &mut descs).await?;
    let plan = scan.finalize(&ctx, &mut descs)?;

    if !explain_only {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    print!("{}", plan.explain);

    if metrics {
        eprint!("{}", ctx.lister.pool().metrics().encode()?);
    }
    Ok(())
}

async fn validate(path: &Path, config: PlannerConfig) -> Result<()> {
    let request = PlanRequest::load(path)?;
    let ctx = request.context(config);

    let mut descs = DescriptorTable::new();
    let scan = init(&request, &ctx, &mut descs).await?;

    println!("Request is valid");
    for (index, (files, staged)) in scan
        .file_statuses()
        .iter()
        .zip(scan.staged_groups())
        .enumerate()
    {
        let bytes: u64 = files.iter().map(|f| f.size).sum();
        println!("  group {}: {} files, {} bytes", index, files.len(), bytes);
        if let Some(tuple) = descs.tuple(staged.staging.tuple_id) {
            println!("    staging: {}", describe_staging(tuple));
        }
    }
    let budget = scan.budget();
    println!(
        "  {} instances, {} bytes per instance",
        budget.num_instances, budget.bytes_per_instance
    );
    print!("{}", scan.explain("  "));
    Ok(())
}

/// `name: type` per staging field, `?` marking nullable ones.
fn describe_staging(tuple: &TupleDescriptor) -> String {
    let schema = tuple.arrow_schema();
    schema
        .fields()
        .iter()
        .map(|f| {
            let nullable = if f.is_nullable() { "?" } else { "" };
            format!("{}: {}{}", f.name(), f.data_type(), nullable)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
