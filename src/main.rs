//! plant-insight - work-order analytics from the command line
//!
//! # Usage
//!
//! ```bash
//! # Analyze one upload batch and print the prioritized feed as JSON
//! plant-insight analyze --records orders.json --batch B-2024-03 --facility PLANT-1
//!
//! # Refresh and list a facility's rolling baselines
//! plant-insight baselines --records orders.json --facility PLANT-1
//! ```
//!
//! # Environment Variables
//!
//! - `PLANT_INSIGHT_CONFIG`: Path to the engine TOML config (default: ./insight_config.toml)
//! - `PLANT_INSIGHT_DB`: Baseline database directory (default: ./data/baselines)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use plant_insight::config::{self, EngineConfig};
use plant_insight::{
    AnalysisEngine, AnalysisRequest, BaselineRepository, InMemoryRecordStore, RecordQuery,
    RecordStore, SledBaselineRepository, WorkOrderRecord,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plant-insight")]
#[command(about = "Adaptive analytics and insight prioritization for work-order data")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Engine config file (overrides PLANT_INSIGHT_CONFIG and ./insight_config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Baseline database directory
    #[arg(long, global = true, env = "PLANT_INSIGHT_DB", default_value = "./data/baselines")]
    db: PathBuf,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Analyze one upload batch and print the run as JSON
    Analyze {
        /// JSON array of work-order records
        #[arg(long)]
        records: PathBuf,

        /// Upload batch to analyze
        #[arg(long)]
        batch: String,

        /// Facility id (default: [facility].id from config)
        #[arg(long)]
        facility: Option<String>,

        /// Comma-separated upload headers; inferred from record fields when omitted
        #[arg(long, value_delimiter = ',')]
        headers: Vec<String>,

        /// Reference time, RFC 3339 (default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Write the run to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Refresh a facility's baselines and print them as JSON
    Baselines {
        /// JSON array of work-order records
        #[arg(long)]
        records: PathBuf,

        /// Facility id (default: [facility].id from config)
        #[arg(long)]
        facility: Option<String>,

        /// Reference time, RFC 3339 (default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Loading a file validates it (range checks included); the built-in
/// defaults are valid as shipped.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

/// Header names for the record fields the batch actually carries.
///
/// A timestamp plus recorded labor hours counts as cycle time.
fn infer_headers(records: &[WorkOrderRecord]) -> Vec<String> {
    let checks: [(&str, fn(&WorkOrderRecord) -> bool); 9] = [
        ("Planned Material Cost", |r| r.planned_material_cost.is_some()),
        ("Actual Material Cost", |r| r.actual_material_cost.is_some()),
        ("Planned Labor Hours", |r| r.planned_labor_hours.is_some()),
        ("Actual Labor Hours", |r| r.actual_labor_hours.is_some()),
        ("Material Code", |r| r.material_code.is_some()),
        ("Supplier ID", |r| r.supplier_id.is_some()),
        ("Equipment ID", |r| r.equipment_id.is_some()),
        ("Scrapped Quantity", |r| r.units_scrapped.is_some()),
        ("Cycle Time", |r| r.actual_labor_hours.is_some()),
    ];
    checks
        .iter()
        .filter(|(_, has)| records.iter().any(|r| has(r)))
        .map(|(name, _)| (*name).to_string())
        .collect()
}

// ============================================================================
// Commands
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn run_analyze(
    cfg: EngineConfig,
    db: &Path,
    records: &Path,
    batch: String,
    facility: String,
    headers: Vec<String>,
    now: DateTime<Utc>,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = Arc::new(
        InMemoryRecordStore::from_json_file(records)
            .with_context(|| format!("Failed to load records from {}", records.display()))?,
    );

    let headers = if headers.is_empty() {
        let batch_rows = store
            .query(&RecordQuery::facility(facility.clone()).batch(batch.clone()))
            .await?;
        let inferred = infer_headers(&batch_rows);
        info!(headers = ?inferred, "Inferred upload headers from record fields");
        inferred
    } else {
        headers
    };

    let repository = Arc::new(
        SledBaselineRepository::open(db)
            .with_context(|| format!("Failed to open baseline database {}", db.display()))?,
    );
    let engine = AnalysisEngine::new(store, repository.clone(), cfg);

    let run = engine
        .analyze(&AnalysisRequest {
            facility_id: facility,
            batch_id: batch,
            schema_headers: headers,
            now,
        })
        .await?;
    repository.flush()?;

    let json = serde_json::to_string_pretty(&run)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Run written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_baselines(
    cfg: EngineConfig,
    db: &Path,
    records: &Path,
    facility: String,
    now: DateTime<Utc>,
) -> Result<()> {
    let store = Arc::new(
        InMemoryRecordStore::from_json_file(records)
            .with_context(|| format!("Failed to load records from {}", records.display()))?,
    );
    let repository = Arc::new(
        SledBaselineRepository::open(db)
            .with_context(|| format!("Failed to open baseline database {}", db.display()))?,
    );
    let engine = AnalysisEngine::new(store, repository.clone(), cfg);

    let counts = engine.baselines().update_baselines(&facility, now).await;
    info!(facility_id = %facility, written = counts.values().sum::<usize>(), "Baselines refreshed");
    repository.flush()?;

    let rows = repository.list(&facility)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    config::init(load_config(args.config.as_deref())?);
    let engine_config = config::get();
    info!(
        facility = %engine_config.facility.name,
        workers = engine_config.orchestrator.max_concurrent_analyzers,
        "plant-insight starting"
    );
    let default_facility = engine_config.facility.id.clone();

    match args.command {
        SubCommand::Analyze {
            records,
            batch,
            facility,
            headers,
            now,
            output,
        } => {
            run_analyze(
                engine_config.clone(),
                &args.db,
                &records,
                batch,
                facility.unwrap_or(default_facility),
                headers,
                now.unwrap_or_else(Utc::now),
                output,
            )
            .await
        }
        SubCommand::Baselines {
            records,
            facility,
            now,
        } => {
            run_baselines(
                engine_config.clone(),
                &args.db,
                &records,
                facility.unwrap_or(default_facility),
                now.unwrap_or_else(Utc::now),
            )
            .await
        }
    }
}
