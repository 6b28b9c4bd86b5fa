//! Domain Analyzers - cost, equipment, quality and efficiency
//!
//! Each analyzer turns one upload batch into findings and, where a finding
//! warrants it, enriches it with baseline context, trend, degradation or
//! drift, and candidate correlations computed over the facility's trailing
//! window.
//!
//! Analyzers are stateless: everything they read arrives in an
//! [`AnalysisContext`], so the orchestrator can run them concurrently on the
//! blocking pool. Blocking work cannot be aborted from outside, so analyzers
//! call [`AnalysisContext::checkpoint`] between groups and stop early once the
//! run is cancelled.

pub mod cost;
pub mod efficiency;
pub mod equipment;
pub mod quality;

pub use cost::CostAnalyzer;
pub use efficiency::EfficiencyAnalyzer;
pub use equipment::EquipmentAnalyzer;
pub use quality::QualityAnalyzer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::analytics::{CorrelationAnalyzer, DriftDetector, TrendDetector};
use crate::baseline::BaselineSnapshot;
use crate::config::EngineConfig;
use crate::types::{
    AnalyzerKind, CostPattern, CostPrediction, EfficiencyOpportunity, EquipmentQualityPattern,
    EquipmentRisk, MaterialQualityPattern, QualityIssue, WorkOrderRecord,
};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Non-finite {field} on work order {work_order_id}")]
    NonFinite {
        work_order_id: String,
        field: &'static str,
    },

    #[error("Analyzer task failed: {0}")]
    TaskFailed(String),

    #[error("Analysis cancelled after the run budget expired")]
    Cancelled,
}

// ============================================================================
// Context
// ============================================================================

/// Inputs shared by every analyzer in one run. Only the cancellation flag
/// ever changes.
pub struct AnalysisContext {
    pub facility_id: String,
    /// Records of the batch under analysis
    pub batch: Arc<Vec<WorkOrderRecord>>,
    /// Facility records in the trailing window, for trend and correlation work
    pub window: Arc<Vec<WorkOrderRecord>>,
    pub baselines: BaselineSnapshot,
    /// Reference time for every days-ago and window computation
    pub now: DateTime<Utc>,
    pub config: Arc<EngineConfig>,
    pub trend: TrendDetector,
    pub drift: DriftDetector,
    pub correlations: CorrelationAnalyzer,
    cancelled: AtomicBool,
}

impl AnalysisContext {
    pub fn new(
        facility_id: impl Into<String>,
        batch: Arc<Vec<WorkOrderRecord>>,
        window: Arc<Vec<WorkOrderRecord>>,
        baselines: BaselineSnapshot,
        now: DateTime<Utc>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            facility_id: facility_id.into(),
            trend: TrendDetector::new(config.trend.clone()),
            drift: DriftDetector::new(config.trend.clone()),
            correlations: CorrelationAnalyzer::new(config.correlation.clone(), config.trend.window_days),
            batch,
            window,
            baselines,
            now,
            config,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Ask every analyzer still running against this context to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn checkpoint(&self) -> Result<(), AnalyzerError> {
        if self.is_cancelled() {
            Err(AnalyzerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub predictions: Vec<CostPrediction>,
    /// Material and supplier patterns, largest |impact| first
    pub patterns: Vec<CostPattern>,
    pub variance_threshold: f64,
    /// Signed sum of significant orders' variance
    pub total_impact: f64,
    pub orders_analyzed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentReport {
    pub risks: Vec<EquipmentRisk>,
    pub quality_patterns: Vec<EquipmentQualityPattern>,
    pub total_risk_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
    pub patterns: Vec<MaterialQualityPattern>,
    /// Scrapped units per order across the batch
    pub overall_scrap_rate: f64,
    pub total_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub opportunities: Vec<EfficiencyOpportunity>,
    /// Savings across the reported opportunities
    pub total_savings: f64,
    /// Mean clamped labor efficiency across orders with recorded hours
    pub overall_efficiency_pct: f64,
}

/// Structured result of one analyzer, one variant per analyzer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analyzer", rename_all = "snake_case")]
pub enum AnalyzerReport {
    Cost(CostReport),
    Equipment(EquipmentReport),
    Quality(QualityReport),
    Efficiency(EfficiencyReport),
}

impl AnalyzerReport {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            AnalyzerReport::Cost(_) => AnalyzerKind::Cost,
            AnalyzerReport::Equipment(_) => AnalyzerKind::Equipment,
            AnalyzerReport::Quality(_) => AnalyzerKind::Quality,
            AnalyzerReport::Efficiency(_) => AnalyzerKind::Efficiency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerOutcome {
    Completed(AnalyzerReport),
    /// The batch held no records this analyzer could use
    NoData,
    /// Required columns were absent or all zero
    InsufficientData { missing_fields: Vec<String> },
}

// ============================================================================
// Trait
// ============================================================================

/// A domain analyzer.
pub trait DomainAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> AnalyzerKind;

    /// Analyze `ctx.batch`. Must not mutate shared state.
    fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutcome, AnalyzerError>;
}

/// All four analyzers.
pub fn default_analyzers() -> Vec<Arc<dyn DomainAnalyzer>> {
    vec![
        Arc::new(CostAnalyzer),
        Arc::new(EquipmentAnalyzer),
        Arc::new(QualityAnalyzer),
        Arc::new(EfficiencyAnalyzer),
    ]
}

/// Reject NaN and infinite values in numeric columns.
pub(crate) fn ensure_finite<'a>(
    records: impl IntoIterator<Item = &'a WorkOrderRecord>,
) -> Result<(), AnalyzerError> {
    for r in records {
        let fields: [(&'static str, Option<f64>); 4] = [
            ("planned_material_cost", r.planned_material_cost),
            ("actual_material_cost", r.actual_material_cost),
            ("planned_labor_hours", r.planned_labor_hours),
            ("actual_labor_hours", r.actual_labor_hours),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, v)| v.is_some_and(|v| !v.is_finite())) {
            return Err(AnalyzerError::NonFinite {
                work_order_id: r.work_order_id.clone(),
                field,
            });
        }
    }
    Ok(())
}
