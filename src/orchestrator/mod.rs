//! Analysis Orchestrator - one engine run per uploaded batch
//!
//! ## Run sequence
//!
//! 1. Capability gate: the batch's headers decide which analyzers apply
//! 2. Baseline refresh for the facility (completes before any analyzer starts)
//! 3. Batch read (the only step whose failure fails the run) and trailing
//!    window read (failure leaves trend and correlation work empty)
//! 4. Applicable analyzers run concurrently on the blocking pool, bounded by
//!    a semaphore and a wall-clock budget
//! 5. Findings become insights, are scored, deduplicated and tiered
//! 6. Cost patterns are grouped into investigations
//! 7. Every insight in the feed gets a narrative
//!
//! On budget overrun the shared context is cancelled so analyzers on the
//! blocking pool stop at their next checkpoint, queued tasks are aborted,
//! finished results are kept, the run is marked `partial` and the background
//! tier is emptied.

pub mod investigation;

pub use investigation::group_cost_patterns;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::analyzers::{
    default_analyzers, AnalysisContext, AnalyzerError, AnalyzerOutcome, AnalyzerReport,
    DomainAnalyzer,
};
use crate::baseline::{BaselineRepository, BaselineStore};
use crate::capability::{CapabilityGate, HeaderTierDetector, TierReport};
use crate::config::EngineConfig;
use crate::narrative::{fallback_narrative, NarrativeGenerator, NarrativeRequest, TemplateNarrator};
use crate::scoring::{extract_insights, InsightScorer, PrioritizedFeed};
use crate::storage::{RecordQuery, RecordStore, StoreError};
use crate::types::{AnalyzerKind, Investigation, MetricType};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Batch {batch_id} for facility {facility_id} could not be read: {source}")]
    BatchUnavailable {
        facility_id: String,
        batch_id: String,
        #[source]
        source: StoreError,
    },
}

/// One batch to analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub facility_id: String,
    pub batch_id: String,
    /// Column headers of the upload, used by the capability gate
    pub schema_headers: Vec<String>,
    /// Reference time for windows and days-ago values
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerStatus {
    Completed,
    NoData,
    InsufficientData,
    Failed,
    TimedOut,
    /// Not applicable at the batch's data tier
    Skipped,
}

/// Per-analyzer observability row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerSummary {
    pub analyzer: AnalyzerKind,
    pub status: AnalyzerStatus,
    pub insight_count: usize,
    pub financial_total: f64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzerSummary {
    fn empty(analyzer: AnalyzerKind, status: AnalyzerStatus) -> Self {
        Self {
            analyzer,
            status,
            insight_count: 0,
            financial_total: 0.0,
            duration_ms: 0,
            missing_fields: Vec::new(),
            error: None,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub facility_id: String,
    pub batch_id: String,
    pub generated_at: DateTime<Utc>,
    pub tier: TierReport,
    /// Baselines written by this run's refresh, per metric type
    pub baselines_refreshed: BTreeMap<MetricType, usize>,
    pub feed: PrioritizedFeed,
    pub investigations: Vec<Investigation>,
    pub summaries: Vec<AnalyzerSummary>,
    pub reports: Vec<AnalyzerReport>,
    /// The analyzer phase hit its budget
    pub partial: bool,
}

type TaskResult = (AnalyzerKind, Result<AnalyzerOutcome, AnalyzerError>, Duration);

/// The analysis engine.
pub struct AnalysisEngine {
    records: Arc<dyn RecordStore>,
    baselines: BaselineStore,
    gate: Arc<dyn CapabilityGate>,
    narrator: Arc<dyn NarrativeGenerator>,
    analyzers: Vec<Arc<dyn DomainAnalyzer>>,
    scorer: InsightScorer,
    config: Arc<EngineConfig>,
}

impl AnalysisEngine {
    /// Engine with the header tier detector, template narrator and all four analyzers.
    pub fn new(
        records: Arc<dyn RecordStore>,
        repository: Arc<dyn BaselineRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            baselines: BaselineStore::new(records.clone(), repository, config.baseline.clone()),
            records,
            gate: Arc::new(HeaderTierDetector::new()),
            narrator: Arc::new(TemplateNarrator),
            analyzers: default_analyzers(),
            scorer: InsightScorer::new(config.scoring.clone()),
            config: Arc::new(config),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn CapabilityGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_analyzers(mut self, analyzers: Vec<Arc<dyn DomainAnalyzer>>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full analysis for one batch.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisRun, EngineError> {
        let facility_id = request.facility_id.as_str();
        let now = request.now;

        // 1. Capability gate
        let tier = self.gate.detect_tier(&request.schema_headers);
        let (applicable, skipped): (Vec<_>, Vec<_>) = self
            .analyzers
            .iter()
            .cloned()
            .partition(|a| tier.available_analyzers.contains(&a.kind()));
        info!(
            facility_id = %facility_id,
            batch_id = %request.batch_id,
            tier = tier.tier,
            analyzers = applicable.len(),
            "Analysis run started"
        );

        // 2. Baselines
        let refreshed = self.baselines.update_baselines(facility_id, now).await;
        let baselines_fresh = !refreshed.is_empty();
        if !baselines_fresh {
            warn!(facility_id = %facility_id, "No baselines refreshed; narratives will omit baseline context");
        }

        // 3. Records
        let batch_query = RecordQuery::facility(facility_id).batch(request.batch_id.clone());
        let batch = self
            .records
            .query(&batch_query)
            .await
            .map_err(|source| EngineError::BatchUnavailable {
                facility_id: facility_id.to_string(),
                batch_id: request.batch_id.clone(),
                source,
            })?;

        let window_query = RecordQuery {
            since: Some(now - ChronoDuration::days(self.config.trend.window_days)),
            ..RecordQuery::facility(facility_id)
        };
        let window = match self.records.query(&window_query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(facility_id = %facility_id, error = %e, "Trailing window unavailable; trend and correlation checks skipped");
                Vec::new()
            }
        };
        debug!(batch = batch.len(), window = window.len(), "Records loaded");

        let ctx = Arc::new(AnalysisContext::new(
            facility_id,
            Arc::new(batch),
            Arc::new(window),
            self.baselines.snapshot(facility_id),
            now,
            self.config.clone(),
        ));

        // 4. Analyzers
        let (results, partial) = self.run_analyzers(applicable.clone(), ctx).await;

        let mut summaries: Vec<AnalyzerSummary> = skipped
            .iter()
            .map(|a| AnalyzerSummary::empty(a.kind(), AnalyzerStatus::Skipped))
            .collect();
        let mut reports = Vec::new();
        let mut insights = Vec::new();

        for (kind, result, elapsed) in results {
            let mut summary = AnalyzerSummary::empty(kind, AnalyzerStatus::Completed);
            summary.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            match result {
                Ok(AnalyzerOutcome::Completed(report)) => {
                    let found = extract_insights(&report);
                    summary.insight_count = found.len();
                    summary.financial_total = found.iter().map(|i| i.financial_impact).sum();
                    insights.extend(found);
                    reports.push(report);
                }
                Ok(AnalyzerOutcome::NoData) => summary.status = AnalyzerStatus::NoData,
                Ok(AnalyzerOutcome::InsufficientData { missing_fields }) => {
                    summary.status = AnalyzerStatus::InsufficientData;
                    summary.missing_fields = missing_fields;
                }
                Err(e) => {
                    error!(analyzer = %kind, error = %e, "Analyzer failed");
                    summary.status = AnalyzerStatus::Failed;
                    summary.error = Some(e.to_string());
                }
            }
            summaries.push(summary);
        }

        for a in &applicable {
            let kind = a.kind();
            if !summaries.iter().any(|s| s.analyzer == kind) {
                summaries.push(AnalyzerSummary::empty(kind, AnalyzerStatus::TimedOut));
            }
        }
        summaries.sort_by_key(|s| s.analyzer);
        reports.sort_by_key(AnalyzerReport::kind);

        // 5-6. Score, tier, group
        let mut feed = self.scorer.prioritize(insights);
        let investigations = group_cost_patterns(
            feed.iter(),
            self.config.orchestrator.investigation_min_patterns,
        );
        if partial {
            feed.background.clear();
        }

        // 7. Narratives
        let rendered = join_all(feed.iter().map(|insight| {
            let req = NarrativeRequest {
                facility_id,
                insight,
                baselines_fresh,
            };
            async move { self.narrator.render(&req).await }
        }))
        .await;
        for (insight, rendered) in feed.iter_mut().zip(rendered) {
            insight.narrative = Some(match rendered {
                Ok(n) => n,
                Err(e) => {
                    warn!(insight = %insight.id, narrator = self.narrator.name(), error = %e, "Narrative failed, using fallback");
                    fallback_narrative(insight)
                }
            });
        }

        info!(
            facility_id = %facility_id,
            batch_id = %request.batch_id,
            urgent = feed.urgent.len(),
            notable = feed.notable.len(),
            background = feed.background.len(),
            investigations = investigations.len(),
            partial,
            "Analysis run complete"
        );

        Ok(AnalysisRun {
            facility_id: facility_id.to_string(),
            batch_id: request.batch_id.clone(),
            generated_at: now,
            tier,
            baselines_refreshed: refreshed.into_iter().collect(),
            feed,
            investigations,
            summaries,
            reports,
            partial,
        })
    }

    /// Run analyzers on the blocking pool. Returns finished results and
    /// whether the budget expired first.
    async fn run_analyzers(
        &self,
        analyzers: Vec<Arc<dyn DomainAnalyzer>>,
        ctx: Arc<AnalysisContext>,
    ) -> (Vec<TaskResult>, bool) {
        let permits = self.config.orchestrator.max_concurrent_analyzers.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        for analyzer in analyzers {
            let sem = semaphore.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let kind = analyzer.kind();
                let started = Instant::now();
                debug!(analyzer = %kind, "Analyzer started");
                let result = tokio::task::spawn_blocking(move || {
                    ctx.checkpoint()?;
                    analyzer.analyze(&ctx)
                })
                .await
                .unwrap_or_else(|e| Err(AnalyzerError::TaskFailed(e.to_string())));
                (kind, result, started.elapsed())
            });
        }

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.orchestrator.run_budget_secs);
        let mut results = Vec::new();
        let mut partial = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(done))) => results.push(done),
                Ok(Some(Err(e))) => error!(error = %e, "Analyzer task aborted"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = tasks.len(),
                        budget_secs = self.config.orchestrator.run_budget_secs,
                        "Analyzer budget exceeded, cancelling outstanding analyzers"
                    );
                    ctx.cancel();
                    tasks.abort_all();
                    partial = true;
                    break;
                }
            }
        }

        (results, partial)
    }
}
