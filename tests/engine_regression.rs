//! Engine Regression Tests
//!
//! Runs whole batches through `AnalysisEngine` with in-memory collaborators
//! and asserts on the documented behaviors: investigation grouping, tier
//! sizes, degraded baselines, the degradation point floor and the
//! $13,500-vs-$10,000 material cost example.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use plant_insight::analytics::{CorrelationAnalyzer, DriftDetector, TrendDetector};
use plant_insight::analyzers::AnalyzerReport;
use plant_insight::baseline::BaselineError;
use plant_insight::orchestrator::AnalyzerStatus;
use plant_insight::types::{
    CorrelationKind, CostDirection, CostPattern, InsightPayload, PatternKind, ScoreBreakdown,
};
use plant_insight::{
    AnalysisEngine, AnalysisRequest, AnalyzerKind, BaselineRepository, EngineConfig,
    InMemoryBaselineRepository, InMemoryRecordStore, Insight, InsightScorer, MetricBaseline,
    MetricType, PriorityLevel, TrendStatus, WorkOrderRecord,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
}

fn order(id: &str, batch: &str, days_ago: i64) -> WorkOrderRecord {
    WorkOrderRecord {
        upload_batch_id: Some(batch.to_string()),
        planned_labor_hours: Some(8.0),
        actual_labor_hours: Some(8.0),
        ..WorkOrderRecord::new(id, "PLANT-1", now() - Duration::days(days_ago))
    }
}

fn material_order(
    id: &str,
    batch: &str,
    days_ago: i64,
    material: &str,
    supplier: &str,
    planned: f64,
    actual: f64,
) -> WorkOrderRecord {
    WorkOrderRecord {
        material_code: Some(material.to_string()),
        supplier_id: Some(supplier.to_string()),
        planned_material_cost: Some(planned),
        actual_material_cost: Some(actual),
        ..order(id, batch, days_ago)
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

fn cost_tier_headers() -> Vec<String> {
    headers(&[
        "Work Order",
        "Planned Material Cost",
        "Actual Material Cost",
        "Material Code",
        "Supplier ID",
    ])
}

fn request(batch: &str, schema_headers: Vec<String>) -> AnalysisRequest {
    AnalysisRequest {
        facility_id: "PLANT-1".to_string(),
        batch_id: batch.to_string(),
        schema_headers,
        now: now(),
    }
}

fn engine_with(records: Vec<WorkOrderRecord>, repo: Arc<dyn BaselineRepository>) -> AnalysisEngine {
    AnalysisEngine::new(
        Arc::new(InMemoryRecordStore::new(records)),
        repo,
        EngineConfig::default(),
    )
}

fn engine(records: Vec<WorkOrderRecord>) -> AnalysisEngine {
    engine_with(records, Arc::new(InMemoryBaselineRepository::new()))
}

/// Three cheap MAT-X orders from SUP-1, then three 35% dearer from SUP-2.
fn price_step_history() -> Vec<WorkOrderRecord> {
    let mut records = Vec::new();
    for (i, days_ago) in [10, 9, 8].into_iter().enumerate() {
        records.push(material_order(
            &format!("WO-OLD-{i}"),
            "B0",
            days_ago,
            "MAT-X",
            "SUP-1",
            10_000.0,
            10_000.0,
        ));
    }
    for (i, days_ago) in [3, 2, 1].into_iter().enumerate() {
        records.push(material_order(
            &format!("WO-NEW-{i}"),
            "B1",
            days_ago,
            "MAT-X",
            "SUP-2",
            10_000.0,
            13_500.0,
        ));
    }
    records
}

// ============================================================================
// Investigation grouping
// ============================================================================

#[tokio::test]
async fn material_patterns_merge_into_one_investigation() {
    let mut records = Vec::new();
    for i in 0..3 {
        records.push(material_order(&format!("WO-A{i}"), "B1", i, "MAT-A", "", 10_000.0, 12_000.0));
        records.push(material_order(&format!("WO-B{i}"), "B1", i, "MAT-B", "", 10_000.0, 13_000.0));
    }
    // Blank suppliers do not form supplier patterns
    for r in &mut records {
        r.supplier_id = None;
    }

    let run = engine(records)
        .analyze(&request("B1", cost_tier_headers()))
        .await
        .unwrap();

    assert_eq!(run.investigations.len(), 1);
    let inv = &run.investigations[0];
    assert_eq!(inv.insight_ids.len(), 2);
    assert!((inv.total_impact - 15_000.0).abs() < 1e-6);
    assert_eq!(inv.trend_status, TrendStatus::Stable);
}

// ============================================================================
// Tiering
// ============================================================================

#[tokio::test]
async fn eighteen_insights_split_five_ten_three() {
    let records: Vec<WorkOrderRecord> = (0..18)
        .map(|i| {
            material_order(
                &format!("WO-{i:02}"),
                "B1",
                i % 7,
                &format!("MAT-{i:02}"),
                &format!("SUP-{i:02}"),
                10_000.0,
                12_000.0 + 500.0 * i as f64,
            )
        })
        .collect();

    let run = engine(records)
        .analyze(&request("B1", cost_tier_headers()))
        .await
        .unwrap();

    assert_eq!(run.feed.len(), 18);
    assert_eq!(run.feed.urgent.len(), 5);
    assert_eq!(run.feed.notable.len(), 10);
    assert_eq!(run.feed.background.len(), 3);
    assert!(run.investigations.is_empty());

    let scores: Vec<f64> = run.feed.iter().map(|i| i.priority_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "Feed must be sorted descending");
    assert!(run
        .feed
        .urgent
        .iter()
        .all(|i| i.priority_level == Some(PriorityLevel::Urgent)));
}

// ============================================================================
// Degraded collaborators
// ============================================================================

struct BrokenRepository;

impl BaselineRepository for BrokenRepository {
    fn upsert(&self, _baseline: &MetricBaseline) -> Result<(), BaselineError> {
        Err(BaselineError::LockPoisoned)
    }

    fn upsert_all(&self, _baselines: &[MetricBaseline]) -> Result<(), BaselineError> {
        Err(BaselineError::LockPoisoned)
    }

    fn get(
        &self,
        _facility_id: &str,
        _metric_type: MetricType,
        _identifier: &str,
    ) -> Result<Option<MetricBaseline>, BaselineError> {
        Err(BaselineError::LockPoisoned)
    }

    fn list(&self, _facility_id: &str) -> Result<Vec<MetricBaseline>, BaselineError> {
        Err(BaselineError::LockPoisoned)
    }
}

#[tokio::test]
async fn broken_baseline_repository_still_produces_feed() {
    let run = engine_with(price_step_history(), Arc::new(BrokenRepository))
        .analyze(&request("B1", cost_tier_headers()))
        .await
        .unwrap();

    assert!(run.baselines_refreshed.is_empty());
    assert!(!run.feed.is_empty());
    assert!(run.feed.iter().all(|i| i.narrative.is_some()));

    let pattern = run
        .feed
        .iter()
        .find_map(|i| match &i.payload {
            InsightPayload::CostPattern(p) if p.kind == PatternKind::Material => Some(p),
            _ => None,
        })
        .unwrap();
    assert!(pattern.baseline_comparison.is_none(), "No baseline, no comparison text");
}

// ============================================================================
// Degradation floor
// ============================================================================

fn machine_order(id: &str, days_ago: i64, hours: f64) -> WorkOrderRecord {
    WorkOrderRecord {
        equipment_id: Some("CNC-1".to_string()),
        actual_labor_hours: Some(hours),
        ..order(id, "B1", days_ago)
    }
}

#[test]
fn four_point_equipment_never_degrades() {
    let drift = DriftDetector::default();
    let four: Vec<WorkOrderRecord> = [8.0, 10.0, 14.0, 20.0]
        .into_iter()
        .enumerate()
        .map(|(i, h)| machine_order(&format!("WO-{i}"), 4 - i as i64, h))
        .collect();
    assert!(drift.detect_equipment_degradation("CNC-1", &four, now()).is_none());

    let five: Vec<WorkOrderRecord> = [8.0, 8.0, 10.0, 14.0, 20.0]
        .into_iter()
        .enumerate()
        .map(|(i, h)| machine_order(&format!("WO-{i}"), 5 - i as i64, h))
        .collect();
    let event = drift.detect_equipment_degradation("CNC-1", &five, now()).unwrap();
    assert!(event.degradation_pct > 0.0);
    assert_eq!(event.data_points, 5);
}

#[tokio::test]
async fn four_point_machine_risk_has_no_degradation() {
    let records: Vec<WorkOrderRecord> = [8.0, 10.0, 14.0, 20.0]
        .into_iter()
        .enumerate()
        .map(|(i, h)| WorkOrderRecord {
            planned_material_cost: Some(1_000.0),
            actual_material_cost: Some(1_000.0),
            material_code: Some("MAT-A".to_string()),
            ..machine_order(&format!("WO-{i}"), 4 - i as i64, h)
        })
        .collect();

    let run = engine(records)
        .analyze(&request(
            "B1",
            headers(&["Planned Material Cost", "Actual Material Cost", "Material Code", "Machine ID"]),
        ))
        .await
        .unwrap();

    let equipment = run
        .summaries
        .iter()
        .find(|s| s.analyzer == AnalyzerKind::Equipment)
        .unwrap();
    assert_eq!(equipment.status, AnalyzerStatus::Completed);

    let report = run
        .reports
        .iter()
        .find_map(|r| match r {
            AnalyzerReport::Equipment(e) => Some(e),
            _ => None,
        })
        .unwrap();
    assert!(report.risks.iter().all(|r| r.degradation.is_none()));
}

// ============================================================================
// Unit counts
// ============================================================================

#[tokio::test]
async fn billion_unit_batches_complete_every_analyzer() {
    let records: Vec<WorkOrderRecord> = (0..3)
        .map(|i| WorkOrderRecord {
            material_code: Some("MAT-A".to_string()),
            planned_material_cost: Some(1_000.0),
            actual_material_cost: Some(1_000.0),
            units_produced: Some(2_000_000_000),
            units_scrapped: Some(1_500_000_000),
            quality_issue: true,
            ..machine_order(&format!("WO-{i}"), 3 - i64::from(i), 8.0)
        })
        .collect();

    let run = engine(records)
        .analyze(&request(
            "B1",
            headers(&[
                "Planned Material Cost",
                "Actual Material Cost",
                "Material Code",
                "Machine ID",
                "Scrap Qty",
            ]),
        ))
        .await
        .unwrap();

    for kind in [AnalyzerKind::Equipment, AnalyzerKind::Quality] {
        let summary = run.summaries.iter().find(|s| s.analyzer == kind).unwrap();
        assert_eq!(summary.status, AnalyzerStatus::Completed, "{kind:?}: {:?}", summary.error);
    }
    let quality = run
        .reports
        .iter()
        .find_map(|r| match r {
            AnalyzerReport::Quality(q) => Some(q),
            _ => None,
        })
        .unwrap();
    assert!((quality.issues[0].scrap_rate - 0.75).abs() < 1e-9);
}

// ============================================================================
// $13,500 vs $10,000
// ============================================================================

#[test]
fn material_cost_example_deviation_and_text() {
    let trend = TrendDetector::default();
    let d = trend.calculate_deviation(13_500.0, 10_000.0);
    assert!((d.deviation_pct - 35.0).abs() < 1e-9);
    assert!((d.multiplier - 1.35).abs() < 1e-9);

    let text = trend.format_comparative_text("Material cost", 13_500.0, 10_000.0, None);
    assert_eq!(text, "Material cost is $13,500.00 vs your typical $10,000.00 (1.35x higher)");
}

#[test]
fn material_cost_example_trend_and_supplier_correlation() {
    let records = price_step_history();
    let drift = DriftDetector::default();
    let cost_trend = drift.detect_cost_trend("MAT-X", &records, now()).unwrap();
    assert_eq!(cost_trend.direction, CostDirection::Increasing);
    assert!((cost_trend.cost_change_pct - 35.0).abs() < 1e-9);
    assert!(cost_trend.supplier_change_hint.is_some());

    let inflection = cost_trend.inflection.as_ref().map(|p| p.timestamp);
    let correlations =
        CorrelationAnalyzer::default().cost_correlations("MAT-X", &records, inflection, now());
    assert!(correlations
        .iter()
        .any(|c| c.kind == CorrelationKind::SupplierChange));
}

#[test]
fn material_cost_example_scores_full_financial() {
    let payload = InsightPayload::CostPattern(CostPattern {
        kind: PatternKind::Material,
        identifier: "MAT-X".to_string(),
        order_count: 3,
        total_impact: 13_500.0,
        avg_variance: 4_500.0,
        work_orders: vec![],
        trend_status: TrendStatus::Accelerating,
        baseline_comparison: None,
        cost_trend: None,
        correlations: vec![],
    });
    let insight_type = payload.insight_type();
    let insight = Insight {
        id: Insight::make_id(AnalyzerKind::Cost, insight_type, "MAT-X"),
        source: AnalyzerKind::Cost,
        insight_type,
        identifier: "MAT-X".to_string(),
        payload,
        financial_impact: 13_500.0,
        confidence: None,
        scores: ScoreBreakdown::default(),
        priority_score: 0.0,
        priority_level: None,
        narrative: None,
    };
    let scores = InsightScorer::default().sub_scores(&insight);
    assert!((scores.financial - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn material_cost_example_end_to_end() {
    let run = engine(price_step_history())
        .analyze(&request("B1", cost_tier_headers()))
        .await
        .unwrap();

    assert_eq!(run.baselines_refreshed.get(&MetricType::MaterialCost), Some(&1));

    let pattern = run
        .feed
        .iter()
        .find_map(|i| match &i.payload {
            InsightPayload::CostPattern(p) if p.kind == PatternKind::Material => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(pattern.identifier, "MAT-X");
    assert_eq!(pattern.trend_status, TrendStatus::Accelerating);

    // Baseline spans old and new orders: (3 * 10,000 + 3 * 13,500) / 6
    let comparison = pattern.baseline_comparison.as_deref().unwrap();
    assert!(
        comparison.starts_with("Material cost is $13,500.00 vs your typical $11,750.00"),
        "got {comparison}"
    );
    let cost_trend = pattern.cost_trend.as_ref().unwrap();
    assert!((cost_trend.cost_change_pct - 35.0).abs() < 1e-9);
    assert!(pattern
        .correlations
        .iter()
        .any(|c| c.kind == CorrelationKind::SupplierChange));

    // MAT-X and SUP-2 patterns group together
    assert_eq!(run.investigations.len(), 1);
    assert_eq!(run.investigations[0].trend_status, TrendStatus::Accelerating);
}
