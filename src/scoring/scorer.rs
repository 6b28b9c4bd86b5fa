//! Priority scoring and tiering
//!
//! ```text
//! priority = w_f·financial + w_d·deviation + w_u·urgency + w_c·confidence
//! ```
//!
//! Each sub-score is clamped to [0, 100]. With default weights
//! (0.4 / 0.3 / 0.2 / 0.1) and $100 per financial point, every $1000 of
//! impact is worth 10 financial points.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::types::{Insight, InsightPayload, PriorityLevel, RiskLevel, ScoreBreakdown};

/// Insights bucketed by rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedFeed {
    pub urgent: Vec<Insight>,
    pub notable: Vec<Insight>,
    pub background: Vec<Insight>,
}

impl PrioritizedFeed {
    pub fn len(&self) -> usize {
        self.urgent.len() + self.notable.len() + self.background.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All insights in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &Insight> {
        self.urgent.iter().chain(&self.notable).chain(&self.background)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Insight> {
        self.urgent
            .iter_mut()
            .chain(self.notable.iter_mut())
            .chain(self.background.iter_mut())
    }
}

/// Scores and ranks insights from every analyzer on one scale.
#[derive(Debug, Clone, Default)]
pub struct InsightScorer {
    config: ScoringConfig,
}

impl InsightScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn sub_scores(&self, insight: &Insight) -> ScoreBreakdown {
        let per_point = if self.config.dollars_per_point > 0.0 {
            self.config.dollars_per_point
        } else {
            100.0
        };
        let confidence = insight.confidence.unwrap_or(self.config.default_confidence);

        ScoreBreakdown {
            financial: clamp_score(insight.financial_impact / per_point),
            deviation: clamp_score(deviation_score(&insight.payload)),
            urgency: clamp_score(urgency_score(&insight.payload)),
            confidence: clamp_score(confidence * 100.0),
        }
    }

    /// Fill in `scores` and `priority_score`.
    pub fn score(&self, insight: &mut Insight) {
        let s = self.sub_scores(insight);
        insight.priority_score = s.financial * self.config.financial_weight
            + s.deviation * self.config.deviation_weight
            + s.urgency * self.config.urgency_weight
            + s.confidence * self.config.confidence_weight;
        insight.scores = s;
    }

    /// Score, collapse duplicate ids (highest score wins), sort descending and tier.
    pub fn prioritize(&self, insights: Vec<Insight>) -> PrioritizedFeed {
        let mut best: HashMap<String, Insight> = HashMap::new();
        for mut insight in insights {
            self.score(&mut insight);
            match best.get(&insight.id) {
                Some(existing) if existing.priority_score >= insight.priority_score => {}
                _ => {
                    best.insert(insight.id.clone(), insight);
                }
            }
        }

        let mut ranked: Vec<Insight> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.priority_score
                .total_cmp(&a.priority_score)
                .then_with(|| a.id.cmp(&b.id))
        });

        let feed = self.tier(ranked);
        debug!(
            urgent = feed.urgent.len(),
            notable = feed.notable.len(),
            background = feed.background.len(),
            "Insights prioritized"
        );
        feed
    }

    /// Split an already ranked list: first `urgent_count` urgent, next
    /// `notable_count` notable, the rest background.
    pub fn tier(&self, ranked: Vec<Insight>) -> PrioritizedFeed {
        let mut feed = PrioritizedFeed::default();
        for (rank, mut insight) in ranked.into_iter().enumerate() {
            let level = if rank < self.config.urgent_count {
                PriorityLevel::Urgent
            } else if rank < self.config.urgent_count + self.config.notable_count {
                PriorityLevel::Notable
            } else {
                PriorityLevel::Background
            };
            insight.priority_level = Some(level);
            match level {
                PriorityLevel::Urgent => feed.urgent.push(insight),
                PriorityLevel::Notable => feed.notable.push(insight),
                PriorityLevel::Background => feed.background.push(insight),
            }
        }
        feed
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn deviation_score(payload: &InsightPayload) -> f64 {
    match payload {
        InsightPayload::EquipmentRisk(r) => r.failure_probability * 100.0,
        InsightPayload::CostPrediction(p) => match p.risk_level {
            RiskLevel::Critical => 100.0,
            RiskLevel::High => 75.0,
            RiskLevel::Medium => 50.0,
            RiskLevel::Low => 25.0,
        },
        InsightPayload::CostPattern(p) => (p.order_count as f64 * 10.0).min(100.0),
        InsightPayload::QualityIssue(_) | InsightPayload::EfficiencyOpportunity(_) => 50.0,
    }
}

fn urgency_score(payload: &InsightPayload) -> f64 {
    match payload {
        InsightPayload::EquipmentRisk(r) => r.failure_probability * 100.0,
        InsightPayload::QualityIssue(q) => (q.scrap_rate * 200.0).min(100.0),
        InsightPayload::CostPattern(p) => (p.order_count as f64 * 8.0).min(100.0),
        InsightPayload::CostPrediction(p) => match p.risk_level {
            RiskLevel::Critical => 95.0,
            RiskLevel::High => 75.0,
            RiskLevel::Medium => 50.0,
            RiskLevel::Low => 25.0,
        },
        InsightPayload::EfficiencyOpportunity(_) => 40.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AnalyzerKind, CostPattern, EfficiencyOpportunity, InsightType, PatternKind, SavingsBreakdown,
        TrendStatus,
    };

    fn pattern_insight(id: &str, impact: f64, orders: usize) -> Insight {
        let payload = InsightPayload::CostPattern(CostPattern {
            kind: PatternKind::Material,
            identifier: id.to_string(),
            order_count: orders,
            total_impact: impact,
            avg_variance: 0.0,
            work_orders: vec![],
            trend_status: TrendStatus::Stable,
            baseline_comparison: None,
            cost_trend: None,
            correlations: vec![],
        });
        Insight {
            id: Insight::make_id(AnalyzerKind::Cost, InsightType::MaterialPattern, id),
            source: AnalyzerKind::Cost,
            insight_type: InsightType::MaterialPattern,
            identifier: id.to_string(),
            payload,
            financial_impact: impact,
            confidence: None,
            scores: ScoreBreakdown::default(),
            priority_score: 0.0,
            priority_level: None,
            narrative: None,
        }
    }

    fn efficiency_insight(op: &str, savings: f64) -> Insight {
        let payload = InsightPayload::EfficiencyOpportunity(EfficiencyOpportunity {
            operation_type: op.to_string(),
            order_count: 2,
            efficiency_score: 80.0,
            labor_efficiency_pct: 80.0,
            cost_efficiency_pct: 80.0,
            consistency: 0.0,
            potential_savings: savings,
            savings: SavingsBreakdown {
                labor: savings,
                material: 0.0,
                quality: 0.0,
            },
            drivers: vec![],
        });
        Insight {
            id: Insight::make_id(AnalyzerKind::Efficiency, InsightType::EfficiencyOpportunity, op),
            source: AnalyzerKind::Efficiency,
            insight_type: InsightType::EfficiencyOpportunity,
            identifier: op.to_string(),
            payload,
            financial_impact: savings,
            confidence: None,
            scores: ScoreBreakdown::default(),
            priority_score: 0.0,
            priority_level: None,
            narrative: None,
        }
    }

    #[test]
    fn test_pattern_score_formula() {
        let scorer = InsightScorer::default();
        let mut insight = pattern_insight("MAT-A", 5_000.0, 4);
        scorer.score(&mut insight);
        // financial 50, deviation 40, urgency 32, confidence 70
        assert!((insight.scores.financial - 50.0).abs() < 1e-9);
        assert!((insight.scores.deviation - 40.0).abs() < 1e-9);
        assert!((insight.scores.urgency - 32.0).abs() < 1e-9);
        assert!((insight.scores.confidence - 70.0).abs() < 1e-9);
        let expected = 0.4 * 50.0 + 0.3 * 40.0 + 0.2 * 32.0 + 0.1 * 70.0;
        assert!((insight.priority_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_financial_score_caps_at_100() {
        let scorer = InsightScorer::default();
        let s = scorer.sub_scores(&pattern_insight("MAT-A", 13_500.0, 3));
        assert!((s.financial - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_efficiency_urgency_fixed() {
        let scorer = InsightScorer::default();
        let s = scorer.sub_scores(&efficiency_insight("PROD", 1_000.0));
        assert!((s.urgency - 40.0).abs() < f64::EPSILON);
        assert!((s.deviation - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_monotonic_in_impact() {
        let scorer = InsightScorer::default();
        let mut low = pattern_insight("MAT-A", 1_000.0, 3);
        let mut high = pattern_insight("MAT-A", 2_000.0, 3);
        scorer.score(&mut low);
        scorer.score(&mut high);
        assert!(high.priority_score > low.priority_score);
    }

    #[test]
    fn test_tier_sizes() {
        let scorer = InsightScorer::default();
        let insights: Vec<Insight> = (0..18)
            .map(|i| pattern_insight(&format!("MAT-{i:02}"), 1_000.0 * (i + 1) as f64, 3))
            .collect();
        let feed = scorer.prioritize(insights);
        assert_eq!(feed.urgent.len(), 5);
        assert_eq!(feed.notable.len(), 10);
        assert_eq!(feed.background.len(), 3);
        assert_eq!(feed.urgent[0].identifier, "MAT-17", "Largest impact ranks first");
        assert!(feed.iter().all(|i| i.priority_level.is_some()));
        assert_eq!(feed.background[0].priority_level, Some(PriorityLevel::Background));
    }

    #[test]
    fn test_small_feed_is_all_urgent() {
        let scorer = InsightScorer::default();
        let feed = scorer.prioritize(vec![pattern_insight("MAT-A", 10.0, 3), pattern_insight("MAT-B", 20.0, 3)]);
        assert_eq!(feed.urgent.len(), 2);
        assert!(feed.notable.is_empty() && feed.background.is_empty());
    }

    #[test]
    fn test_duplicate_ids_keep_highest() {
        let scorer = InsightScorer::default();
        let feed = scorer.prioritize(vec![
            pattern_insight("MAT-A", 1_000.0, 3),
            pattern_insight("MAT-A", 9_000.0, 3),
        ]);
        assert_eq!(feed.len(), 1);
        assert!((feed.urgent[0].financial_impact - 9_000.0).abs() < f64::EPSILON);
    }
}
