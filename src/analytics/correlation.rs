//! Correlation Analyzer - candidate causes for a detected shift
//!
//! Each detector scans a window of records already narrowed to one
//! material or machine and yields at most one [`Correlation`]. Composite
//! entry points return the detectors that fired in discovery order;
//! ranking is left to the scorer.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::analytics::series;
use crate::analytics::stats::mean;
use crate::config::CorrelationConfig;
use crate::types::{present, Correlation, CorrelationKind, CorrelationStrength, WorkOrderRecord};

/// Runs the correlation detectors over a trailing window.
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
    window_days: i64,
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new(CorrelationConfig::default(), 30)
    }
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig, window_days: i64) -> Self {
        Self { config, window_days }
    }

    fn window<'a>(
        &self,
        records: &'a [WorkOrderRecord],
        now: DateTime<Utc>,
        filter: impl Fn(&WorkOrderRecord) -> bool,
    ) -> Option<Vec<&'a WorkOrderRecord>> {
        let window = series::window_records(records, self.window_days, now, filter);
        (window.len() >= self.config.min_records).then_some(window)
    }

    // ========================================================================
    // Composites
    // ========================================================================

    /// Supplier change, batch change and price jump for a material's cost.
    pub fn cost_correlations(
        &self,
        material_code: &str,
        records: &[WorkOrderRecord],
        inflection: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<Correlation> {
        let Some(window) = self.window(records, now, series::for_material(material_code)) else {
            return Vec::new();
        };
        [
            self.supplier_change(&window, inflection, now),
            self.batch_change(&window),
            self.price_jump(&window, now),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Supplier change and equipment skew for a material's scrap.
    pub fn quality_correlations(
        &self,
        material_code: &str,
        records: &[WorkOrderRecord],
        inflection: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<Correlation> {
        let Some(window) = self.window(records, now, series::for_material(material_code)) else {
            return Vec::new();
        };
        [
            self.supplier_change(&window, inflection, now),
            self.equipment_pattern(&window),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Usage intensity and shift skew for a machine.
    pub fn equipment_correlations(
        &self,
        equipment_id: &str,
        records: &[WorkOrderRecord],
        now: DateTime<Utc>,
    ) -> Vec<Correlation> {
        let Some(window) = self.window(records, now, series::for_equipment(equipment_id)) else {
            return Vec::new();
        };
        [self.usage_intensity(&window), self.shift_pattern(&window)]
            .into_iter()
            .flatten()
            .collect()
    }

    // ========================================================================
    // Detectors
    // ========================================================================

    /// Most recent supplier transition. High strength when it lands within
    /// `supplier_inflection_days` of the trend inflection.
    pub fn supplier_change(
        &self,
        window: &[&WorkOrderRecord],
        inflection: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Correlation> {
        let distinct: HashSet<&str> = window.iter().filter_map(|r| present(&r.supplier_id)).collect();
        if distinct.len() < 2 {
            return None;
        }

        let mut previous: Option<&str> = None;
        let mut last_change: Option<(&str, &str, DateTime<Utc>)> = None;
        for record in window {
            let current = present(&record.supplier_id);
            if let (Some(prev), Some(cur)) = (previous, current) {
                if prev != cur {
                    last_change = Some((prev, cur, record.timestamp));
                }
            }
            previous = current;
        }

        let (from, to, date) = last_change?;
        let near_inflection = inflection
            .map(|at| (date - at).num_days().abs() <= self.config.supplier_inflection_days)
            .unwrap_or(false);

        Some(Correlation {
            kind: CorrelationKind::SupplierChange,
            description: format!("Supplier changed from {from} to {to}"),
            strength: if near_inflection {
                CorrelationStrength::High
            } else {
                CorrelationStrength::Medium
            },
            date: Some(date),
            days_ago: Some((now - date).num_days()),
        })
    }

    pub fn batch_change(&self, window: &[&WorkOrderRecord]) -> Option<Correlation> {
        let lots: HashSet<&str> = window.iter().filter_map(|r| present(&r.material_lot)).collect();
        if lots.len() < 2 {
            return None;
        }
        Some(Correlation {
            kind: CorrelationKind::BatchChange,
            description: format!("Material batch changed - {} different batches in period", lots.len()),
            strength: CorrelationStrength::Medium,
            date: None,
            days_ago: None,
        })
    }

    /// First order-to-order cost step larger than `price_jump_pct`.
    pub fn price_jump(&self, window: &[&WorkOrderRecord], now: DateTime<Utc>) -> Option<Correlation> {
        let costs: Vec<(f64, DateTime<Utc>)> = window
            .iter()
            .filter_map(|r| r.actual_material_cost.filter(|c| *c > 0.0).map(|c| (c, r.timestamp)))
            .collect();

        costs.windows(2).find_map(|pair| {
            let (prev, _) = pair[0];
            let (cur, at) = pair[1];
            let change_pct = (cur - prev) / prev * 100.0;
            (change_pct.abs() > self.config.price_jump_pct).then(|| Correlation {
                kind: CorrelationKind::PriceJump,
                description: format!("Price jumped {change_pct:.1}% on single order"),
                strength: CorrelationStrength::High,
                date: Some(at),
                days_ago: Some((now - at).num_days()),
            })
        })
    }

    /// Worst versus best machine by average scrap rate.
    pub fn equipment_pattern(&self, window: &[&WorkOrderRecord]) -> Option<Correlation> {
        let mut rates: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in window {
            if let (Some(equipment), Some(rate)) = (present(&record.equipment_id), record.scrap_rate_pct()) {
                rates.entry(equipment).or_default().push(rate);
            }
        }
        if rates.len() < 2 {
            return None;
        }

        let averages: Vec<(&str, f64)> = rates.iter().map(|(eq, r)| (*eq, mean(r))).collect();
        let mut worst = averages[0];
        let mut best = averages[0];
        for &(eq, avg) in &averages[1..] {
            if avg > worst.1 {
                worst = (eq, avg);
            }
            if avg < best.1 {
                best = (eq, avg);
            }
        }

        (worst.1 > best.1 * self.config.equipment_scrap_ratio).then(|| Correlation {
            kind: CorrelationKind::EquipmentPattern,
            description: format!(
                "Equipment {} has {:.1}% scrap vs {:.1}% on {}",
                worst.0, worst.1, best.1, best.0
            ),
            strength: CorrelationStrength::High,
            date: None,
            days_ago: None,
        })
    }

    /// Average labor hours, first half of the window versus second half.
    /// Orders without hours count toward the half's length.
    pub fn usage_intensity(&self, window: &[&WorkOrderRecord]) -> Option<Correlation> {
        if window.len() < self.config.usage_min_records.max(2) {
            return None;
        }
        let (first, second) = window.split_at(window.len() / 2);
        let half_avg = |half: &[&WorkOrderRecord]| {
            half.iter().filter_map(|r| r.actual_labor_hours).sum::<f64>() / half.len() as f64
        };
        let first_avg = half_avg(first);
        let second_avg = half_avg(second);
        if first_avg <= 0.0 {
            return None;
        }

        let change_pct = (second_avg - first_avg) / first_avg * 100.0;
        (change_pct.abs() > self.config.usage_shift_pct).then(|| Correlation {
            kind: CorrelationKind::UsageIntensity,
            description: format!(
                "Equipment usage intensity {} by {:.1}%",
                if change_pct > 0.0 { "increased" } else { "decreased" },
                change_pct.abs()
            ),
            strength: CorrelationStrength::Medium,
            date: None,
            days_ago: None,
        })
    }

    pub fn shift_pattern(&self, window: &[&WorkOrderRecord]) -> Option<Correlation> {
        let mut by_shift: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in window {
            if let (Some(shift), Some(hours)) = (present(&record.shift_id), record.actual_labor_hours) {
                by_shift.entry(shift).or_default().push(hours);
            }
        }
        if by_shift.len() < 2 {
            return None;
        }

        let averages: Vec<f64> = by_shift.values().map(|h| mean(h)).collect();
        let max = averages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = averages.iter().copied().fold(f64::INFINITY, f64::min);

        (max > min * self.config.shift_spread_ratio).then(|| Correlation {
            kind: CorrelationKind::ShiftPattern,
            description: "Performance varies by shift - check training and procedures".to_string(),
            strength: CorrelationStrength::Medium,
            date: None,
            days_ago: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap()
    }

    fn order(i: usize, days_ago: i64) -> WorkOrderRecord {
        WorkOrderRecord {
            material_code: Some("MAT-A".to_string()),
            equipment_id: Some("M1".to_string()),
            ..WorkOrderRecord::new(format!("WO-PROD-{i}"), "F1", now() - Duration::days(days_ago))
        }
    }

    fn costed(costs: &[f64], suppliers: &[&str]) -> Vec<WorkOrderRecord> {
        costs
            .iter()
            .enumerate()
            .map(|(i, c)| WorkOrderRecord {
                actual_material_cost: Some(*c),
                supplier_id: Some(suppliers[i].to_string()),
                ..order(i, (costs.len() - i) as i64)
            })
            .collect()
    }

    #[test]
    fn test_detectors_need_min_records() {
        let analyzer = CorrelationAnalyzer::default();
        let records = costed(&[100.0, 200.0, 300.0, 400.0], &["A", "B", "A", "B"]);
        assert!(analyzer.cost_correlations("MAT-A", &records, None, now()).is_empty());
    }

    #[test]
    fn test_cost_correlations_in_discovery_order() {
        let analyzer = CorrelationAnalyzer::default();
        let mut records = costed(
            &[100.0, 100.0, 100.0, 135.0, 135.0],
            &["SUP-1", "SUP-1", "SUP-1", "SUP-2", "SUP-2"],
        );
        records[0].material_lot = Some("LOT-1".to_string());
        records[4].material_lot = Some("LOT-2".to_string());

        let found = analyzer.cost_correlations("MAT-A", &records, None, now());
        let kinds: Vec<_> = found.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CorrelationKind::SupplierChange,
                CorrelationKind::BatchChange,
                CorrelationKind::PriceJump
            ]
        );
        assert_eq!(found[0].description, "Supplier changed from SUP-1 to SUP-2");
        assert_eq!(found[0].strength, CorrelationStrength::Medium, "No inflection supplied");
        assert_eq!(found[0].days_ago, Some(2));
        assert_eq!(found[2].description, "Price jumped 35.0% on single order");
    }

    #[test]
    fn test_supplier_change_near_inflection_is_high() {
        let analyzer = CorrelationAnalyzer::default();
        let records = costed(
            &[100.0, 100.0, 100.0, 101.0, 101.0],
            &["SUP-1", "SUP-1", "SUP-1", "SUP-2", "SUP-2"],
        );
        let inflection = now() - Duration::days(4);
        let found = analyzer.cost_correlations("MAT-A", &records, Some(inflection), now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strength, CorrelationStrength::High);

        let far = now() - Duration::days(25);
        let found = analyzer.cost_correlations("MAT-A", &records, Some(far), now());
        assert_eq!(found[0].strength, CorrelationStrength::Medium);
    }

    #[test]
    fn test_equipment_pattern_names_both_machines() {
        let analyzer = CorrelationAnalyzer::default();
        let records: Vec<WorkOrderRecord> = (0..6)
            .map(|i| WorkOrderRecord {
                equipment_id: Some(if i % 2 == 0 { "M1" } else { "M2" }.to_string()),
                units_produced: Some(100),
                units_scrapped: Some(if i % 2 == 0 { 2 } else { 9 }),
                ..order(i, 6 - i as i64)
            })
            .collect();
        let found = analyzer.quality_correlations("MAT-A", &records, None, now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "Equipment M2 has 9.0% scrap vs 2.0% on M1");
        assert_eq!(found[0].strength, CorrelationStrength::High);
    }

    #[test]
    fn test_usage_intensity_needs_ten_orders() {
        let analyzer = CorrelationAnalyzer::default();
        let build = |n: usize| -> Vec<WorkOrderRecord> {
            (0..n)
                .map(|i| WorkOrderRecord {
                    actual_labor_hours: Some(if i < n / 2 { 10.0 } else { 15.0 }),
                    ..order(i, (n - i) as i64)
                })
                .collect()
        };
        assert!(analyzer.equipment_correlations("M1", &build(8), now()).is_empty());

        let found = analyzer.equipment_correlations("M1", &build(10), now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "Equipment usage intensity increased by 50.0%");
    }

    #[test]
    fn test_shift_pattern() {
        let analyzer = CorrelationAnalyzer::default();
        let records: Vec<WorkOrderRecord> = (0..6)
            .map(|i| WorkOrderRecord {
                shift_id: Some(if i % 2 == 0 { "day" } else { "night" }.to_string()),
                actual_labor_hours: Some(if i % 2 == 0 { 10.0 } else { 14.0 }),
                ..order(i, 6 - i as i64)
            })
            .collect();
        let found = analyzer.equipment_correlations("M1", &records, now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CorrelationKind::ShiftPattern);
    }

    #[test]
    fn test_missing_dimensions_fire_nothing() {
        let analyzer = CorrelationAnalyzer::default();
        let records: Vec<WorkOrderRecord> = (0..6).map(|i| order(i, 6 - i as i64)).collect();
        assert!(analyzer.cost_correlations("MAT-A", &records, None, now()).is_empty());
        assert!(analyzer.quality_correlations("MAT-A", &records, None, now()).is_empty());
        assert!(analyzer.equipment_correlations("M1", &records, now()).is_empty());
    }
}
