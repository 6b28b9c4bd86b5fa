//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Maintained by hand to match the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [facility]
        "facility",
        "facility.id",
        "facility.name",
        // [baseline]
        "baseline",
        "baseline.window_days",
        // [trend]
        "trend",
        "trend.window_days",
        "trend.min_points",
        "trend.significance_threshold",
        "trend.divergence_sigma",
        "trend.fallback_fraction",
        "trend.consecutive_points",
        "trend.inflection_window",
        "trend.degradation_threshold_multiple",
        "trend.multiplier_note_band",
        "trend.equipment_critical_pct",
        "trend.equipment_schedule_pct",
        "trend.schedule_horizon_days",
        "trend.cost_review_pct",
        "trend.cost_monitor_pct",
        "trend.quality_investigate_pp",
        // [correlation]
        "correlation",
        "correlation.min_records",
        "correlation.supplier_inflection_days",
        "correlation.price_jump_pct",
        "correlation.equipment_scrap_ratio",
        "correlation.usage_min_records",
        "correlation.usage_shift_pct",
        "correlation.shift_spread_ratio",
        // [scoring]
        "scoring",
        "scoring.financial_weight",
        "scoring.deviation_weight",
        "scoring.urgency_weight",
        "scoring.confidence_weight",
        "scoring.dollars_per_point",
        "scoring.default_confidence",
        "scoring.urgent_count",
        "scoring.notable_count",
        // [analysis]
        "analysis",
        "analysis.labor_rate_hourly",
        "analysis.scrap_cost_per_unit",
        // [analysis.cost]
        "analysis.cost",
        "analysis.cost.variance_threshold_pct",
        "analysis.cost.min_variance_amount",
        "analysis.cost.pattern_min_orders",
        "analysis.cost.max_predictions",
        "analysis.cost.max_confidence",
        "analysis.cost.high_risk_multiple",
        "analysis.cost.critical_risk_multiple",
        "analysis.cost.context_min_orders",
        "analysis.cost.excluded_suppliers",
        "analysis.cost.excluded_materials",
        // [analysis.equipment]
        "analysis.equipment",
        "analysis.equipment.min_orders",
        "analysis.equipment.base_risk",
        "analysis.equipment.max_risk",
        "analysis.equipment.labor_variance_hours",
        "analysis.equipment.quality_issue_share",
        "analysis.equipment.scrap_per_order",
        "analysis.equipment.degradation_risk_bonus",
        "analysis.equipment.min_impact",
        "analysis.equipment.quality_pattern_min_issues",
        "analysis.equipment.max_findings",
        "analysis.equipment.excluded_equipment",
        // [analysis.quality]
        "analysis.quality",
        "analysis.quality.min_orders",
        "analysis.quality.min_impact",
        "analysis.quality.min_issue_rate_pct",
        "analysis.quality.drift_amplify_pp",
        "analysis.quality.drift_impact_multiplier",
        "analysis.quality.pattern_min_issues",
        "analysis.quality.max_findings",
        // [analysis.efficiency]
        "analysis.efficiency",
        "analysis.efficiency.min_savings",
        "analysis.efficiency.min_score",
        "analysis.efficiency.max_efficiency_pct",
        "analysis.efficiency.rework_units_per_issue",
        "analysis.efficiency.max_opportunities",
        // [orchestrator]
        "orchestrator",
        "orchestrator.max_concurrent_analyzers",
        "orchestrator.run_budget_secs",
        "orchestrator.investigation_min_patterns",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        // Tie-break on the key so suggestions don't depend on hash order
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails on unknown keys; existing configs always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            let message = format!("Unknown config key '{key}'");
            ValidationWarning {
                field: key,
                message,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate plausibility ranges on a parsed `EngineConfig`.
///
/// Returns (errors, warnings): errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &super::EngineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let t = &config.trend;
    if t.fallback_fraction <= 0.0 || t.fallback_fraction >= 1.0 {
        errors.push(format!(
            "trend.fallback_fraction = {:.2} must be within (0, 1)",
            t.fallback_fraction
        ));
    }

    // Baselines older than a quarter rarely reflect current operations
    let window = config.baseline.window_days;
    if window > 90 {
        warnings.push(ValidationWarning {
            field: "baseline.window_days".to_string(),
            message: format!("baseline.window_days = {window} is longer than the typical 7-90 days"),
            suggestion: None,
        });
    }

    let rate = config.analysis.labor_rate_hourly;
    if rate > 0.0 && !(10.0..=1000.0).contains(&rate) {
        warnings.push(ValidationWarning {
            field: "analysis.labor_rate_hourly".to_string(),
            message: format!("analysis.labor_rate_hourly = {rate:.2} is outside typical range (10-1000)"),
            suggestion: None,
        });
    }

    let pct = config.analysis.cost.variance_threshold_pct;
    if pct > 100.0 {
        warnings.push(ValidationWarning {
            field: "analysis.cost.variance_threshold_pct".to_string(),
            message: format!(
                "analysis.cost.variance_threshold_pct = {pct:.1} exceeds 100%, almost no order will be significant"
            ),
            suggestion: None,
        });
    }

    if config.scoring.urgent_count + config.scoring.notable_count > 100 {
        warnings.push(ValidationWarning {
            field: "scoring.notable_count".to_string(),
            message: "more than 100 insights in the urgent and notable tiers combined".to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
