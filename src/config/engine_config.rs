//! Engine Configuration - every analysis heuristic as an operator-tunable TOML value
//!
//! Each struct implements `Default` with the documented constants, so a run
//! without a config file behaves exactly as described in the crate docs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, LOCAL_CONFIG_FILE, WEIGHT_SUM_TOLERANCE};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an engine deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$PLANT_INSIGHT_CONFIG` env var
/// 2. `./insight_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Facility identification
    #[serde(default)]
    pub facility: FacilityInfo,

    /// Rolling baseline window
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Trend, degradation and drift detection
    #[serde(default)]
    pub trend: TrendConfig,

    /// Correlation detectors
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Priority scoring and tiering
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Domain analyzer heuristics
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Run scheduling
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PLANT_INSIGHT_CONFIG` environment variable
    /// 2. `./insight_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), facility = %config.facility.name, "Loaded engine config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(facility = %config.facility.name, "Loaded engine config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys only produce warnings; out-of-range values are errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in &super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Validate all heuristics for internal consistency.
    ///
    /// Rules:
    /// - Scoring weights must sum to approximately 1.0
    /// - Values used as divisors must be positive
    /// - Escalating thresholds must be ordered
    /// - Counts that gate detection must be large enough to be meaningful
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Scoring
        let s = &self.scoring;
        let weights = [
            ("financial_weight", s.financial_weight),
            ("deviation_weight", s.deviation_weight),
            ("urgency_weight", s.urgency_weight),
            ("confidence_weight", s.confidence_weight),
        ];
        for (name, w) in weights {
            if w < 0.0 {
                errors.push(format!("scoring.{name} must be >= 0, got {w:.2}"));
            }
        }
        let weight_sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("scoring weights must sum to ~1.0, got {weight_sum:.2}"));
        }
        if s.dollars_per_point <= 0.0 {
            errors.push("scoring.dollars_per_point must be > 0 (used as divisor)".to_string());
        }
        if !(0.0..=1.0).contains(&s.default_confidence) {
            errors.push(format!(
                "scoring.default_confidence ({:.2}) must be within 0-1",
                s.default_confidence
            ));
        }
        if s.urgent_count == 0 {
            errors.push("scoring.urgent_count must be > 0".to_string());
        }

        // Baseline
        if self.baseline.window_days <= 0 {
            errors.push("baseline.window_days must be > 0".to_string());
        }

        // Trend
        let t = &self.trend;
        if t.window_days <= 0 {
            errors.push("trend.window_days must be > 0".to_string());
        }
        if t.consecutive_points == 0 {
            errors.push("trend.consecutive_points must be > 0".to_string());
        }
        if t.min_points < 3 {
            errors.push(format!("trend.min_points must be >= 3, got {}", t.min_points));
        }
        if t.significance_threshold <= 0.0 {
            errors.push("trend.significance_threshold must be > 0".to_string());
        }
        if t.divergence_sigma <= 0.0 {
            errors.push("trend.divergence_sigma must be > 0".to_string());
        }
        if t.inflection_window == 0 {
            errors.push("trend.inflection_window must be > 0".to_string());
        }
        if t.degradation_threshold_multiple <= 1.0 {
            errors.push("trend.degradation_threshold_multiple must be > 1".to_string());
        }
        Self::check_escalation(
            t.equipment_schedule_pct,
            t.equipment_critical_pct,
            "trend.equipment_degradation",
            &mut errors,
        );
        Self::check_escalation(
            t.cost_monitor_pct,
            t.cost_review_pct,
            "trend.cost_change",
            &mut errors,
        );

        // Correlation
        let c = &self.correlation;
        if c.min_records < 2 {
            errors.push("correlation.min_records must be >= 2".to_string());
        }
        if c.equipment_scrap_ratio <= 1.0 {
            errors.push("correlation.equipment_scrap_ratio must be > 1".to_string());
        }
        if c.shift_spread_ratio <= 1.0 {
            errors.push("correlation.shift_spread_ratio must be > 1".to_string());
        }

        // Analysis
        let a = &self.analysis;
        if a.labor_rate_hourly < 0.0 {
            errors.push("analysis.labor_rate_hourly cannot be negative".to_string());
        }
        if a.scrap_cost_per_unit < 0.0 {
            errors.push("analysis.scrap_cost_per_unit cannot be negative".to_string());
        }
        if a.cost.pattern_min_orders == 0 {
            errors.push("analysis.cost.pattern_min_orders must be > 0".to_string());
        }
        if a.cost.max_predictions == 0 {
            errors.push("analysis.cost.max_predictions must be > 0".to_string());
        }
        if a.cost.max_confidence <= 0.0 || a.cost.max_confidence > 1.0 {
            errors.push(format!(
                "analysis.cost.max_confidence ({:.2}) must be within (0, 1]",
                a.cost.max_confidence
            ));
        }
        Self::check_escalation(
            a.cost.high_risk_multiple,
            a.cost.critical_risk_multiple,
            "analysis.cost.risk_multiple",
            &mut errors,
        );
        if a.equipment.min_orders < 2 {
            errors.push("analysis.equipment.min_orders must be >= 2".to_string());
        }
        if a.quality.min_orders < 2 {
            errors.push("analysis.quality.min_orders must be >= 2".to_string());
        }
        if a.efficiency.max_opportunities == 0 {
            errors.push("analysis.efficiency.max_opportunities must be > 0".to_string());
        }

        // Orchestrator
        let o = &self.orchestrator;
        if o.max_concurrent_analyzers == 0 {
            errors.push("orchestrator.max_concurrent_analyzers must be > 0".to_string());
        }
        if o.run_budget_secs == 0 {
            errors.push("orchestrator.run_budget_secs must be > 0".to_string());
        }
        if o.investigation_min_patterns < 2 {
            errors.push("orchestrator.investigation_min_patterns must be >= 2".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any value (sweep all f64 fields via serialization)
        if let Ok(value) = toml::Value::try_from(self) {
            if has_non_finite(&value) {
                errors.push("Config contains NaN or Inf values, all thresholds must be finite numbers".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(lower: f64, upper: f64, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !lower.is_finite() || !upper.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got lower={lower}, upper={upper})"
            ));
            return;
        }
        if upper < lower {
            errors.push(format!(
                "{name}: upper tier ({upper:.3}) must be >= lower tier ({lower:.3})"
            ));
        }
    }
}

fn has_non_finite(value: &toml::Value) -> bool {
    match value {
        toml::Value::Float(f) => !f.is_finite(),
        toml::Value::Array(items) => items.iter().any(has_non_finite),
        toml::Value::Table(table) => table.values().any(has_non_finite),
        _ => false,
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Facility Info
// ============================================================================

/// Identification metadata, used for logs and as the CLI's default facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityInfo {
    /// Facility identifier used to scope records and baselines
    #[serde(default = "default_facility_id")]
    pub id: String,

    /// Display name
    #[serde(default = "default_facility_name")]
    pub name: String,
}

fn default_facility_id() -> String {
    "default".to_string()
}
fn default_facility_name() -> String {
    "DEFAULT".to_string()
}

impl Default for FacilityInfo {
    fn default() -> Self {
        Self {
            id: default_facility_id(),
            name: default_facility_name(),
        }
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// Rolling baseline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Trailing window of records folded into each baseline
    #[serde(default = "default_baseline_window_days")]
    pub window_days: i64,
}

fn default_baseline_window_days() -> i64 {
    30
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: default_baseline_window_days(),
        }
    }
}

// ============================================================================
// Trend / Degradation / Drift
// ============================================================================

/// Thresholds shared by the trend, degradation and drift detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Lookback for degradation and drift series
    #[serde(default = "default_trend_window_days")]
    pub window_days: i64,

    /// Minimum points before a degradation/drift trend may be reported
    #[serde(default = "default_min_points")]
    pub min_points: usize,

    /// |recent - early| / early must exceed this
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,

    /// Divergence threshold in baseline standard deviations
    #[serde(default = "default_divergence_sigma")]
    pub divergence_sigma: f64,

    /// Divergence threshold as a fraction of the average when std is zero
    #[serde(default = "default_fallback_fraction")]
    pub fallback_fraction: f64,

    /// Consecutive divergent points required to call a trend start
    #[serde(default = "default_consecutive_points")]
    pub consecutive_points: usize,

    /// Moving-average window for inflection detection
    #[serde(default = "default_inflection_window")]
    pub inflection_window: usize,

    /// Degradation failure threshold as a multiple of the early average
    #[serde(default = "default_degradation_threshold_multiple")]
    pub degradation_threshold_multiple: f64,

    /// Comparative text adds the multiplier when |multiplier - 1| exceeds this
    #[serde(default = "default_multiplier_note_band")]
    pub multiplier_note_band: f64,

    #[serde(default = "default_equipment_critical_pct")]
    pub equipment_critical_pct: f64,

    #[serde(default = "default_equipment_schedule_pct")]
    pub equipment_schedule_pct: f64,

    /// Projected days below which maintenance gets a concrete deadline
    #[serde(default = "default_schedule_horizon_days")]
    pub schedule_horizon_days: i64,

    #[serde(default = "default_cost_review_pct")]
    pub cost_review_pct: f64,

    #[serde(default = "default_cost_monitor_pct")]
    pub cost_monitor_pct: f64,

    /// Scrap drift (percentage points) that warrants a root-cause investigation
    #[serde(default = "default_quality_investigate_pp")]
    pub quality_investigate_pp: f64,
}

fn default_trend_window_days() -> i64 {
    30
}
fn default_min_points() -> usize {
    5
}
fn default_significance_threshold() -> f64 {
    0.3
}
fn default_divergence_sigma() -> f64 {
    2.0
}
fn default_fallback_fraction() -> f64 {
    0.2
}
fn default_consecutive_points() -> usize {
    3
}
fn default_inflection_window() -> usize {
    3
}
fn default_degradation_threshold_multiple() -> f64 {
    2.0
}
fn default_multiplier_note_band() -> f64 {
    0.3
}
fn default_equipment_critical_pct() -> f64 {
    30.0
}
fn default_equipment_schedule_pct() -> f64 {
    15.0
}
fn default_schedule_horizon_days() -> i64 {
    14
}
fn default_cost_review_pct() -> f64 {
    20.0
}
fn default_cost_monitor_pct() -> f64 {
    10.0
}
fn default_quality_investigate_pp() -> f64 {
    5.0
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: default_trend_window_days(),
            min_points: default_min_points(),
            significance_threshold: default_significance_threshold(),
            divergence_sigma: default_divergence_sigma(),
            fallback_fraction: default_fallback_fraction(),
            consecutive_points: default_consecutive_points(),
            inflection_window: default_inflection_window(),
            degradation_threshold_multiple: default_degradation_threshold_multiple(),
            multiplier_note_band: default_multiplier_note_band(),
            equipment_critical_pct: default_equipment_critical_pct(),
            equipment_schedule_pct: default_equipment_schedule_pct(),
            schedule_horizon_days: default_schedule_horizon_days(),
            cost_review_pct: default_cost_review_pct(),
            cost_monitor_pct: default_cost_monitor_pct(),
            quality_investigate_pp: default_quality_investigate_pp(),
        }
    }
}

// ============================================================================
// Correlation
// ============================================================================

/// Correlation detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Records required before any detector runs
    #[serde(default = "default_correlation_min_records")]
    pub min_records: usize,

    /// A supplier change this close to an inflection is a strong correlation
    #[serde(default = "default_supplier_inflection_days")]
    pub supplier_inflection_days: i64,

    /// Single-step cost change (percent) reported as a price jump
    #[serde(default = "default_price_jump_pct")]
    pub price_jump_pct: f64,

    /// Worst/best equipment scrap-rate ratio reported as an equipment pattern
    #[serde(default = "default_equipment_scrap_ratio")]
    pub equipment_scrap_ratio: f64,

    /// Records required before usage intensity is compared
    #[serde(default = "default_usage_min_records")]
    pub usage_min_records: usize,

    /// Change (percent) in mean labor hours between halves of the window
    #[serde(default = "default_usage_shift_pct")]
    pub usage_shift_pct: f64,

    /// Slowest/fastest shift ratio reported as a shift pattern
    #[serde(default = "default_shift_spread_ratio")]
    pub shift_spread_ratio: f64,
}

fn default_correlation_min_records() -> usize {
    5
}
fn default_supplier_inflection_days() -> i64 {
    5
}
fn default_price_jump_pct() -> f64 {
    20.0
}
fn default_equipment_scrap_ratio() -> f64 {
    2.0
}
fn default_usage_min_records() -> usize {
    10
}
fn default_usage_shift_pct() -> f64 {
    20.0
}
fn default_shift_spread_ratio() -> f64 {
    1.3
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_records: default_correlation_min_records(),
            supplier_inflection_days: default_supplier_inflection_days(),
            price_jump_pct: default_price_jump_pct(),
            equipment_scrap_ratio: default_equipment_scrap_ratio(),
            usage_min_records: default_usage_min_records(),
            usage_shift_pct: default_usage_shift_pct(),
            shift_spread_ratio: default_shift_spread_ratio(),
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Priority score weights and tier sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_financial_weight")]
    pub financial_weight: f64,

    #[serde(default = "default_deviation_weight")]
    pub deviation_weight: f64,

    #[serde(default = "default_urgency_weight")]
    pub urgency_weight: f64,

    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,

    /// Dollars of impact per financial score point
    #[serde(default = "default_dollars_per_point")]
    pub dollars_per_point: f64,

    /// Confidence assumed when an analyzer reports none (0-1)
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,

    #[serde(default = "default_urgent_count")]
    pub urgent_count: usize,

    #[serde(default = "default_notable_count")]
    pub notable_count: usize,
}

fn default_financial_weight() -> f64 {
    0.4
}
fn default_deviation_weight() -> f64 {
    0.3
}
fn default_urgency_weight() -> f64 {
    0.2
}
fn default_confidence_weight() -> f64 {
    0.1
}
fn default_dollars_per_point() -> f64 {
    100.0
}
fn default_confidence() -> f64 {
    0.7
}
fn default_urgent_count() -> usize {
    5
}
fn default_notable_count() -> usize {
    10
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            financial_weight: default_financial_weight(),
            deviation_weight: default_deviation_weight(),
            urgency_weight: default_urgency_weight(),
            confidence_weight: default_confidence_weight(),
            dollars_per_point: default_dollars_per_point(),
            default_confidence: default_confidence(),
            urgent_count: default_urgent_count(),
            notable_count: default_notable_count(),
        }
    }
}

// ============================================================================
// Analysis (domain analyzers)
// ============================================================================

/// Heuristics for the four domain analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Loaded labor rate used to cost labor-hour variances
    #[serde(default = "default_labor_rate_hourly")]
    pub labor_rate_hourly: f64,

    /// Cost attributed to each scrapped unit
    #[serde(default = "default_scrap_cost_per_unit")]
    pub scrap_cost_per_unit: f64,

    #[serde(default)]
    pub cost: CostAnalysisConfig,

    #[serde(default)]
    pub equipment: EquipmentAnalysisConfig,

    #[serde(default)]
    pub quality: QualityAnalysisConfig,

    #[serde(default)]
    pub efficiency: EfficiencyAnalysisConfig,
}

fn default_labor_rate_hourly() -> f64 {
    200.0
}
fn default_scrap_cost_per_unit() -> f64 {
    75.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            labor_rate_hourly: default_labor_rate_hourly(),
            scrap_cost_per_unit: default_scrap_cost_per_unit(),
            cost: CostAnalysisConfig::default(),
            equipment: EquipmentAnalysisConfig::default(),
            quality: QualityAnalysisConfig::default(),
            efficiency: EfficiencyAnalysisConfig::default(),
        }
    }
}

/// Cost variance analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAnalysisConfig {
    /// Significance threshold as a percentage of the average planned cost
    #[serde(default = "default_variance_threshold_pct")]
    pub variance_threshold_pct: f64,

    /// Floor for the significance threshold (dollars)
    #[serde(default = "default_min_variance_amount")]
    pub min_variance_amount: f64,

    /// Orders needed before a material or supplier grouping is a pattern
    #[serde(default = "default_pattern_min_orders")]
    pub pattern_min_orders: usize,

    #[serde(default = "default_max_predictions")]
    pub max_predictions: usize,

    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    #[serde(default = "default_high_risk_multiple")]
    pub high_risk_multiple: f64,

    #[serde(default = "default_critical_risk_multiple")]
    pub critical_risk_multiple: f64,

    /// Similar orders needed before variance context is reported
    #[serde(default = "default_context_min_orders")]
    pub context_min_orders: usize,

    #[serde(default)]
    pub excluded_suppliers: Vec<String>,

    #[serde(default)]
    pub excluded_materials: Vec<String>,
}

fn default_variance_threshold_pct() -> f64 {
    15.0
}
fn default_min_variance_amount() -> f64 {
    1000.0
}
fn default_pattern_min_orders() -> usize {
    3
}
fn default_max_predictions() -> usize {
    20
}
fn default_max_confidence() -> f64 {
    0.92
}
fn default_high_risk_multiple() -> f64 {
    2.0
}
fn default_critical_risk_multiple() -> f64 {
    5.0
}
fn default_context_min_orders() -> usize {
    5
}

impl Default for CostAnalysisConfig {
    fn default() -> Self {
        Self {
            variance_threshold_pct: default_variance_threshold_pct(),
            min_variance_amount: default_min_variance_amount(),
            pattern_min_orders: default_pattern_min_orders(),
            max_predictions: default_max_predictions(),
            max_confidence: default_max_confidence(),
            high_risk_multiple: default_high_risk_multiple(),
            critical_risk_multiple: default_critical_risk_multiple(),
            context_min_orders: default_context_min_orders(),
            excluded_suppliers: Vec::new(),
            excluded_materials: Vec::new(),
        }
    }
}

/// Equipment risk analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentAnalysisConfig {
    #[serde(default = "default_equipment_min_orders")]
    pub min_orders: usize,

    #[serde(default = "default_base_risk")]
    pub base_risk: f64,

    #[serde(default = "default_max_risk")]
    pub max_risk: f64,

    /// Average labor overrun (hours) that adds labor risk
    #[serde(default = "default_labor_variance_hours")]
    pub labor_variance_hours: f64,

    /// Share of orders with quality issues that adds quality risk
    #[serde(default = "default_quality_issue_share")]
    pub quality_issue_share: f64,

    /// Scrapped units per order that adds scrap risk
    #[serde(default = "default_scrap_per_order")]
    pub scrap_per_order: f64,

    /// Risk added when the machine is degrading
    #[serde(default = "default_degradation_risk_bonus")]
    pub degradation_risk_bonus: f64,

    /// Minimum estimated cost before a non-degrading machine is reported
    #[serde(default = "default_equipment_min_impact")]
    pub min_impact: f64,

    /// Quality-issue count that marks a machine quality pattern
    #[serde(default = "default_quality_pattern_min_issues")]
    pub quality_pattern_min_issues: usize,

    #[serde(default = "default_max_findings")]
    pub max_findings: usize,

    #[serde(default)]
    pub excluded_equipment: Vec<String>,
}

fn default_equipment_min_orders() -> usize {
    2
}
fn default_base_risk() -> f64 {
    40.0
}
fn default_max_risk() -> f64 {
    95.0
}
fn default_labor_variance_hours() -> f64 {
    5.0
}
fn default_quality_issue_share() -> f64 {
    0.3
}
fn default_scrap_per_order() -> f64 {
    3.0
}
fn default_degradation_risk_bonus() -> f64 {
    15.0
}
fn default_equipment_min_impact() -> f64 {
    500.0
}
fn default_quality_pattern_min_issues() -> usize {
    3
}
fn default_max_findings() -> usize {
    10
}

impl Default for EquipmentAnalysisConfig {
    fn default() -> Self {
        Self {
            min_orders: default_equipment_min_orders(),
            base_risk: default_base_risk(),
            max_risk: default_max_risk(),
            labor_variance_hours: default_labor_variance_hours(),
            quality_issue_share: default_quality_issue_share(),
            scrap_per_order: default_scrap_per_order(),
            degradation_risk_bonus: default_degradation_risk_bonus(),
            min_impact: default_equipment_min_impact(),
            quality_pattern_min_issues: default_quality_pattern_min_issues(),
            max_findings: default_max_findings(),
            excluded_equipment: Vec::new(),
        }
    }
}

/// Quality analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAnalysisConfig {
    #[serde(default = "default_quality_min_orders")]
    pub min_orders: usize,

    /// Minimum estimated cost before a material is reported
    #[serde(default = "default_quality_min_impact")]
    pub min_impact: f64,

    /// Quality-issue rate (percent) reported regardless of cost
    #[serde(default = "default_min_issue_rate_pct")]
    pub min_issue_rate_pct: f64,

    /// Drift (percentage points) above which impact is amplified
    #[serde(default = "default_drift_amplify_pp")]
    pub drift_amplify_pp: f64,

    #[serde(default = "default_drift_impact_multiplier")]
    pub drift_impact_multiplier: f64,

    /// Quality-issue count that marks a material quality pattern
    #[serde(default = "default_quality_pattern_min_issues")]
    pub pattern_min_issues: usize,

    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
}

fn default_quality_min_orders() -> usize {
    2
}
fn default_quality_min_impact() -> f64 {
    500.0
}
fn default_min_issue_rate_pct() -> f64 {
    10.0
}
fn default_drift_amplify_pp() -> f64 {
    5.0
}
fn default_drift_impact_multiplier() -> f64 {
    1.5
}

impl Default for QualityAnalysisConfig {
    fn default() -> Self {
        Self {
            min_orders: default_quality_min_orders(),
            min_impact: default_quality_min_impact(),
            min_issue_rate_pct: default_min_issue_rate_pct(),
            drift_amplify_pp: default_drift_amplify_pp(),
            drift_impact_multiplier: default_drift_impact_multiplier(),
            pattern_min_issues: default_quality_pattern_min_issues(),
            max_findings: default_max_findings(),
        }
    }
}

/// Efficiency analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyAnalysisConfig {
    /// Savings (dollars) that make an operation an opportunity
    #[serde(default = "default_min_savings")]
    pub min_savings: f64,

    /// Efficiency score below which an operation is an opportunity
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Upper clamp for labor and cost efficiency percentages
    #[serde(default = "default_max_efficiency_pct")]
    pub max_efficiency_pct: f64,

    /// Scrapped units assumed per quality-issue order when costing rework
    #[serde(default = "default_rework_units_per_issue")]
    pub rework_units_per_issue: f64,

    #[serde(default = "default_max_opportunities")]
    pub max_opportunities: usize,
}

fn default_min_savings() -> f64 {
    1000.0
}
fn default_min_score() -> f64 {
    85.0
}
fn default_max_efficiency_pct() -> f64 {
    150.0
}
fn default_rework_units_per_issue() -> f64 {
    5.0
}
fn default_max_opportunities() -> usize {
    3
}

impl Default for EfficiencyAnalysisConfig {
    fn default() -> Self {
        Self {
            min_savings: default_min_savings(),
            min_score: default_min_score(),
            max_efficiency_pct: default_max_efficiency_pct(),
            rework_units_per_issue: default_rework_units_per_issue(),
            max_opportunities: default_max_opportunities(),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Run scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Analyzers allowed to run at once
    #[serde(default = "default_max_concurrent_analyzers")]
    pub max_concurrent_analyzers: usize,

    /// Wall-clock budget for the analyzer phase (seconds)
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,

    /// Cost patterns needed before they are grouped into an investigation
    #[serde(default = "default_investigation_min_patterns")]
    pub investigation_min_patterns: usize,
}

fn default_max_concurrent_analyzers() -> usize {
    4
}
fn default_run_budget_secs() -> u64 {
    60
}
fn default_investigation_min_patterns() -> usize {
    2
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_analyzers: default_max_concurrent_analyzers(),
            run_budget_secs: default_run_budget_secs(),
            investigation_min_patterns: default_investigation_min_patterns(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
