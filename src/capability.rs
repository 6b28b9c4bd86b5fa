//! Capability gate - which analyzers a batch can support
//!
//! Each upload header is split into lower-case word tokens and assigned to
//! the one standard field whose synonym it contains as a contiguous token run.
//! The longest matching synonym wins, so "Planned Labor Hours" counts as
//! planned hours only. The highest tier whose requirements are met wins:
//!
//! | Tier | Name      | Requires                                         | Analyzers                 |
//! |------|-----------|--------------------------------------------------|---------------------------|
//! | 1    | Basic     | planned+actual material cost, or labor hours     | cost                      |
//! | 2    | Good      | material code                                    | cost                      |
//! | 3    | Excellent | equipment id, or scrap+rework quantity           | cost, equipment, quality  |
//! | 4    | Premium   | cycle time, start+completion, or op start+end    | all four                  |
//!
//! Tiers are checked independently from the top; nothing met still yields tier 1.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::AnalyzerKind;

/// Result of inspecting a batch's headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierReport {
    pub tier: u8,
    pub tier_name: String,
    pub capabilities: Vec<String>,
    pub available_analyzers: Vec<AnalyzerKind>,
    /// Display names of the columns that would unlock the next tier
    pub missing_for_next_tier: Vec<String>,
    /// Standard field -> found among the headers
    pub column_coverage: BTreeMap<String, bool>,
}

impl TierReport {
    /// Short operator-facing summary.
    pub fn feedback_message(&self) -> String {
        if self.tier >= 4 {
            return "Premium data detected: root cause analysis and process efficiency tracking enabled"
                .to_string();
        }
        let unlocked = self
            .capabilities
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let mut msg = format!("{} data tier - unlocking: {}", self.tier_name, unlocked);
        if !self.missing_for_next_tier.is_empty() {
            if let Some(next) = tier_spec(self.tier + 1) {
                msg.push_str(&format!(
                    ". To unlock {} tier insights, add: {}",
                    next.name,
                    self.missing_for_next_tier
                        .iter()
                        .take(2)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }
        msg
    }
}

/// Decides which analyzers apply to an upload.
pub trait CapabilityGate: Send + Sync {
    fn detect_tier(&self, headers: &[String]) -> TierReport;
}

// ============================================================================
// Header tier detector
// ============================================================================

struct TierSpec {
    level: u8,
    name: &'static str,
    required_all: &'static [&'static str],
    required_any: &'static [&'static [&'static str]],
    analyzers: &'static [AnalyzerKind],
    capabilities: &'static [&'static str],
}

const TIERS: [TierSpec; 4] = [
    TierSpec {
        level: 1,
        name: "Basic",
        required_all: &[],
        required_any: &[
            &["planned_material_cost", "actual_material_cost"],
            &["planned_labor_hours", "actual_labor_hours"],
        ],
        analyzers: &[AnalyzerKind::Cost],
        capabilities: &["Track cost variances", "Identify over-budget work orders"],
    },
    TierSpec {
        level: 2,
        name: "Good",
        required_all: &["material_code"],
        required_any: &[],
        analyzers: &[AnalyzerKind::Cost],
        capabilities: &[
            "Detect material cost patterns",
            "Identify supplier issues",
            "Track recurring variances",
        ],
    },
    TierSpec {
        level: 3,
        name: "Excellent",
        required_all: &[],
        required_any: &[&["equipment_id"], &["scrapped_quantity", "rework_quantity"]],
        analyzers: &[AnalyzerKind::Cost, AnalyzerKind::Equipment, AnalyzerKind::Quality],
        capabilities: &[
            "Predict equipment failures",
            "Detect quality degradation",
            "Forecast maintenance needs",
        ],
    },
    TierSpec {
        level: 4,
        name: "Premium",
        required_all: &[],
        required_any: &[
            &["cycle_time"],
            &["start_date", "completion_date"],
            &["operation_start_time", "operation_end_time"],
        ],
        analyzers: &AnalyzerKind::ALL,
        capabilities: &[
            "Root cause analysis",
            "Process efficiency tracking",
            "Time-based correlations",
            "Performance trending",
        ],
    },
];

/// Standard field -> lower-case header fragments that identify it.
const COLUMN_SYNONYMS: &[(&str, &[&str])] = &[
    ("planned_material_cost", &["planned material cost", "material budget", "est material cost", "planned mat cost"]),
    ("actual_material_cost", &["actual material cost", "material actual", "actual mat cost", "material cost"]),
    ("planned_labor_hours", &["planned labor hours", "labor budget hrs", "est labor hours", "planned hours"]),
    ("actual_labor_hours", &["actual labor hours", "labor actual hrs", "actual hours", "labor hours"]),
    ("material_code", &["material code", "material number", "material id", "part number", "mat code"]),
    ("supplier_id", &["supplier id", "supplier code", "supplier number", "vendor id", "vendor code"]),
    ("equipment_id", &["equipment id", "equipment code", "machine id", "asset id", "equipment number"]),
    ("scrapped_quantity", &["scrapped quantity", "scrap qty", "scrapped qty", "scrap", "scrap units"]),
    ("rework_quantity", &["rework quantity", "rework qty", "rework", "rework units"]),
    ("cycle_time", &["cycle time", "process time", "runtime", "cycle duration"]),
    ("start_date", &["start date", "start time", "begin date", "operation start"]),
    ("completion_date", &["completion date", "end date", "finish date", "operation end"]),
    ("operation_start_time", &["operation start time", "op start", "start timestamp"]),
    ("operation_end_time", &["operation end time", "op end", "end timestamp"]),
];

fn tier_spec(level: u8) -> Option<&'static TierSpec> {
    TIERS.iter().find(|t| t.level == level)
}

/// `"Scrap Qty (units)"` -> `["scrap", "qty", "units"]`
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Standard field named by a tokenized header, if any.
fn classify(header: &[String]) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for (field, patterns) in COLUMN_SYNONYMS {
        for pattern in patterns.iter() {
            let needle = tokens(pattern);
            if contains_run(header, &needle) && best.map_or(true, |(_, len)| needle.len() > len) {
                best = Some((*field, needle.len()));
            }
        }
    }
    best.map(|(field, _)| field)
}

/// `planned_material_cost` -> `Planned Material Cost`
fn display_name(field: &str) -> String {
    field
        .split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Header-driven [`CapabilityGate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTierDetector;

impl HeaderTierDetector {
    pub fn new() -> Self {
        Self
    }

    fn map_headers(headers: &[String]) -> BTreeMap<String, bool> {
        let mut coverage: BTreeMap<String, bool> = COLUMN_SYNONYMS
            .iter()
            .map(|(field, _)| ((*field).to_string(), false))
            .collect();
        for field in headers.iter().filter_map(|h| classify(&tokens(h))) {
            coverage.insert(field.to_string(), true);
        }
        coverage
    }

    fn has(coverage: &BTreeMap<String, bool>, field: &str) -> bool {
        coverage.get(field).copied().unwrap_or(false)
    }

    fn meets(spec: &TierSpec, coverage: &BTreeMap<String, bool>) -> bool {
        let all_ok = spec.required_all.iter().all(|f| Self::has(coverage, f));
        let any_ok = spec.required_any.is_empty()
            || spec
                .required_any
                .iter()
                .any(|group| group.iter().all(|f| Self::has(coverage, f)));
        all_ok && any_ok
    }

    fn missing(spec: &TierSpec, coverage: &BTreeMap<String, bool>) -> Vec<String> {
        let mut out: Vec<String> = spec
            .required_all
            .iter()
            .filter(|f| !Self::has(coverage, f))
            .map(|f| display_name(f))
            .collect();

        let any_met = spec
            .required_any
            .iter()
            .any(|group| group.iter().all(|f| Self::has(coverage, f)));
        if !any_met {
            // Suggest the first incomplete group
            if let Some(group) = spec.required_any.first() {
                out.extend(
                    group
                        .iter()
                        .filter(|f| !Self::has(coverage, f))
                        .map(|f| display_name(f)),
                );
            }
        }
        out
    }
}

impl CapabilityGate for HeaderTierDetector {
    fn detect_tier(&self, headers: &[String]) -> TierReport {
        let coverage = Self::map_headers(headers);

        let achieved = TIERS
            .iter()
            .rev()
            .find(|spec| Self::meets(spec, &coverage))
            .unwrap_or(&TIERS[0]);

        let missing_for_next_tier = tier_spec(achieved.level + 1)
            .map(|next| Self::missing(next, &coverage))
            .unwrap_or_default();

        debug!(
            tier = achieved.level,
            headers = headers.len(),
            missing = missing_for_next_tier.len(),
            "Data tier detected"
        );

        TierReport {
            tier: achieved.level,
            tier_name: achieved.name.to_string(),
            capabilities: achieved.capabilities.iter().map(|c| (*c).to_string()).collect(),
            available_analyzers: achieved.analyzers.to_vec(),
            missing_for_next_tier,
            column_coverage: coverage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_basic_cost_columns_are_tier_one() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "Work Order Number",
            "Planned Material Cost",
            "Actual Material Cost",
        ]));
        assert_eq!(report.tier, 1);
        assert_eq!(report.tier_name, "Basic");
        assert_eq!(report.available_analyzers, vec![AnalyzerKind::Cost]);
        assert_eq!(report.missing_for_next_tier, vec!["Material Code".to_string()]);
    }

    #[test]
    fn test_material_code_is_tier_two() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "Planned Material Cost",
            "Actual Material Cost",
            "Part Number",
            "Vendor ID",
        ]));
        assert_eq!(report.tier, 2);
        assert_eq!(report.missing_for_next_tier, vec!["Equipment Id".to_string()]);
    }

    #[test]
    fn test_equipment_unlocks_tier_three() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "planned_material_cost",
            "Material Code",
            " Machine ID ",
            "Scrap Qty",
        ]));
        assert_eq!(report.tier, 3);
        assert_eq!(
            report.available_analyzers,
            vec![AnalyzerKind::Cost, AnalyzerKind::Equipment, AnalyzerKind::Quality]
        );
        assert_eq!(report.missing_for_next_tier, vec!["Cycle Time".to_string()]);
    }

    #[test]
    fn test_timestamps_unlock_everything() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "Material Code",
            "Equipment ID",
            "Start Date",
            "Completion Date",
        ]));
        assert_eq!(report.tier, 4);
        assert_eq!(report.available_analyzers, AnalyzerKind::ALL.to_vec());
        assert!(report.missing_for_next_tier.is_empty());
        assert!(report.feedback_message().starts_with("Premium"));
    }

    #[test]
    fn test_unrecognized_headers_default_to_tier_one() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&["foo", "bar"]));
        assert_eq!(report.tier, 1);
        assert!(report.column_coverage.values().all(|found| !found));
        assert_eq!(
            report.missing_for_next_tier,
            vec!["Material Code".to_string()]
        );
        assert!(report.feedback_message().contains("To unlock Good tier"));
    }

    #[test]
    fn test_planned_columns_do_not_count_as_actuals() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "Planned Labor Hours",
            "Planned Material Cost",
        ]));
        let has = |f: &str| report.column_coverage[f];
        assert!(has("planned_labor_hours"));
        assert!(has("planned_material_cost"));
        assert!(!has("actual_labor_hours"));
        assert!(!has("actual_material_cost"));
    }

    #[test]
    fn test_whole_token_matching() {
        let report = HeaderTierDetector::new().detect_tier(&headers(&[
            "Material Cost",
            "actual_labor_hours",
            "Operation Start Time",
            "Scrapper Notes",
        ]));
        let has = |f: &str| report.column_coverage[f];
        assert!(has("actual_material_cost"));
        assert!(has("actual_labor_hours"));
        assert!(has("operation_start_time"));
        assert!(!has("start_date"), "Longest synonym claims the header");
        assert!(!has("scrapped_quantity"), "Scrapper is not scrap");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("planned_material_cost"), "Planned Material Cost");
    }
}
