//! System-wide default constants.
//!
//! Values here are not operator-tunable; everything a site may want to adjust
//! lives in [`super::EngineConfig`].

// ============================================================================
// Configuration discovery
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PLANT_INSIGHT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "insight_config.toml";

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier used for labor-hour baselines when a record has no operation type.
pub const GENERAL_OPERATION: &str = "general";

/// Identifier used when a work order number carries no type segment.
pub const UNKNOWN_OPERATION: &str = "UNKNOWN";

// ============================================================================
// Orchestrator
// ============================================================================

/// Upper bound on correlation hints attached to one insight narrative.
pub const MAX_NARRATIVE_CORRELATIONS: usize = 3;

/// Tolerance used when checking that scoring weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.05;
