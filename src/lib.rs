//! plant-insight: Adaptive Analytics & Insight Prioritization for manufacturing work orders
//!
//! Turns uploaded work-order batches into a ranked feed of findings.
//!
//! ## Architecture
//!
//! - **Baseline Store**: rolling per-facility mean/std per material, operation and machine
//! - **Analytics**: trend start detection, degradation/drift trends, correlation detectors
//! - **Domain Analyzers**: cost, equipment, quality and efficiency
//! - **Scoring**: one priority scale across analyzers, urgent/notable/background tiers
//! - **Orchestrator**: runs a batch end to end and groups related findings into investigations

pub mod config;
pub mod types;
pub mod storage;
pub mod baseline;
pub mod analytics;
pub mod analyzers;
pub mod scoring;
pub mod narrative;
pub mod capability;
pub mod orchestrator;

// Re-export engine configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    AnalyzerKind, Insight, InsightPayload, InsightType, Investigation, MetricBaseline, MetricType,
    PriorityLevel, TrendStatus, WorkOrderRecord,
};

// Re-export the run surface
pub use orchestrator::{AnalysisEngine, AnalysisRequest, AnalysisRun, AnalyzerSummary, EngineError};
pub use scoring::{InsightScorer, PrioritizedFeed};

// Re-export persistence
pub use baseline::{
    BaselineError, BaselineRepository, BaselineStore, InMemoryBaselineRepository,
    SledBaselineRepository,
};
pub use storage::{InMemoryRecordStore, RecordQuery, RecordStore, StoreError};
