//! Shared data structures for work-order operational intelligence
//!
//! This module defines the core types flowing through one analysis run:
//! - `WorkOrderRecord`: one manufacturing work order as read from the record store
//! - `MetricBaseline`: rolling per-facility statistics
//! - Trend types: time-series points, trend results, degradation/drift events, correlations
//! - Findings: per-analyzer result items (predictions, patterns, risks, opportunities)
//! - `Insight` / `Investigation`: the scored, tiered feed handed to consumers

mod record;
mod baseline;
mod trend;
mod findings;
mod insight;

pub use record::*;
pub use baseline::*;
pub use trend::*;
pub use findings::*;
pub use insight::*;
