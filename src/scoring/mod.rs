//! Insight extraction, scoring and tiering
//!
//! ```text
//! AnalyzerReport ──► extract_insights ──► InsightScorer::prioritize ──► PrioritizedFeed
//!                    (one Insight per       (score, dedup by id,         urgent / notable /
//!                     finding)               sort, tier)                  background
//! ```

mod extractor;
mod scorer;

pub use extractor::extract_insights;
pub use scorer::{InsightScorer, PrioritizedFeed};
