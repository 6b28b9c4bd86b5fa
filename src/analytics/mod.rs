//! Analytics Layer - statistical building blocks for the domain analyzers
//!
//! - [`stats`]: mean, population std, rounding and money formatting
//! - [`series`]: derive per-dimension time series from work-order records
//! - [`trend`]: divergence from a baseline and deviation narratives
//! - [`degradation`]: two-segment trend fit, inflection points, degradation and drift
//! - [`correlation`]: candidate causes for a detected shift
//!
//! Every detector takes its reference time as a parameter and holds only
//! immutable configuration, so a single instance can be shared across
//! concurrently running analyzers.

pub mod correlation;
pub mod degradation;
pub mod series;
pub mod stats;
pub mod trend;

pub use correlation::CorrelationAnalyzer;
pub use degradation::DriftDetector;
pub use trend::TrendDetector;
