#![deny(missing_docs)]
#![doc = "Formation-energy convex hulls and stability judgments for CAMD campaigns."]

/// Stability analyzer, judgments and hull records.
pub mod analyzer;
/// Lower convex hull over a single chemical system.
pub mod hull;
mod lp;

pub use analyzer::{
    hull_entries, Analysis, AnalyzerConfig, CandidateScore, HullEntry, HullRecord,
    StabilityAnalysis, StabilityAnalyzer, StabilityJudgment,
};
pub use hull::{distance_from_margin, HullPoint, LowerHull, ON_HULL_TOLERANCE};
