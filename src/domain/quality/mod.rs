//! Conversion quality domain - structural predicates and heuristic scoring

pub mod predicates;
mod report;
mod scorer;

pub use report::{QualityReport, QualityTier, StructureElements};
pub use scorer::{QualityScorer, ScoreBreakdown};
