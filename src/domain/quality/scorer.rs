//! Heuristic conversion quality scoring
//!
//! The score is a proxy, not a ground-truth comparison: four additive,
//! individually capped components summing to at most 100.

use super::predicates::{self, SymbolClass};
use super::report::{QualityReport, QualityTier, StructureElements};

const LENGTH_RATIO_POINTS: f64 = 30.0;
const HEADING_POINTS: f64 = 10.0;
const MATH_BLOCK_POINTS: f64 = 15.0;
const TABLE_POINTS: f64 = 8.0;
const LIST_POINTS: f64 = 7.0;
const SYMBOL_CLASS_POINTS: f64 = 5.0;
const PARAGRAPH_POINTS: f64 = 10.0;

/// Per-component contribution to the final score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// 0..=30
    pub length_ratio: f64,
    /// 0..=40
    pub structure: f64,
    /// 0..=20
    pub math_fidelity: f64,
    /// 0 or 10
    pub paragraphs: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.length_ratio + self.structure + self.math_fidelity + self.paragraphs;
        sum.round().clamp(0.0, 100.0) as u8
    }
}

/// Estimates how complete a produced Markdown document is
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, source_sample: &str, markdown: &str) -> QualityReport {
        let score = self.breakdown(source_sample, markdown).total();

        QualityReport {
            completeness_percent: score,
            structure_elements: structure_elements(markdown),
            quality_tier: QualityTier::from_score(score),
        }
    }

    pub fn breakdown(&self, source_sample: &str, markdown: &str) -> ScoreBreakdown {
        ScoreBreakdown {
            length_ratio: length_ratio_component(source_sample, markdown),
            structure: structure_component(markdown),
            math_fidelity: math_fidelity_component(source_sample, markdown),
            paragraphs: paragraph_component(markdown),
        }
    }
}

fn length_ratio_component(source_sample: &str, markdown: &str) -> f64 {
    let source_len = source_sample.chars().count().max(1) as f64;
    let markdown_len = markdown.chars().count() as f64;

    (markdown_len / source_len).min(1.0) * LENGTH_RATIO_POINTS
}

fn structure_component(markdown: &str) -> f64 {
    let mut points = 0.0;

    if predicates::has_heading(markdown) {
        points += HEADING_POINTS;
    }
    if predicates::has_math_block(markdown) {
        points += MATH_BLOCK_POINTS;
    }
    if predicates::has_table_row(markdown) {
        points += TABLE_POINTS;
    }
    if predicates::has_list_item(markdown) {
        points += LIST_POINTS;
    }

    points
}

/// Classes absent from the source contribute nothing and are not held
/// against the markdown.
fn math_fidelity_component(source_sample: &str, markdown: &str) -> f64 {
    SymbolClass::ALL
        .iter()
        .map(|class| {
            let in_source = class.count(source_sample);

            if in_source == 0 {
                return 0.0;
            }

            let in_markdown = class.count(markdown) as f64;
            SYMBOL_CLASS_POINTS * (in_markdown / in_source as f64).min(1.0)
        })
        .sum()
}

fn paragraph_component(markdown: &str) -> f64 {
    if predicates::has_paragraph_break(markdown) {
        PARAGRAPH_POINTS
    } else {
        0.0
    }
}

fn structure_elements(markdown: &str) -> StructureElements {
    StructureElements {
        headings: predicates::count_headings(markdown),
        paragraphs: predicates::count_paragraphs(markdown),
        tables: predicates::count_tables(markdown),
        lists: predicates::count_list_items(markdown),
        math_blocks: predicates::count_math_blocks(markdown),
    }
}
