//! Structural detectors over Markdown text
//!
//! Each detector is a standalone pure function so it can be tested (and
//! tuned) in isolation from the scoring weights.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+\S").unwrap());

static RE_MATH_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\$\$.+?\$\$|\\\[.+?\\\]|\\begin\{(?:equation|align|gather|multline)\*?\}.+?\\end\{(?:equation|align|gather|multline)\*?\}",
    )
    .unwrap()
});

static RE_INLINE_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^$\\])\$[^$\n]+\$").unwrap());

static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*\|.*\|[ \t]*$").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:[-*+]|\d+[.)])[ \t]+\S").unwrap());

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)|<img\b").unwrap());

static RE_MATH_GLYPHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[∑∫∬∮∏√∞≡∝∈∉⊂⊆∪∩∀∃∂∇±∓×÷·αβγδεζηθικλμνξπρστυφχψωΓΔΘΛΞΠΣΦΨΩ]").unwrap()
});

static RE_SCRIPT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_^⁰¹²³⁴⁵⁶⁷⁸⁹₀₁₂₃₄₅₆₇₈₉]").unwrap());

static RE_LATEX_COMMANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[A-Za-z]+").unwrap());

static RE_RELATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"≤|≥|≠|≈|<=|>=|!=|[=<>]").unwrap());

/// Symbol classes compared between the source sample and the Markdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    MathGlyphs,
    ScriptMarkers,
    LatexCommands,
    RelationalOperators,
}

impl SymbolClass {
    pub const ALL: [SymbolClass; 4] = [
        SymbolClass::MathGlyphs,
        SymbolClass::ScriptMarkers,
        SymbolClass::LatexCommands,
        SymbolClass::RelationalOperators,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            Self::MathGlyphs => &RE_MATH_GLYPHS,
            Self::ScriptMarkers => &RE_SCRIPT_MARKERS,
            Self::LatexCommands => &RE_LATEX_COMMANDS,
            Self::RelationalOperators => &RE_RELATIONAL,
        }
    }

    /// Number of occurrences of this class in `text`
    pub fn count(self, text: &str) -> usize {
        self.pattern().find_iter(text).count()
    }
}

pub fn has_heading(markdown: &str) -> bool {
    RE_HEADING.is_match(markdown)
}

pub fn count_headings(markdown: &str) -> usize {
    RE_HEADING.find_iter(markdown).count()
}

/// Display math: `$$…$$`, `\[…\]` or an equation-like environment
pub fn has_math_block(markdown: &str) -> bool {
    RE_MATH_BLOCK.is_match(markdown)
}

pub fn count_math_blocks(markdown: &str) -> usize {
    RE_MATH_BLOCK.find_iter(markdown).count()
}

/// Display or inline math
pub fn has_formula(markdown: &str) -> bool {
    has_math_block(markdown) || RE_INLINE_MATH.is_match(markdown)
}

pub fn is_table_row(line: &str) -> bool {
    RE_TABLE_ROW.is_match(line)
}

pub fn has_table_row(markdown: &str) -> bool {
    markdown.lines().any(is_table_row)
}

/// Number of tables, counted as maximal runs of consecutive table rows
pub fn count_tables(markdown: &str) -> usize {
    let mut tables = 0;
    let mut in_table = false;

    for line in markdown.lines() {
        let row = is_table_row(line);

        if row && !in_table {
            tables += 1;
        }

        in_table = row;
    }

    tables
}

pub fn is_list_item(line: &str) -> bool {
    RE_LIST_ITEM.is_match(line)
}

pub fn has_list_item(markdown: &str) -> bool {
    markdown.lines().any(is_list_item)
}

pub fn count_list_items(markdown: &str) -> usize {
    markdown.lines().filter(|line| is_list_item(line)).count()
}

pub fn has_paragraph_break(markdown: &str) -> bool {
    RE_PARAGRAPH_BREAK.is_match(markdown)
}

/// Blank-line separated blocks of running text
///
/// Blocks that open with a heading, table row, list item or display math
/// marker are structure, not paragraphs.
pub fn count_paragraphs(markdown: &str) -> usize {
    RE_PARAGRAPH_BREAK
        .split(markdown)
        .filter_map(|block| block.lines().map(str::trim).find(|line| !line.is_empty()))
        .filter(|first| {
            !(RE_HEADING.is_match(first)
                || is_table_row(first)
                || is_list_item(first)
                || first.starts_with("$$")
                || first.starts_with("\\[")
                || first.starts_with("```"))
        })
        .count()
}

pub fn has_image(markdown: &str) -> bool {
    RE_IMAGE.is_match(markdown)
}

/// First level-one heading text, if any
pub fn first_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().trim_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        assert!(has_heading("# Title"));
        assert!(has_heading("text\n### Section"));
        assert!(!has_heading("#hashtag"));
        assert_eq!(count_headings("# A\n\n## B\n\ntext\n#### C"), 3);
    }

    #[test]
    fn test_math_blocks() {
        assert!(has_math_block("$$\nE = mc^2\n$$"));
        assert!(has_math_block(r"\[ a^2 + b^2 = c^2 \]"));
        assert!(has_math_block("\\begin{align}\nx &= 1\n\\end{align}"));
        assert!(!has_math_block("costs $5 and $6"));
        assert_eq!(count_math_blocks("$$a$$ text $$b$$"), 2);
    }

    #[test]
    fn test_inline_formula() {
        assert!(has_formula("where $x_i$ is the input"));
        assert!(!has_formula("no math here"));
    }

    #[test]
    fn test_tables() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\ntext\n\n| c |\n| 3 |";
        assert!(has_table_row(md));
        assert_eq!(count_tables(md), 2);
        assert!(!has_table_row("a | b"));
    }

    #[test]
    fn test_lists() {
        assert!(has_list_item("- item"));
        assert!(has_list_item("  1. first"));
        assert!(has_list_item("2) second"));
        assert!(!has_list_item("-not a list"));
        assert_eq!(count_list_items("- a\n- b\n* c\ntext"), 3);
    }

    #[test]
    fn test_paragraphs() {
        let md = "# Title\n\nFirst paragraph\ncontinues.\n\n- item\n\nSecond paragraph.\n\n$$x$$";
        assert!(has_paragraph_break(md));
        assert_eq!(count_paragraphs(md), 2);
        assert!(!has_paragraph_break("one line\nanother line"));
    }

    #[test]
    fn test_images() {
        assert!(has_image("![figure 1](fig1.png)"));
        assert!(has_image("<img src=\"x.png\">"));
        assert!(!has_image("[link](x.html)"));
    }

    #[test]
    fn test_first_title() {
        assert_eq!(
            first_title("intro\n# Linear Algebra\n## Vectors"),
            Some("Linear Algebra".to_string())
        );
        assert_eq!(first_title("## Only a section"), None);
    }

    #[test]
    fn test_symbol_classes() {
        assert_eq!(SymbolClass::MathGlyphs.count("∑ α + β"), 3);
        assert_eq!(SymbolClass::ScriptMarkers.count("x_1^2"), 2);
        assert_eq!(SymbolClass::LatexCommands.count(r"\frac{a}{b} + \alpha"), 2);
        assert_eq!(SymbolClass::RelationalOperators.count("a <= b, c = d"), 2);
    }
}
