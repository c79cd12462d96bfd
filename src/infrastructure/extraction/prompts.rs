//! Instructions sent alongside the document
//!
//! The wording is tuned for the extraction model and is not part of the
//! service's contract; only the mode → prompt mapping is.

use crate::domain::ConversionMode;

/// Detailed instructions for full conversions
pub const FULL_PROMPT: &str = r#"Convert this document to clean, well-structured Markdown.

Text
- Keep every piece of text, in natural reading order.
- Drop page numbers and headers or footers that repeat on every page.

Structure
- One # heading for the document title, ## and ### for sections and subsections.
- Use - for bullet lists and 1. 2. 3. for numbered lists, keeping nesting.
- Separate paragraphs with a blank line.

Mathematics
- Write every formula in LaTeX: $...$ inline and $$...$$ on its own lines for display math.
- Keep subscripts, superscripts, Greek letters, operators and relations exactly as printed.
- Use \begin{aligned} or \begin{cases} for multi-line derivations and piecewise definitions.
- Number equations with \tag{n} when the document numbers them.

Tables
- Use GitHub pipe tables with a separator row; put formulas in cells as inline LaTeX.

Figures
- Describe diagrams and plots in one italic sentence; do not invent image links.

Output only the Markdown. Do not wrap it in code fences and do not add commentary."#;

/// Short instructions for fast conversions
pub const FAST_PROMPT: &str = r#"Convert this document to Markdown.
Use # headings, pipe tables and lists where the document has them.
Write all mathematics in LaTeX ($...$ inline, $$...$$ display).
Output only the Markdown, without code fences or commentary."#;

pub fn prompt_for(mode: ConversionMode) -> &'static str {
    match mode {
        ConversionMode::Full => FULL_PROMPT,
        ConversionMode::Fast => FAST_PROMPT,
    }
}
