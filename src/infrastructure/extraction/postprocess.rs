//! Deterministic cleanup of model-generated Markdown
//!
//! Only formatting artefacts are touched; content is left alone. Fence
//! stripping runs first so later passes see the real document.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A```[ \t]*(?:markdown|md)?[ \t]*\n(.*?)\n?```[ \t]*\z").unwrap());

static RE_EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero width space
    '\u{200C}',
    '\u{200D}',
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
    '\u{00AD}', // soft hyphen
];

/// Normalises raw extractor output into the stored Markdown
pub fn clean_markdown(raw: &str) -> String {
    let text = unwrap_outer_fence(raw.trim());
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text.replace(INVISIBLE_CHARS, "");

    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let text = RE_EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.is_empty() {
        String::new()
    } else {
        format!("{}\n", text)
    }
}

fn unwrap_outer_fence(text: &str) -> &str {
    RE_OUTER_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |inner| inner.as_str())
}
