//! Cheap, parser-free views of the uploaded bytes
//!
//! Nothing here understands PDF structure. The sample only needs to be a
//! rough indication of how much text (and which symbols) the source holds.

use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;

/// Upper bound on the sample length, in characters
pub const SOURCE_SAMPLE_LIMIT: usize = 4000;

const MIN_RUN_LEN: usize = 4;

static RE_PDF_PAGE: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?-u)/Type\s*/Page\b").unwrap());

const PDF_SYNTAX_MARKERS: &[&str] = &[
    "obj", "<<", ">>", "stream", "xref", "trailer", "/Filter", "/Length",
];

/// Number of page objects in a PDF byte stream; 0 when none are visible
/// (e.g. compressed object streams)
pub fn count_pdf_pages(bytes: &[u8]) -> u32 {
    RE_PDF_PAGE.find_iter(bytes).count() as u32
}

/// Text-like content of the upload, used as the scorer's reference
///
/// For PDFs, literal strings shown with `Tj`/`TJ` are preferred; other
/// printable runs are kept unless they look like PDF syntax. Images yield an
/// empty sample.
pub fn source_sample(bytes: &[u8], is_pdf: bool) -> String {
    if !is_pdf {
        return String::new();
    }

    let mut sample = String::new();

    for run in printable_runs(bytes) {
        if sample.chars().count() >= SOURCE_SAMPLE_LIMIT {
            break;
        }

        let text = if run.contains("Tj") || run.contains("TJ") {
            shown_strings(run)
        } else if looks_like_syntax(run) {
            continue;
        } else {
            run.trim().to_string()
        };

        if text.is_empty() {
            continue;
        }

        if !sample.is_empty() {
            sample.push(' ');
        }
        sample.push_str(&text);
    }

    sample.chars().take(SOURCE_SAMPLE_LIMIT).collect()
}

fn printable_runs(bytes: &[u8]) -> impl Iterator<Item = &str> {
    bytes
        .split(|b| !(b.is_ascii_graphic() || *b == b' ' || *b == b'\t'))
        .filter(|run| run.len() >= MIN_RUN_LEN)
        .filter_map(|run| std::str::from_utf8(run).ok())
}

fn looks_like_syntax(run: &str) -> bool {
    let trimmed = run.trim_start();

    trimmed.starts_with('/')
        || trimmed.starts_with('%')
        || PDF_SYNTAX_MARKERS.iter().any(|marker| run.contains(marker))
        || run.chars().all(|c| c.is_ascii_digit() || c.is_ascii_whitespace() || c == '.')
}

/// Concatenates the contents of `( … )` literals in a content-stream line
fn shown_strings(run: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut escaped = false;

    for c in run.chars() {
        if depth > 0 && escaped {
            out.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' if depth > 0 => escaped = true,
            '(' => {
                if depth > 0 {
                    out.push(c);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    out.push(c);
                }
            }
            _ if depth > 0 => out.push(c),
            _ => {}
        }
    }

    out.trim().to_string()
}
