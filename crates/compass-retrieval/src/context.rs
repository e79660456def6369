//! Citations and the bounded context block handed to answer generation.

use serde::Serialize;
use std::collections::HashSet;

use compass_core::types::{Document, RetrievalResult};

pub const SNIPPET_CHARS: usize = 200;
/// Below this many free characters no partial block is added.
const MIN_PARTIAL_ROOM: usize = 200;
/// Slack kept for the block header and ellipsis of a partial block.
const PARTIAL_SLACK: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub breadcrumb: String,
    pub source_file: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: f32,
}

fn truncate_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

fn snippet(text: &str) -> String {
    let head = truncate_chars(text, SNIPPET_CHARS);
    if head.len() < text.len() { format!("{head}...") } else { text.to_string() }
}

/// Citations for the first `max_sources` results, one per breadcrumb.
pub fn collect_sources(results: &[RetrievalResult], max_sources: usize) -> Vec<Source> {
    let mut seen = HashSet::new();
    results
        .iter()
        .take(max_sources)
        .filter(|r| seen.insert(r.breadcrumb().to_string()))
        .map(|r| Source {
            breadcrumb: r.breadcrumb().to_string(),
            source_file: r.source().to_string(),
            snippet: snippet(r.text()),
            url: None,
            score: r.score(),
        })
        .collect()
}

/// Fills `url` from the metadata of the document each source came from.
pub fn attach_urls(sources: &mut [Source], documents: &[Document]) {
    for source in sources {
        source.url = documents
            .iter()
            .find(|d| d.source_file == source.source_file)
            .and_then(|d| d.url())
            .map(str::to_string);
    }
}

/// Concatenated `[Source i - breadcrumb]` blocks, at most `cap_chars`
/// characters plus the ellipsis of a final partial block.
pub fn build_context(results: &[RetrievalResult], cap_chars: usize) -> String {
    let mut out = String::new();
    let mut total = 0usize;
    for (i, r) in results.iter().enumerate() {
        let header = format!("[Source {} - {}]\n", i + 1, r.breadcrumb());
        let block = format!("{header}{}\n", r.text());
        let block_len = block.chars().count();
        if total + block_len > cap_chars {
            let remaining = cap_chars - total;
            if remaining > MIN_PARTIAL_ROOM {
                out.push_str(&header);
                out.push_str(truncate_chars(r.text(), remaining - PARTIAL_SLACK));
                out.push_str("...\n");
            }
            break;
        }
        out.push_str(&block);
        total += block_len;
    }
    out
}
