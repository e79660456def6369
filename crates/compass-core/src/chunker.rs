//! Structure-aware fixed-width chunking.
//!
//! Text is cut into windows of `target_size` characters advancing by
//! `target_size - overlap`. Tables and slides (see [`crate::boundary`]) are
//! never split: a window starting inside one becomes exactly that region, and
//! a window ending inside one is stretched to the region end, capped at twice
//! the target size. A region longer than that cap can still be cut by a
//! stretched window; the region itself is then emitted whole once the cursor
//! reaches it. A table lying inside a slide travels with that slide, so
//! chunk starts never move backwards.

use serde::{Deserialize, Serialize};

use crate::boundary::{Boundaries, CharOffsets};
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Nominal chunk length in characters.
    pub target_size: usize,
    /// Characters shared by consecutive ordinary chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_size: 1200, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { target_size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::InvalidConfig("chunking.target_size must be positive".into()));
        }
        if self.overlap >= self.target_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
                self.overlap, self.target_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize { self.target_size - self.overlap }
}

/// A chunk before it is attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        let offsets = CharOffsets::new(text);
        let boundaries = Boundaries::detect_with(text, &offsets);
        let len = offsets.char_len();
        let target = self.config.target_size;

        let mut spans = Vec::new();
        let mut push = |start: usize, end: usize| {
            let slice = offsets.slice(text, start, end);
            if !slice.trim().is_empty() {
                spans.push(TextSpan { text: slice.to_string(), start_char: start, end_char: end });
            }
        };

        let mut cursor = 0;
        while cursor < len {
            if let Some(region) = boundaries.unit_at(cursor) {
                push(region.start, region.end);
                cursor = region.end;
                continue;
            }

            let mut end = cursor + target;
            if end < len {
                if let Some(region) = boundaries.unit_at(end) {
                    end = region.end.min(cursor + 2 * target);
                }
            }
            push(cursor, end.min(len));
            cursor += self.config.step();
        }
        spans
    }

    /// Chunks of one document, numbered from 0, carrying its breadcrumb and source.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.split(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_id, span)| Chunk {
                text: span.text,
                breadcrumb: doc.breadcrumb.clone(),
                source_file: doc.source_file.clone(),
                chunk_id,
                start_char: span.start_char,
                end_char: span.end_char,
            })
            .collect()
    }
}

pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> Result<Vec<TextSpan>> {
    Ok(Chunker::new(ChunkingConfig::new(target_size, overlap)?)?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(spans: &[TextSpan]) -> Vec<usize> { spans.iter().map(|s| s.start_char).collect() }

    #[test]
    fn table_is_kept_whole_even_past_target() {
        let text = "[TABLE 1]\nA: 93\nB: 83\n[END TABLE]\nSome filler text after.";
        let spans = chunk_text(text, 10, 2).expect("chunk");
        assert_eq!(spans[0].text, "[TABLE 1]\nA: 93\nB: 83\n[END TABLE]");
        assert_eq!((spans[0].start_char, spans[0].end_char), (0, 33));
        assert_eq!(starts(&spans), vec![0, 33, 41, 49]);
        assert_eq!(spans.last().map(|s| s.end_char), Some(57));
    }

    #[test]
    fn ordinary_text_overlaps_by_configured_amount() {
        let text: String = ('a'..='y').collect();
        let spans = chunk_text(&text, 10, 3).expect("chunk");
        let bounds: Vec<(usize, usize)> = spans.iter().map(|s| (s.start_char, s.end_char)).collect();
        assert_eq!(bounds, vec![(0, 10), (7, 17), (14, 24), (21, 25)]);
        assert_eq!(spans[1].text, "hijklmnopq");
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let text = format!("abc{}def", " ".repeat(20));
        let spans = chunk_text(&text, 5, 0).expect("chunk");
        assert_eq!(starts(&spans), vec![0, 20, 25]);
        assert!(spans.iter().all(|s| !s.text.trim().is_empty()));
    }

    #[test]
    fn window_ending_in_table_is_stretched_to_its_end() {
        let text = "intro text [TABLE 1]\nA: 93\n[END TABLE] tail";
        let spans = chunk_text(text, 20, 5).expect("chunk");
        let table_start = text.find("[TABLE 1]").expect("opener");
        let table_end = text.find("[END TABLE]").expect("closer") + "[END TABLE]".len();
        let bounds: Vec<(usize, usize)> = spans.iter().map(|s| (s.start_char, s.end_char)).collect();
        assert_eq!(bounds, vec![(0, table_end), (table_start, table_end), (table_end, text.len())]);
    }

    #[test]
    fn stretch_is_capped_at_twice_the_target() {
        let body = "x".repeat(60);
        let text = format!("lead [TABLE 1]\n{body}\n[END TABLE]");
        let spans = chunk_text(&text, 10, 0).expect("chunk");
        assert_eq!((spans[0].start_char, spans[0].end_char), (0, 20));
        // the cursor then lands inside the table, which is emitted whole
        assert_eq!(spans[1].start_char, 5);
        assert_eq!(spans[1].end_char, text.chars().count());
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn slides_become_single_chunks() {
        let text = "[SLIDE 1 - Title/Intro]\nWelcome to the course\n[SLIDE 2]\nAgenda and goals";
        let spans = chunk_text(text, 8, 2).expect("chunk");
        assert_eq!(spans.len(), 2);
        assert!(spans[0].text.starts_with("[SLIDE 1"));
        assert!(spans[1].text.starts_with("[SLIDE 2]"));
        assert_eq!(spans[1].end_char, text.len());
    }

    #[test]
    fn table_nested_in_slide_keeps_starts_in_order() {
        let text = "aaaa[SLIDE 1]\nbb[TABLE 1]\ncc 1 2 3\n[END TABLE]\ndd more slide text";
        let len = text.len();
        let spans = chunk_text(text, 16, 0).expect("chunk");
        // first window stretches toward the slide end and hits the cap
        assert_eq!(spans.iter().map(|s| (s.start_char, s.end_char)).collect::<Vec<_>>(), vec![(0, 32), (4, len)]);

        let spans = chunk_text(text, 30, 5).expect("chunk");
        assert_eq!(spans.iter().map(|s| (s.start_char, s.end_char)).collect::<Vec<_>>(), vec![(0, 60), (4, len)]);
    }

    #[test]
    fn unclosed_table_is_chunked_normally() {
        let text = "[TABLE 1]\nA: 93\nB: 83 and nothing closes it";
        let spans = chunk_text(text, 10, 0).expect("chunk");
        assert!(spans.iter().all(|s| s.end_char - s.start_char <= 10));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(chunk_text("abc", 10, 10), Err(Error::InvalidConfig(_))));
        assert!(matches!(chunk_text("abc", 0, 0), Err(Error::InvalidConfig(_))));
        assert!(chunk_text("", 10, 2).expect("empty ok").is_empty());
    }

    #[test]
    fn document_chunks_are_numbered_and_labelled() {
        let doc = Document {
            text: "one two three four five six seven".into(),
            breadcrumb: "Week_01 > Syllabus".into(),
            source_file: "Week_01/Syllabus.md".into(),
            file_type: ".md".into(),
            metadata: None,
        };
        let chunker = Chunker::new(ChunkingConfig::new(12, 4).expect("config")).expect("chunker");
        let chunks = chunker.chunk_document(&doc);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, i);
            assert_eq!(c.breadcrumb, "Week_01 > Syllabus");
            assert_eq!(c.source_file, "Week_01/Syllabus.md");
        }
    }
}
