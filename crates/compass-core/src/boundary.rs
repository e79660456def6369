//! Detection of atomic regions (tables, slides) in extracted document text.
//!
//! Ingestion tags tables as `[TABLE n] ... [END TABLE]` and presentation pages
//! as `[SLIDE n]` or `[SLIDE n - Title/Intro]`. A table spans from its opener
//! to the nearest following closer; a slide spans to the next slide opener or
//! to end of text. All offsets here are character offsets.

use once_cell::sync::Lazy;
use regex::Regex;

static TABLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[TABLE \d+\]").expect("static regex"));
static TABLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[END TABLE\]").expect("static regex"));
static SLIDE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[SLIDE \d+[^\]]*\]").expect("static regex"));

/// Half-open `(start, end)` character span.
pub type Span = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Table,
    Slide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub start: usize,
    pub end: usize,
}

/// Byte offset of every character of a text, plus the text length, so that
/// character positions can be mapped onto `str` slices.
#[derive(Debug, Clone)]
pub(crate) struct CharOffsets {
    bytes: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        let mut bytes: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        bytes.push(text.len());
        Self { bytes }
    }

    pub(crate) fn char_len(&self) -> usize { self.bytes.len() - 1 }

    pub(crate) fn to_char(&self, byte: usize) -> usize {
        self.bytes.binary_search(&byte).unwrap_or_else(|i| i)
    }

    pub(crate) fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        let len = self.char_len();
        let (start, end) = (start.min(len), end.min(len));
        &text[self.bytes[start]..self.bytes[end.max(start)]]
    }
}

/// Protected regions of one document, each list sorted by start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boundaries {
    tables: Vec<Span>,
    slides: Vec<Span>,
}

impl Boundaries {
    pub fn detect(text: &str) -> Self {
        Self::detect_with(text, &CharOffsets::new(text))
    }

    pub(crate) fn detect_with(text: &str, offsets: &CharOffsets) -> Self {
        let closers: Vec<usize> = TABLE_CLOSE.find_iter(text).map(|m| m.start()).collect();
        let closer_ends: Vec<usize> = TABLE_CLOSE.find_iter(text).map(|m| m.end()).collect();

        let mut tables = Vec::new();
        for opener in TABLE_OPEN.find_iter(text) {
            let next = closers.partition_point(|&c| c <= opener.start());
            match closer_ends.get(next) {
                Some(&end) => tables.push((offsets.to_char(opener.start()), offsets.to_char(end))),
                None => tracing::debug!(at = opener.start(), marker = opener.as_str(), "table opener without closer, left unprotected"),
            }
        }

        let slide_starts: Vec<usize> = SLIDE_OPEN.find_iter(text).map(|m| offsets.to_char(m.start())).collect();
        let slides = slide_starts
            .iter()
            .enumerate()
            .map(|(i, &start)| (start, slide_starts.get(i + 1).copied().unwrap_or_else(|| offsets.char_len())))
            .collect();

        Self { tables, slides }
    }

    pub fn tables(&self) -> &[Span] { &self.tables }

    pub fn slides(&self) -> &[Span] { &self.slides }

    pub fn is_empty(&self) -> bool { self.tables.is_empty() && self.slides.is_empty() }

    /// The protected region containing `pos`, tables before slides.
    pub fn locate(&self, pos: usize) -> Option<Region> {
        let hit = |spans: &[Span], kind| {
            spans
                .iter()
                .find(|&&(start, end)| start <= pos && pos < end)
                .map(|&(start, end)| Region { kind, start, end })
        };
        hit(&self.tables, RegionKind::Table).or_else(|| hit(&self.slides, RegionKind::Slide))
    }

    /// The region that must stay in one piece around `pos`: what [`locate`]
    /// finds, widened to the enclosing slide when a table sits wholly inside
    /// one.
    ///
    /// [`locate`]: Self::locate
    pub fn unit_at(&self, pos: usize) -> Option<Region> {
        let region = self.locate(pos)?;
        if region.kind == RegionKind::Slide {
            return Some(region);
        }
        let enclosing = self
            .slides
            .iter()
            .find(|&&(start, end)| start <= region.start && region.end <= end)
            .map(|&(start, end)| Region { kind: RegionKind::Slide, start, end });
        Some(enclosing.unwrap_or(region))
    }
}
