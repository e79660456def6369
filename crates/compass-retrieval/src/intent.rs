//! Keyword classification of queries into the closed set of intents the
//! fusion policy boosts.

use std::fmt;

/// Queries starting with one of these ask where something lives.
pub const LOCATOR_PREFIXES: &[&str] = &["where", "which module", "find"];
/// Queries containing one of these ask about required course materials.
pub const MATERIALS_KEYWORDS: &[&str] = &["material", "book", "textbook", "required", "course pack"];
/// Result text containing one of these likely lists materials.
pub const MATERIALS_TERMS: &[&str] = &["table", "material", "book", "fundamentals", "course pack", "lab access"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryIntent {
    Locator,
    Materials,
    General,
}

impl QueryIntent {
    /// Case-insensitive. Locator is tested first, so a query like
    /// "where is the required textbook" is a locator query.
    pub fn classify(query: &str) -> Self {
        let q = query.trim().to_lowercase();
        if LOCATOR_PREFIXES.iter().any(|p| q.starts_with(p)) {
            QueryIntent::Locator
        } else if MATERIALS_KEYWORDS.iter().any(|k| q.contains(k)) {
            QueryIntent::Materials
        } else {
            QueryIntent::General
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryIntent::Locator => "locator",
            QueryIntent::Materials => "materials",
            QueryIntent::General => "general",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

pub fn mentions_materials(text: &str) -> bool {
    let t = text.to_lowercase();
    MATERIALS_TERMS.iter().any(|term| t.contains(term))
}
