use once_cell::sync::Lazy;
use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "course_text";
pub const ORD_FIELD: &str = "ord";
pub const TEXT_FIELD: &str = "text";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

static ANALYZER: Lazy<TextAnalyzer> = Lazy::new(|| {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
});

/// `ord` points back into the chunk table held next to the index; the text is
/// indexed from pre-analyzed terms and not stored.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_u64_field(ORD_FIELD, STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, ANALYZER.clone());
}

/// Terms of `text` exactly as the index and the query parser see them.
pub fn analyze(text: &str) -> Vec<String> {
	let mut analyzer = ANALYZER.clone();
	let mut stream = analyzer.token_stream(text);
	let mut terms = Vec::new();
	while stream.advance() { terms.push(stream.token().text.clone()); }
	terms
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyze_lowercases_and_drops_stop_words() {
		assert_eq!(analyze("Where is the Syllabus?"), vec!["syllabus"]);
		assert_eq!(analyze("A: 93, B: 83"), vec!["93", "b", "83"]);
		assert!(analyze("   ").is_empty());
	}
}
