//! compass-retrieval
//!
//! Hybrid retrieval over course chunks: query intent classification, score
//! fusion, the [`Retriever`] facade, offline indexing, and citation/context
//! assembly for answer generation.

pub mod context;
pub mod fusion;
pub mod intent;
pub mod pipeline;
pub mod retriever;

pub use context::{attach_urls, build_context, collect_sources, Source};
pub use fusion::{distance_to_similarity, normalize, ScoreFuser};
pub use intent::QueryIntent;
pub use pipeline::{IndexStats, IndexingPipeline};
pub use retriever::{Retriever, RetrieverOptions};
