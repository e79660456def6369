use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use compass_cli::{init_tracing, load_settings};
use compass_core::corpus::load_documents;
use compass_embed::get_default_embedder;
use compass_retrieval::IndexingPipeline;
use compass_vector::LanceDenseIndex;

/// Chunks, embeds and stores the course document dump. Replaces any existing store.
#[derive(Debug, Parser)]
#[command(name = "compass-indexer", version)]
struct Args {
    /// JSONL document dump (defaults to data.docs_jsonl)
    #[arg(long)]
    docs: Option<PathBuf>,
    /// Dense store directory (defaults to data.index_dir)
    #[arg(long)]
    index_dir: Option<PathBuf>,
    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let docs = args.docs.unwrap_or_else(|| settings.data.docs_jsonl_path());
    let index_dir = args.index_dir.unwrap_or_else(|| settings.data.index_path());

    println!("Compass indexer\n===============");
    println!("Documents: {}", docs.display());
    println!("Store:     {} (table '{}')", index_dir.display(), settings.data.table);

    let documents = load_documents(&docs)?;
    let embedder: Arc<dyn compass_core::traits::Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
    let dense = LanceDenseIndex::create(&index_dir, &settings.data.table, &embedder.id())?;
    let stats = IndexingPipeline::new(settings.chunking.clone(), embedder.clone())?
        .with_progress(!args.quiet)
        .build(&documents, &dense)?;
    tracing::info!(embedder = %embedder.id(), store = %index_dir.display(), "indexing finished");

    println!("\nIndexed {} documents into {} chunks ({}-dim vectors)", stats.documents, stats.chunks, stats.dim);
    println!("Query with: compass query '<question>'");
    Ok(())
}
