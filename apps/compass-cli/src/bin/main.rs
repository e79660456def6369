use std::sync::Arc;

use clap::{Parser, Subcommand};

use compass_cli::{init_tracing, load_settings};
use compass_core::config::Settings;
use compass_core::corpus::load_documents;
use compass_core::error::Error;
use compass_core::types::RetrievalOutcome;
use compass_embed::get_default_embedder;
use compass_retrieval::{attach_urls, build_context, collect_sources, Retriever};
use compass_vector::LanceDenseIndex;

#[derive(Debug, Parser)]
#[command(name = "compass", version, about = "Hybrid retrieval over course documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ranked chunks for a question
    Query {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// The bounded context block and citations an answer would be built from
    Context {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        cap: Option<usize>,
    },
    /// Store manifest and chunk count
    Status,
}

fn open_retriever(settings: &Settings) -> anyhow::Result<Retriever> {
    let embedder = Arc::from(get_default_embedder(&settings.embedding)?);
    match Retriever::open(settings, embedder) {
        Ok(r) => Ok(r),
        Err(e @ Error::NotReady(_)) => {
            eprintln!("{e}\nRun `compass-indexer` to build the index.");
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

fn retrieve(retriever: &Retriever, query: &str, k: usize) -> anyhow::Result<RetrievalOutcome> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(retriever.retrieve(query, k))?)
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 100 { format!("{}...", flat.chars().take(100).collect::<String>()) } else { flat }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings()?;

    match cli.command {
        Command::Query { query, k, json } => {
            let retriever = open_retriever(&settings)?;
            let outcome = retrieve(&retriever, &query, k.unwrap_or(settings.retrieval.top_k))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }
            println!("Found {} results for: \"{}\"", outcome.results.len(), query);
            for (i, r) in outcome.results.iter().enumerate() {
                println!("\n  {}. score={:.4}  [{}]  {}", i + 1, r.hybrid_score, r.provenance, r.breadcrumb());
                println!("     {}", preview(r.text()));
            }
            let threshold = settings.retrieval.low_confidence_threshold;
            let verdict = if outcome.is_confident(threshold) { "answerable" } else { "low confidence" };
            println!("\nconfidence={:.3} (threshold {:.2}: {})", outcome.confidence, threshold, verdict);
        }
        Command::Context { query, k, cap } => {
            let retriever = open_retriever(&settings)?;
            let outcome = retrieve(&retriever, &query, k.unwrap_or(settings.retrieval.top_k))?;
            let context = build_context(&outcome.results, cap.unwrap_or(settings.retrieval.max_context_chars));
            let mut sources = collect_sources(&outcome.results, settings.retrieval.max_sources);
            if let Ok(documents) = load_documents(&settings.data.docs_jsonl_path()) {
                attach_urls(&mut sources, &documents);
            }
            println!("{context}");
            println!("---\nconfidence={:.3}  context_chars={}", outcome.confidence, context.chars().count());
            for s in &sources {
                println!("- {} ({}){}", s.breadcrumb, s.source_file, s.url.as_deref().map(|u| format!(" <{u}>")).unwrap_or_default());
                println!("  {}", preview(&s.snippet));
            }
        }
        Command::Status => {
            let dir = settings.data.index_path();
            match LanceDenseIndex::open(&dir, &settings.data.table) {
                Ok(store) => {
                    println!("Store: {} (table '{}')", dir.display(), settings.data.table);
                    println!("Chunks: {}", store.count()?);
                    match store.manifest() {
                        Some(m) => println!("Embedder: {} ({} dims)\nBuilt at: {}", m.embedder_id, m.dim, m.built_at),
                        None => println!("No manifest recorded"),
                    }
                }
                Err(e) if e.is_not_ready() => println!("{e}\nRun `compass-indexer` to build the index."),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
