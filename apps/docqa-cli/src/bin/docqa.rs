//! `docqa`: ingest documents and query them with hybrid retrieval.
//!
//! ```bash
//! docqa ingest notes/manual.txt notes/extra/
//! docqa scan                       # everything under data.upload_dir
//! docqa query "how do I split firewood" --mode keyword -k 3
//! docqa prompt "how do I split firewood"
//! docqa stats
//! docqa clear
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docqa_core::chunker::Chunker;
use docqa_core::config::{expand_path, Config, Settings, StoreBackend};
use docqa_core::document::{is_supported, list_documents};
use docqa_core::text::snippet;
use docqa_core::traits::VectorStore;
use docqa_core::types::SearchMode;
use docqa_embed::get_default_embedder;
use docqa_hybrid::{render_prompt, AnswerGenerator, Assistant, ChatTurn, ContextDocument, RetrievalEngine};
use docqa_vector::{MemoryStore, VectorIndex};

const SNIPPET_CHARS: usize = 300;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Hybrid retrieval over local documents")]
struct Cli {
    /// Directory holding config.toml (default: current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store files or directories
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ingest every supported document in a directory (default: data.upload_dir)
    Scan { dir: Option<PathBuf> },
    /// Retrieve the chunks most relevant to a question
    Query {
        text: String,
        /// semantic, keyword or hybrid; anything else means hybrid
        #[arg(long)]
        mode: Option<String>,
        /// Number of results, clamped to [1, retrieval.max_k]
        #[arg(short)]
        k: Option<usize>,
    },
    /// Print the prompt an answer model would receive for a question
    Prompt {
        text: String,
        #[arg(long)]
        mode: Option<String>,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Show what the corpus holds
    Stats,
    /// Remove every stored chunk and debug export
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let base = cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let config = Config::load_in(&base).context("loading configuration")?;
    let settings = config.settings()?;
    info!(env = config.env_name(), backend = ?settings.vector.backend, "configuration loaded");

    let mut engine = open_engine(&settings)?;
    if !engine.is_available() {
        warn!("vector store is unavailable; searches will return nothing");
    }

    match cli.command {
        Command::Ingest { paths } => {
            let files = collect_files(&paths);
            ingest_files(&mut engine, &files);
        }
        Command::Scan { dir } => {
            let dir = dir.unwrap_or_else(|| expand_path(&settings.data.upload_dir));
            println!("Scanning {}", dir.display());
            let files = list_documents(&dir);
            ingest_files(&mut engine, &files);
        }
        Command::Query { text, mode, k } => {
            let (mode, k) = resolve_request(&settings, mode.as_deref(), k);
            let results = engine.retrieve(&text, mode, k);
            println!("🔍 {} result(s) for \"{}\" ({mode}, k={k})", results.len(), text);
            for (i, result) in results.iter().enumerate() {
                println!(
                    "\n  {}. score={:.4}  source={}  page={}",
                    i + 1,
                    result.score,
                    result.chunk.source_id,
                    result.chunk.page_number
                );
                println!("     {}", snippet(&result.chunk.content, &text, SNIPPET_CHARS));
            }
        }
        Command::Prompt { text, mode, k } => {
            let (mode, k) = resolve_request(&settings, mode.as_deref(), k);
            let assistant = Assistant::new(PromptPreview);
            let answer = assistant.ask(&engine, &text, mode, k, &[]);
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for doc in &answer.sources {
                    println!("  - {}", doc.reference());
                }
            }
        }
        Command::Stats => {
            let stats = engine.stats();
            println!("Chunks:    {}", stats.total_chunks);
            println!("Documents: {}", stats.total_documents);
            for name in &stats.document_names {
                println!("  - {name}");
            }
            println!("Lexical index: {:?}", engine.lexical_state());
        }
        Command::Clear => {
            engine.clear_all().context("clearing the corpus")?;
            println!("✅ Corpus cleared");
        }
    }
    Ok(())
}

/// Stands in for an answer model: the "answer" is the prompt itself.
struct PromptPreview;

impl AnswerGenerator for PromptPreview {
    fn generate(
        &self,
        query: &str,
        context: &[ContextDocument],
        history: &[ChatTurn],
    ) -> docqa_core::Result<String> {
        Ok(render_prompt(query, context, history))
    }
}

fn open_engine(settings: &Settings) -> Result<RetrievalEngine> {
    if settings.vector.backend == StoreBackend::Lance && !cfg!(feature = "lance") {
        bail!("vector.backend = \"lance\" requires docqa-cli to be built with the `lance` feature");
    }

    let embedder = get_default_embedder(&settings.embedding, settings.vector.dimension)
        .context("loading the embedding model")?;
    let vector = VectorIndex::connect(|| open_store(settings), embedder, &settings.vector);
    let chunker = Chunker::from_settings(&settings.chunking)?;
    Ok(RetrievalEngine::new(vector, chunker, settings.clone()))
}

fn open_store(settings: &Settings) -> docqa_core::Result<Box<dyn VectorStore>> {
    match settings.vector.backend {
        StoreBackend::Memory => match &settings.vector.snapshot_path {
            Some(path) => Ok(Box::new(MemoryStore::open(&expand_path(path))?)),
            None => Ok(Box::new(MemoryStore::new())),
        },
        #[cfg(feature = "lance")]
        StoreBackend::Lance => {
            let uri = expand_path(&settings.vector.lance_uri);
            Ok(Box::new(docqa_vector::LanceStore::open(
                &uri.to_string_lossy(),
                &settings.vector.collection,
                settings.vector.dimension,
            )?))
        }
        #[cfg(not(feature = "lance"))]
        StoreBackend::Lance => Err(docqa_core::Error::InvalidConfig(
            "lance backend not compiled in".to_string(),
        )),
    }
}

fn resolve_request(settings: &Settings, mode: Option<&str>, k: Option<usize>) -> (SearchMode, usize) {
    let mode = mode.map_or(settings.retrieval.mode, SearchMode::parse_lenient);
    let k = settings.retrieval.clamp_k(k.unwrap_or(settings.retrieval.top_k));
    (mode, k)
}

/// Expand directories into their supported documents; files are taken as given.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(list_documents(path));
        } else if is_supported(path) {
            files.push(path.clone());
        } else {
            warn!(path = %path.display(), "unsupported file type, skipping");
        }
    }
    files
}

fn ingest_files(engine: &mut RetrievalEngine, files: &[PathBuf]) {
    if files.is_empty() {
        println!("No documents to ingest");
        return;
    }

    let pb = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut total_chunks = 0;
    let mut processed = 0;
    for path in files {
        pb.set_message(display_name(path));
        let n = engine.ingest_path(path);
        if n > 0 {
            processed += 1;
        }
        total_chunks += n;
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("\n✅ Ingested {processed}/{} documents", files.len());
    println!("📊 Stored {total_chunks} chunks");
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
