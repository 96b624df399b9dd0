use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use caira_answer::{LlmClient, PromptVariant};
use caira_core::{CairaConfig, OutputFormat, RetrievalResult};
use caira_index::IndexStore;
use caira_ingest::chunker::Chunker;
use caira_ingest::embedding::Embedder;
use caira_ingest::loader::DirectoryLoader;
use caira_retrieval::{build_index, BuildReport, Retriever};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = ".caira.toml";

#[derive(Parser)]
#[command(
    name = "caira",
    version,
    about = "Context-aware incident response assistant",
    long_about = "C-AIRA answers incident questions from your own runbooks, incident reports and logs.\n\n\
                   Documents under <data_dir>/{incidents,runbooks,logs} are chunked, embedded and\n\
                   stored in a local vector index; queries retrieve the closest chunks as context.\n\n\
                   Examples:\n  \
                     caira init                               Write a default .caira.toml\n  \
                     caira index                              Build the vector store from ./data\n  \
                     caira search 'db connection timeout'     Show the most relevant chunks\n  \
                     caira ask 'how do I restart payments?'   Generate a grounded answer\n  \
                     caira stats                              Inspect the persisted index"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .caira.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector store from the document corpus
    #[command(long_about = "Build the vector store from the document corpus.\n\n\
        Reads .txt and .md files from <data_dir>/incidents, <data_dir>/runbooks and\n\
        <data_dir>/logs, splits them into overlapping token chunks, embeds every chunk\n\
        and writes the index and metadata files.\n\n\
        Examples:\n  caira index\n  caira index --data-dir /srv/kb")]
    Index {
        /// Corpus root (overrides paths.data_dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Retrieve the chunks most relevant to a query
    #[command(long_about = "Retrieve the chunks most relevant to a query.\n\n\
        Similarity is relative to the farthest of the top-k candidates, so the\n\
        threshold filters within one result set only.\n\n\
        Examples:\n  caira search 'API authentication failed'\n  caira search 'disk full' --top-k 10 --threshold 0.5")]
    Search {
        /// Natural-language query
        query: String,

        /// Number of candidates to fetch (overrides retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity in [0, 1] (overrides retrieval.similarity_threshold)
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Answer a question from the knowledge base
    #[command(long_about = "Answer a question from the knowledge base.\n\n\
        Retrieves context, then asks the configured chat model to answer strictly from it.\n\
        If nothing relevant is found, the model is not called.\n\n\
        Examples:\n  caira ask 'checkout returns 502'\n  caira ask 'db pool exhausted' --variant detailed")]
    Ask {
        /// The question
        query: String,

        /// System prompt variant: default, concise or detailed
        #[arg(long, default_value = "default")]
        variant: PromptVariant,

        /// Number of candidates to fetch (overrides retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity in [0, 1] (overrides retrieval.similarity_threshold)
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Show statistics for the persisted index
    Stats,
    /// Create a default .caira.toml in the current directory
    Init,
}

const DEFAULT_CONFIG: &str = r#"# C-AIRA Configuration

[embedding]
# OpenAI-compatible embeddings endpoint; key falls back to CAIRA_EMBEDDING_API_KEY / OPENAI_API_KEY
# base_url = "https://api.openai.com/v1"
model = "text-embedding-3-small"
dimensions = 1024
batch_size = 10
request_delay_ms = 100
max_retries = 3
retry_base_ms = 1000

[llm]
# base_url = "https://api.openai.com"
model = "gpt-4o"
temperature = 0.1
max_tokens = 1000
top_p = 0.95

[chunking]
chunk_size = 600
chunk_overlap = 50

[retrieval]
top_k = 5
similarity_threshold = 0.7

[paths]
data_dir = "data"
index_path = "vector_store/index.bin"
metadata_path = "vector_store/metadata.json"
"#;

fn load_config(path: Option<&Path>) -> Result<CairaConfig> {
    let mut config = match path {
        Some(path) => CairaConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                CairaConfig::from_file(default_path)?
            } else {
                CairaConfig::default()
            }
        }
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: &str) -> Result<Option<indicatif::ProgressBar>> {
    if !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

fn finish(spinner: Option<indicatif::ProgressBar>, message: &str) {
    if let Some(pb) = spinner {
        pb.finish_with_message(message.to_string());
    }
}

fn load_store(config: &CairaConfig) -> Result<IndexStore> {
    let mut store = IndexStore::new();
    store.load(&config.paths.index_path, &config.paths.metadata_path)?;
    Ok(store)
}

fn print_build_report(report: &BuildReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Index Built\n");
            println!("| Metric | Value |");
            println!("|--------|-------|");
            println!("| Documents | {} |", report.documents);
            println!("| Chunks | {} |", report.chunk_stats.total_chunks);
            println!("| Avg tokens/chunk | {:.1} |", report.chunk_stats.avg_tokens);
            println!("| Total tokens | {} |", report.chunk_stats.total_tokens);
            println!("| Vectors | {} |", report.index_stats.total_vectors);
            println!("| Dimension | {} |", report.index_stats.dimension);
        }
        OutputFormat::Text => {
            println!("Indexed {} documents", report.documents);
            println!(
                "  chunks: {} (avg {:.1} tokens, min {}, max {}, total {})",
                report.chunk_stats.total_chunks,
                report.chunk_stats.avg_tokens,
                report.chunk_stats.min_tokens,
                report.chunk_stats.max_tokens,
                report.chunk_stats.total_tokens,
            );
            println!(
                "  vectors: {} x {}",
                report.index_stats.total_vectors, report.index_stats.dimension
            );
            println!("  index: {}", report.index_path.display());
            println!("  metadata: {}", report.metadata_path.display());
        }
    }
    Ok(())
}

fn print_retrieval(result: &RetrievalResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "summary": result.summary(),
                "chunks": result.chunks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Results for \"{}\"\n", result.query);
            if result.chunks.is_empty() {
                println!("{}", result.context);
                return Ok(());
            }
            for chunk in &result.chunks {
                let meta = &chunk.metadata.metadata;
                println!(
                    "## {}. {} ({}, chunk {}/{})\n",
                    chunk.rank,
                    meta.document.filename,
                    meta.document.doc_type,
                    meta.chunk_id,
                    meta.total_chunks
                );
                println!("**Similarity:** {:.3}\n", chunk.similarity);
                println!("```\n{}\n```\n", chunk.metadata.chunk_text.trim_end());
            }
        }
        OutputFormat::Text => {
            if result.chunks.is_empty() {
                println!("{}", result.context);
                return Ok(());
            }
            println!(
                "Found {} relevant chunks from: {}\n",
                result.chunks.len(),
                result.sources().join(", ")
            );
            for chunk in &result.chunks {
                println!("#{} {}", chunk.rank, chunk.details());
                let preview: String = chunk.metadata.chunk_text.chars().take(300).collect();
                println!("\n{}\n", preview.trim_end());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_PATH} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_PATH} with default configuration");
        }
        Command::Index { data_dir } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = data_dir {
                config.paths.data_dir = dir;
            }
            config.validate()?;
            tracing::debug!("effective configuration:\n{}", config.summary());

            let loader = DirectoryLoader::new(&config.paths.data_dir);
            let chunker = Chunker::with_default_tokenizer(config.chunking)?;
            let embedder = Embedder::from_config(&config.embedding)?;

            let pb = spinner(&format!(
                "Indexing {} with {}...",
                config.paths.data_dir.display(),
                embedder.model()
            ))?;
            let report = build_index(
                &loader,
                &chunker,
                &embedder,
                &config.paths,
                config.embedding.batch_size,
            )
            .await
            .inspect_err(|_| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Failed");
                }
            })?;
            finish(pb, "Done");

            print_build_report(&report, cli.format)?;
        }
        Command::Search {
            query,
            top_k,
            threshold,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(k) = top_k {
                config.retrieval.top_k = k;
            }
            if let Some(t) = threshold {
                config.retrieval.similarity_threshold = t;
            }
            config.validate()?;

            let store = load_store(&config)?;
            let embedder = Embedder::from_config(&config.embedding)?;
            let retriever = Retriever::with_defaults(&store, &embedder, config.retrieval);

            let result = retriever.retrieve_default(&query).await?;
            print_retrieval(&result, cli.format)?;
        }
        Command::Ask {
            query,
            variant,
            top_k,
            threshold,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(k) = top_k {
                config.retrieval.top_k = k;
            }
            if let Some(t) = threshold {
                config.retrieval.similarity_threshold = t;
            }
            config.validate()?;

            let store = load_store(&config)?;
            let embedder = Embedder::from_config(&config.embedding)?;
            let retriever = Retriever::with_defaults(&store, &embedder, config.retrieval);
            let llm = LlmClient::new(&config.llm)?;

            let pb = spinner("Generating answer...")?;
            let answer = caira_answer::answer(&retriever, &llm, &query, variant)
                .await
                .inspect_err(|_| {
                    if let Some(pb) = &pb {
                        pb.finish_with_message("Failed");
                    }
                })?;
            finish(pb, "Done");

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&answer).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# {}\n", answer.query);
                    println!("{}\n", answer.response);
                    if !answer.sources.is_empty() {
                        println!("**Sources:** {}", answer.sources.join(", "));
                    }
                }
                OutputFormat::Text => {
                    println!("{}\n", answer.response);
                    if !answer.sources.is_empty() {
                        println!("Sources: {}", answer.sources.join(", "));
                    }
                }
            }
        }
        Command::Stats => {
            let config = load_config(cli.config.as_deref())?;
            let store = load_store(&config)?;
            let stats = store.stats()?;
            match cli.format {
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "index": stats,
                        "indexPath": config.paths.index_path,
                        "metadataPath": config.paths.metadata_path,
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Index Statistics\n");
                    println!("| Metric | Value |");
                    println!("|--------|-------|");
                    println!("| Vectors | {} |", stats.total_vectors);
                    println!("| Dimension | {} |", stats.dimension);
                    println!("| Metadata entries | {} |", stats.metadata_count);
                }
                OutputFormat::Text => {
                    println!("Total vectors: {}", stats.total_vectors);
                    println!("Dimension: {}", stats.dimension);
                    println!("Metadata entries: {}", stats.metadata_count);
                    println!();
                    print!("{}", config.summary());
                }
            }
        }
    }

    Ok(())
}
