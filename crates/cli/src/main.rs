//! MediBot CLI
//!
//! Builds the medical PDF index and chats with Gemini from the terminal.

mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use medibot_agents::chat::SOURCES_HEADER;
use medibot_agents::pdf::resolve_pdf_paths;
use medibot_agents::retrieval::DEFAULT_TOP_K;
use medibot_agents::{ChatAgent, GeminiClient, IngestAgent, IngestSummary, RetrievalAgent};
use medibot_core::document::display_name;
use medibot_core::splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use medibot_core::{RecursiveSplitter, SplitterConfig};
use medibot_db::{init_memory, init_persistent, HistoryStore, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PDF_GLOB: &str = "data/**/*.pdf";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PROFILE: &str = "default";

/// MediBot - A medical chatbot grounded in your PDF library
#[derive(Parser)]
#[command(name = "medibot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Vector store path (defaults to ~/.medibot/vectorstore)
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    /// Chat history directory (defaults to ~/.medibot/chat_histories)
    #[arg(long, global = true)]
    history_dir: Option<PathBuf>,

    /// Use in-memory database (for testing)
    #[arg(long, global = true)]
    memory: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, split and embed PDFs into the vector store
    BuildIndex {
        /// Glob of PDF files, or a directory to search recursively
        #[arg(long, alias = "pdf_path", default_value = DEFAULT_PDF_GLOB)]
        pdf_path: String,

        /// Maximum characters per chunk
        #[arg(long, alias = "chunk_size", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Characters shared by consecutive chunks
        #[arg(long, alias = "chunk_overlap", default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
    },

    /// Interactive chat
    Chat {
        /// Whose chat history to use
        #[arg(short, long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Start with sources turned on
        #[arg(short, long)]
        sources: bool,
    },

    /// Ask a single question
    Ask {
        question: String,

        /// Append supporting passages from the index
        #[arg(short, long)]
        sources: bool,
    },

    /// Show the passages retrieved for a query
    Search {
        query: String,

        /// Number of passages
        #[arg(short, default_value_t = DEFAULT_TOP_K)]
        k: usize,
    },

    /// Inspect or clear saved chats
    History {
        /// Whose chat history to use
        #[arg(short, long, global = true, default_value = DEFAULT_PROFILE)]
        profile: String,

        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show index statistics
    Stats,

    /// Delete the local vector store (fresh start)
    ResetDb,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List chats, newest first
    List,

    /// Print one chat
    Show { id: String },

    /// Export one chat as markdown
    Export {
        id: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete saved chats
    Clear {
        /// Keep the most recent chat
        #[arg(long)]
        keep_current: bool,
    },
}

/// Where state lives, resolved from flags and the home directory
struct Settings {
    db_path: PathBuf,
    history_dir: PathBuf,
    memory: bool,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let home = || -> Result<PathBuf> {
            let mut path = dirs::home_dir().context("Could not find home directory")?;
            path.push(".medibot");
            Ok(path)
        };

        let db_path = match &cli.db_path {
            Some(path) => path.clone(),
            None => home()?.join("vectorstore"),
        };
        let history_dir = match &cli.history_dir {
            Some(path) => path.clone(),
            None => home()?.join("chat_histories"),
        };

        Ok(Self {
            db_path,
            history_dir,
            memory: cli.memory,
        })
    }

    async fn open_store(&self) -> Result<VectorStore> {
        let db = if self.memory {
            info!("Using in-memory database");
            init_memory().await?
        } else {
            if let Some(parent) = self.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            info!("Using database at: {}", self.db_path.display());
            init_persistent(&self.db_path)
                .await
                .with_context(|| format!("Failed to open database at {}", self.db_path.display()))?
        };
        Ok(VectorStore::new(db))
    }

    fn history_store(&self) -> HistoryStore {
        HistoryStore::new(&self.history_dir)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{default_level},surrealdb=warn,surrealdb_core=warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_cli(&cli)?;

    // Execute command
    match cli.command {
        Commands::BuildIndex {
            pdf_path,
            chunk_size,
            chunk_overlap,
        } => {
            cmd_build_index(&settings, &pdf_path, chunk_size, chunk_overlap).await?;
        }
        Commands::Chat { profile, sources } => {
            cmd_chat(&settings, profile, sources).await?;
        }
        Commands::Ask { question, sources } => {
            cmd_ask(&settings, &question, sources).await?;
        }
        Commands::Search { query, k } => {
            cmd_search(&settings, &query, k).await?;
        }
        Commands::History { profile, action } => {
            cmd_history(&settings, &profile, action)?;
        }
        Commands::Stats => {
            cmd_stats(&settings).await?;
        }
        Commands::ResetDb => {
            cmd_reset_db(&settings)?;
        }
    }

    Ok(())
}

async fn cmd_build_index(
    settings: &Settings,
    pdf_path: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<()> {
    let gemini = Arc::new(GeminiClient::from_env()?);
    let splitter = RecursiveSplitter::new(SplitterConfig::new(chunk_size, chunk_overlap))?;

    if pdf_path == DEFAULT_PDF_GLOB && !Path::new(DEFAULT_DATA_DIR).exists() {
        std::fs::create_dir_all(DEFAULT_DATA_DIR)?;
        println!(
            "Created '{}' directory. Please add your medical PDF files to it and run build-index again.",
            DEFAULT_DATA_DIR
        );
        return Ok(());
    }

    let paths = resolve_pdf_paths(pdf_path)?;
    if paths.is_empty() {
        anyhow::bail!("No PDF files match {}", pdf_path);
    }
    println!("Found {} PDF files", paths.len());

    let store = settings.open_store().await?;
    let ingest = IngestAgent::new(store, gemini, splitter);

    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(120));

    let mut summary = IngestSummary::default();
    for path in &paths {
        let source = path.display().to_string();
        progress.set_message(display_name(&source));
        let outcome = ingest.ingest_pdf(path).await;
        summary.record(&source, outcome);
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!("✓ Index build complete:");
    println!("  • Documents indexed: {}", summary.indexed());
    println!("  • Pages read: {}", summary.total_pages());
    println!("  • Chunks stored: {}", summary.total_chunks());

    if summary.skipped() > 0 {
        println!("  • Skipped (no extractable text): {}", summary.skipped());
        for report in summary.reports.iter().filter(|r| r.skipped) {
            println!("    - {}", report.source);
        }
    }

    if !summary.failed.is_empty() {
        println!("  • Failed: {}", summary.failed.len());
        for (source, error) in &summary.failed {
            println!("    - {}: {}", source, error);
        }
        if summary.indexed() == 0 {
            anyhow::bail!("No documents were indexed");
        }
    }

    Ok(())
}

async fn cmd_chat(settings: &Settings, profile: String, sources: bool) -> Result<()> {
    let gemini = Arc::new(GeminiClient::from_env()?);
    let history_store = settings.history_store();
    // Reject a bad profile before touching the database
    history_store.path_for(&profile)?;

    let store = settings.open_store().await?;
    let indexed = store.stats().await?.chunk_count > 0;
    let retrieval = RetrievalAgent::new(store, gemini.clone());
    let agent = ChatAgent::new(gemini).with_retrieval(retrieval);

    let mut repl = repl::Repl::new(agent, history_store, profile, sources)?;
    if !indexed {
        println!("The index is empty; run `medibot build-index` to enable sources.");
    }
    repl.run().await
}

async fn cmd_ask(settings: &Settings, question: &str, sources: bool) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let gemini = Arc::new(GeminiClient::from_env()?);
    let mut agent = ChatAgent::new(gemini.clone());
    if sources {
        let store = settings.open_store().await?;
        agent = agent.with_retrieval(RetrievalAgent::new(store, gemini));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let reply = agent.general_answer(question, sources).await;
    spinner.finish_and_clear();

    let reply = reply?;
    println!("{}", reply.answer);
    match &reply.digest {
        Some(digest) => println!("{}{}", SOURCES_HEADER, digest),
        None if sources => println!("\n(No supporting passages found in the index.)"),
        None => {}
    }

    Ok(())
}

async fn cmd_search(settings: &Settings, query: &str, k: usize) -> Result<()> {
    let gemini = Arc::new(GeminiClient::from_env()?);
    let store = settings.open_store().await?;
    let retrieval = RetrievalAgent::new(store, gemini).with_top_k(k);

    let results = retrieval.retrieve(query).await?;
    if results.is_empty() {
        println!("No results found. Build the index with: medibot build-index");
        return Ok(());
    }

    println!("Found {} results:\n", results.len());

    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. {} (page {}, chunk {})",
            i + 1,
            display_name(&r.source),
            r.page + 1,
            r.chunk_index
        );
        println!("   Score: {:.3}", r.score);

        let preview: String = r.content.chars().take(200).collect();
        let preview = preview.replace('\n', " ");
        println!(
            "   {}{}",
            preview,
            if r.content.chars().count() > 200 { "..." } else { "" }
        );
        println!();
    }

    Ok(())
}

fn cmd_history(settings: &Settings, profile: &str, action: HistoryAction) -> Result<()> {
    let store = settings.history_store();
    let mut history = store.load(profile)?;

    match action {
        HistoryAction::List => {
            if history.is_empty() {
                println!("No saved chats for '{}'.", profile);
                return Ok(());
            }

            println!("Chats for '{}' ({}):\n", profile, history.len());
            for session in history.sessions_newest_first() {
                println!("• {} [{}]", session.title, session.id);
                println!(
                    "  {} · {} messages",
                    session.timestamp,
                    session.messages.len()
                );
            }
        }
        HistoryAction::Show { id } => {
            let session = history.require(&id)?;
            println!("{} ({})\n", session.title, session.timestamp);
            for message in &session.messages {
                println!("{}: {}\n", message.role, message.content);
            }
        }
        HistoryAction::Export { id, output } => {
            let markdown = history.require(&id)?.to_markdown();
            match output {
                Some(path) => {
                    std::fs::write(&path, markdown)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✓ Exported {} to {}", id, path.display());
                }
                None => print!("{}", markdown),
            }
        }
        HistoryAction::Clear { keep_current } => {
            let kept = if keep_current {
                history.latest().map(|s| s.id.clone())
            } else {
                None
            };
            match &kept {
                Some(id) => history.retain_only(id),
                None => history.clear(),
            }
            store.save(profile, &history)?;

            match kept {
                Some(id) => println!("✓ Cleared chat history, kept {}", id),
                None => println!("✓ Cleared chat history for '{}'", profile),
            }
        }
    }

    Ok(())
}

async fn cmd_stats(settings: &Settings) -> Result<()> {
    let store = settings.open_store().await?;
    let stats = store.stats().await?;

    println!("Index Statistics:");
    println!("  • Documents: {}", stats.document_count);
    println!("  • Chunks: {}", stats.chunk_count);
    match (&stats.embedding_model, stats.dimension) {
        (Some(model), Some(dimension)) => {
            println!("  • Embedding model: {} ({} dimensions)", model, dimension)
        }
        _ => println!("  • Embedding model: (none, index is empty)"),
    }

    let documents = store.list_documents().await?;
    if !documents.is_empty() {
        println!("\nDocuments:");
        for doc in documents {
            println!(
                "  • {} - {} pages, {} chunks{}",
                doc.title,
                doc.page_count,
                doc.chunk_count,
                doc.ingested_at
                    .map(|at| format!(" (indexed {})", at))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn cmd_reset_db(settings: &Settings) -> Result<()> {
    if settings.memory {
        println!("In-memory database, nothing to remove");
        return Ok(());
    }

    let path = &settings.db_path;
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove db at {}", path.display()))?;
        println!("✓ Removed database at {}", path.display());
    } else {
        println!("Database not found at {}, nothing to remove", path.display());
    }

    Ok(())
}
