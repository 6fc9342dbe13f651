//! ChatForge CLI — ingest documents, search the knowledge base, and chat
//! with retrieval-augmented streaming answers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chatforge_agent::{ChatSession, GatedEmbedder};
use chatforge_core::config::ChatForgeConfig;
use chatforge_core::traits::{EmbeddingProvider, VectorStore};
use chatforge_core::types::{Chatbot, ChatMessage, KnowledgeItem, KnowledgeType, ToolSpec};
use chatforge_knowledge::{MemoryVectorStore, RagService, SearchOptions, SqliteVectorStore};
use chatforge_security::RateLimiter;

#[derive(Parser)]
#[command(name = "chatforge", version, about = "Embeddable RAG chatbot engine")]
struct Cli {
    /// Path to a config file (defaults to ~/.chatforge/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document into a workspace's knowledge base.
    Ingest {
        #[arg(long)]
        workspace: String,
        /// Display name for the document.
        #[arg(long)]
        name: String,
        /// Document kind: text, file, website, or qna.
        #[arg(long, default_value = "text")]
        kind: String,
        /// File to read; stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Search a workspace's knowledge base.
    Search {
        #[arg(long)]
        workspace: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        query: String,
    },
    /// Interactive chat grounded in a workspace's knowledge base.
    Chat {
        #[arg(long)]
        workspace: String,
        /// Persona / system instruction.
        #[arg(long)]
        persona: Option<String>,
        /// Enable the built-in lead-capture tool.
        #[arg(long)]
        lead_capture: bool,
        /// Enable provider-native web search.
        #[arg(long)]
        web_search: bool,
    },
    /// Show store contents and rate-limit settings.
    Status {
        #[arg(long)]
        workspace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chatforge=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ChatForgeConfig::load_from(path)?,
        None => ChatForgeConfig::load()?,
    };

    tracing::debug!(provider = %config.provider, store = %config.store.backend, "configuration loaded");

    let store = open_store(&config)?;
    let rag = Arc::new(RagService::new(store.clone()));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.limit,
        std::time::Duration::from_secs(config.rate_limit.window_secs),
    ));
    let provider = chatforge_providers::create_provider(&config)?;

    match cli.command {
        Command::Ingest { workspace, name, kind, file } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
                    buf
                }
            };

            let item = KnowledgeItem::new(&workspace, parse_kind(&kind)?, &name, content);
            let embedder = GatedEmbedder::new(provider.clone(), limiter.clone());
            let stored = rag.ingest(item, &embedder).await?;
            println!("Ingested \"{name}\" into workspace {workspace}: {stored} chunks stored.");
        }

        Command::Search { workspace, limit, query } => {
            let query_vec = provider.embed(&query).await?;
            let options = SearchOptions { limit, min_score: config.retrieval.min_score };
            let results = rag.search(&workspace, &query_vec, &options).await?;
            if results.is_empty() {
                println!("No matches.");
            }
            for (i, result) in results.iter().enumerate() {
                let snippet: String = result.chunk.text.chars().take(160).collect();
                println!("{}. [{:.3}] {}", i + 1, result.score, snippet.replace('\n', " "));
            }
        }

        Command::Chat { workspace, persona, lead_capture, web_search } => {
            let mut chatbot = Chatbot::new(&workspace, "cli", &config.model);
            chatbot.temperature = config.temperature;
            if let Some(persona) = persona {
                chatbot.system_instruction = persona;
            }
            if lead_capture {
                chatbot.tools.push(ToolSpec::LeadCapture);
            }
            if web_search {
                chatbot.tools.push(ToolSpec::WebSearch);
            }
            chatbot.validate()?;

            let session = ChatSession::new(
                chatbot,
                provider.clone(),
                provider.clone(),
                rag,
                limiter,
                Arc::new(chatforge_tools::MemoryLeadSink::new()),
            )
            .with_retrieval(config.retrieval.clone());

            run_chat_loop(&session).await?;
        }

        Command::Status { workspace } => {
            let status = limiter.status();
            println!(
                "Rate limit: {}/{} used this window ({}s window).",
                status.used, status.limit, config.rate_limit.window_secs
            );
            if let Some(workspace) = workspace {
                let items = store.get_items(&workspace).await?;
                let chunks = store.chunks_for(&workspace).await?;
                println!("Workspace {workspace}: {} items, {} chunks.", items.len(), chunks.len());
                for item in items {
                    println!("  - {} ({}, {:?})", item.name, item.kind, item.status);
                }
            }
        }
    }

    Ok(())
}

/// Read user lines, stream each reply, print sources after the turn.
async fn run_chat_loop(session: &ChatSession) -> Result<()> {
    let stdin = std::io::stdin();
    let mut history: Vec<ChatMessage> = Vec::new();

    println!("ChatForge — type a message, or \"exit\" to quit.");
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim().to_string();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        let mut stream = session.stream_reply(history.clone(), message.clone());
        let mut reply = String::new();
        let mut sources = Vec::new();

        print!("bot> ");
        std::io::stdout().flush()?;
        while let Some(fragment) = stream.next().await {
            print!("{}", fragment.text);
            std::io::stdout().flush()?;
            reply.push_str(&fragment.text);
            sources.extend(fragment.sources);
        }
        println!();
        if !sources.is_empty() {
            println!("sources:");
            for source in &sources {
                println!("  - {} <{}>", source.title, source.url);
            }
        }

        history.push(ChatMessage::user(&message));
        let mut model_turn = ChatMessage::model(&reply);
        model_turn.sources = sources;
        history.push(model_turn);
    }
    Ok(())
}

fn open_store(config: &ChatForgeConfig) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        "sqlite" => {
            let path = expand_tilde(&config.store.path);
            Ok(Arc::new(SqliteVectorStore::open(&path)?))
        }
        other => anyhow::bail!("unknown store backend: {other} (use \"memory\" or \"sqlite\")"),
    }
}

fn parse_kind(kind: &str) -> Result<KnowledgeType> {
    match kind {
        "text" => Ok(KnowledgeType::Text),
        "file" => Ok(KnowledgeType::File),
        "website" => Ok(KnowledgeType::Website),
        "qna" => Ok(KnowledgeType::QnA),
        other => anyhow::bail!("unknown kind: {other} (use text, file, website, or qna)"),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
