//! # Resume Advisor CLI (`resume-advisor`)
//!
//! Ask questions about a PDF resume. Answers come from a hosted chat model
//! and are grounded in the resume's own text.
//!
//! ## Usage
//!
//! ```bash
//! resume-advisor [--config ./config/advisor.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resume-advisor serve` | Start the HTTP chat server |
//! | `resume-advisor inspect <pdf>` | Show pages and chunks (no model calls) |
//! | `resume-advisor ask <pdf> "<question>"` | One-shot question |
//! | `resume-advisor chat <pdf>` | Interactive chat on stdin |
//!
//! The API token is read from `HUGGINGFACEHUB_API_TOKEN` (or the variable
//! named by `[llm].api_key_env`); a `.env` file in the working directory is
//! loaded first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resume_advisor::config::{self, Config};
use resume_advisor::error::ErrorKind;
use resume_advisor::pipeline::prepare_chunks;
use resume_advisor::progress::{NoProgress, ProgressMode};
use resume_advisor::server;
use resume_advisor::session::{Engine, Reply, Session, UploadOutcome, SUGGESTED_QUESTIONS};

/// Resume Advisor: chat with a PDF resume.
#[derive(Parser)]
#[command(
    name = "resume-advisor",
    about = "Chat with a PDF resume using local embeddings and a hosted LLM",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ingestion progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server on `[server].bind`.
    Serve,

    /// Extract and chunk a PDF, then print what would be indexed.
    ///
    /// Makes no model calls and needs no API token.
    Inspect {
        pdf: PathBuf,

        /// Number of chunk previews to print.
        #[arg(long, default_value_t = 5)]
        preview: usize,
    },

    /// Index a PDF and answer one question.
    Ask { pdf: PathBuf, question: String },

    /// Index a PDF and chat interactively.
    ///
    /// Commands: `/clear`, `/stats`, `/suggest <n>`, `/quit`.
    Chat { pdf: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resume_advisor=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let cfg = Config::default();
            cfg.validate()?;
            cfg
        }
    };
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Serve => {
            let engine = build_engine(cfg, progress)?;
            server::run_server(Arc::new(engine)).await?;
        }
        Commands::Inspect { pdf, preview } => {
            run_inspect(&cfg, &pdf, preview)?;
        }
        Commands::Ask { pdf, question } => {
            let token = require_token(&cfg)?;
            let engine = build_engine(cfg, progress)?;
            let mut session = Session::new(Some(token));
            upload_file(&mut session, &engine, &pdf).await?;
            let reply = session.ask(&engine, &question).await?;
            print_reply(&reply);
        }
        Commands::Chat { pdf } => {
            let token = require_token(&cfg)?;
            let engine = build_engine(cfg, progress)?;
            let mut session = Session::new(Some(token));
            upload_file(&mut session, &engine, &pdf).await?;
            run_chat(&mut session, &engine).await?;
        }
    }

    Ok(())
}

fn build_engine(cfg: Config, progress: ProgressMode) -> Result<Engine> {
    let engine = Engine::from_config(cfg).context("failed to initialise models")?;
    Ok(engine.with_progress(progress.reporter()))
}

fn require_token(cfg: &Config) -> Result<String> {
    match cfg.llm.api_token_from_env() {
        Some(token) => Ok(token),
        None => bail!(
            "no API token: set {} in the environment or in a .env file",
            cfg.llm.api_key_env
        ),
    }
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn upload_file(session: &mut Session, engine: &Engine, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    match session.upload(engine, &document_name(path), bytes).await? {
        UploadOutcome::Indexed(summary) | UploadOutcome::AlreadyActive(summary) => {
            eprintln!(
                "Indexed {}: {} pages, {} chunks ({:.2}s)",
                summary.name, summary.pages, summary.chunks, summary.ingest_seconds
            );
        }
    }
    Ok(())
}

fn run_inspect(cfg: &Config, path: &Path, preview: usize) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = document_name(path);
    let (pages, chunks) = prepare_chunks(&bytes, &name, cfg, &NoProgress)?;

    println!("{}", name);
    println!("  pages:  {}", pages.len());
    println!("  chunks: {}", chunks.len());
    println!(
        "  chunking: size {} / overlap {} (chars)",
        cfg.chunking.chunk_size, cfg.chunking.overlap
    );
    for chunk in chunks.iter().take(preview) {
        let snippet: String = chunk.text.chars().take(100).collect();
        println!(
            "\n[{}] page {} ({} chars)\n  {}",
            chunk.chunk_index,
            chunk.source_page,
            chunk.text.chars().count(),
            snippet.replace('\n', " ")
        );
    }
    if chunks.len() > preview {
        println!("\n... {} more", chunks.len() - preview);
    }
    Ok(())
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.message.content);
    if !reply.source_pages.is_empty() {
        let pages: Vec<String> = reply.source_pages.iter().map(u32::to_string).collect();
        println!("\n(context from page {})", pages.join(", "));
    }
}

async fn run_chat(session: &mut Session, engine: &Engine) -> Result<()> {
    println!("Suggested questions:");
    for (i, q) in SUGGESTED_QUESTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, q);
    }
    println!("Type a question, /suggest <n>, /stats, /clear or /quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/clear", _) => {
                session.clear_history();
                println!("History cleared.");
                continue;
            }
            ("/stats", _) => {
                let stats = session.stats();
                println!(
                    "messages: {}  questions: {}  pages: {}  chunks: {}  ingest: {:.2}s",
                    stats.messages,
                    stats.questions,
                    stats.pages,
                    stats.chunks,
                    stats.ingest_seconds.unwrap_or(0.0)
                );
                continue;
            }
            ("/suggest", arg) => match arg.trim().parse::<usize>() {
                Ok(n) if (1..=SUGGESTED_QUESTIONS.len()).contains(&n) => {
                    let question = SUGGESTED_QUESTIONS[n - 1];
                    println!("{}", question);
                    session.select_suggestion(engine, question).await
                }
                _ => {
                    println!("Usage: /suggest <1-{}>", SUGGESTED_QUESTIONS.len());
                    continue;
                }
            },
            _ => session.ask(engine, line).await,
        };

        match result {
            Ok(reply) => print_reply(&reply),
            // Auth failures will not fix themselves mid-session.
            Err(e) if e.kind() == ErrorKind::Authentication => return Err(e.into()),
            Err(e) => eprintln!("error: {}", e),
        }
        println!();
    }
    Ok(())
}
