//! Ingestion progress reporting.
//!
//! Lets the user see which stage an upload is in while the (blocking)
//! pipeline runs: extracting text, chunking, embedding n / total, indexing.
//! Progress is emitted on **stderr** so stdout stays clean for answers.

use std::io::Write;
use std::sync::Arc;

/// A single progress event for one ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestEvent {
    /// Reading page text from the PDF.
    Extracting { document: String },
    /// Splitting `pages` pages into chunks.
    Chunking { document: String, pages: usize },
    /// `n` of `total` chunks embedded.
    Embedding {
        document: String,
        n: usize,
        total: usize,
    },
    /// Building the vector index.
    Indexing { document: String, chunks: usize },
    /// Finished.
    Done {
        document: String,
        pages: usize,
        chunks: usize,
        elapsed_ms: u64,
    },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait IngestProgress: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress on stderr: "ingest cv.pdf  embedding  64 / 120 chunks".
pub struct StderrProgress;

impl IngestProgress for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Extracting { document } => {
                format!("ingest {}  extracting text...\n", document)
            }
            IngestEvent::Chunking { document, pages } => {
                format!("ingest {}  chunking {} pages\n", document, pages)
            }
            IngestEvent::Embedding { document, n, total } => format!(
                "ingest {}  embedding  {} / {} chunks\n",
                document,
                format_number(*n as u64),
                format_number(*total as u64)
            ),
            IngestEvent::Indexing { document, chunks } => {
                format!("ingest {}  indexing {} chunks\n", document, chunks)
            }
            IngestEvent::Done {
                document,
                pages,
                chunks,
                elapsed_ms,
            } => format!(
                "ingest {}  complete: {} pages, {} chunks ({:.1}s)\n",
                document,
                pages,
                chunks,
                *elapsed_ms as f64 / 1000.0
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgress for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Extracting { document } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "extracting"
            }),
            IngestEvent::Chunking { document, pages } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "chunking",
                "pages": pages
            }),
            IngestEvent::Embedding { document, n, total } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IngestEvent::Indexing { document, chunks } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "indexing",
                "chunks": chunks
            }),
            IngestEvent::Done {
                document,
                pages,
                chunks,
                elapsed_ms,
            } => serde_json::json!({
                "event": "done",
                "document": document,
                "pages": pages,
                "chunks": chunks,
                "elapsed_ms": elapsed_ms
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgress for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn IngestProgress> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
