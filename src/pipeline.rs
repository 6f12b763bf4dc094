//! Ingestion pipeline orchestration.
//!
//! Coordinates one upload: PDF bytes → pages → chunks → vectors → index.
//! Every stage boundary returns a `Result`, and nothing is handed back until
//! the index is complete, so a failure at any stage leaves the caller's
//! state untouched.
//!
//! The pipeline is synchronous and CPU-bound. Async callers run it on
//! `tokio::task::spawn_blocking`.

use std::time::{Duration, Instant};

use tracing::info;

use crate::chunk::chunk_pages;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{AdvisorError, Result};
use crate::index::VectorIndex;
use crate::loader::load_pdf_bytes;
use crate::models::{Chunk, DocumentIdentity, PageRecord};
use crate::progress::{IngestEvent, IngestProgress};

/// A fully indexed document, ready to be installed in a session.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub identity: DocumentIdentity,
    pub index: VectorIndex,
    pub page_count: usize,
    pub chunk_count: usize,
    pub elapsed: Duration,
}

/// Extract and chunk without embedding.
///
/// # Errors
///
/// [`AdvisorError::Ingestion`] when no text could be extracted or no chunk
/// was produced.
pub fn prepare_chunks(
    bytes: &[u8],
    name: &str,
    config: &Config,
    progress: &dyn IngestProgress,
) -> Result<(Vec<PageRecord>, Vec<Chunk>)> {
    progress.report(IngestEvent::Extracting {
        document: name.to_string(),
    });
    let pages = load_pdf_bytes(bytes, name);
    if pages.is_empty() {
        return Err(AdvisorError::Ingestion(format!(
            "text extraction failed for '{}': the PDF is unreadable, encrypted, or has no text",
            name
        )));
    }

    progress.report(IngestEvent::Chunking {
        document: name.to_string(),
        pages: pages.len(),
    });
    let chunks = chunk_pages(&pages, &config.chunking);
    if chunks.is_empty() {
        return Err(AdvisorError::Ingestion(format!(
            "'{}' produced no text chunks",
            name
        )));
    }

    Ok((pages, chunks))
}

/// Run the full ingestion pipeline for one upload.
pub fn ingest_pdf(
    bytes: &[u8],
    identity: DocumentIdentity,
    config: &Config,
    embedder: &dyn Embedder,
    progress: &dyn IngestProgress,
) -> Result<IngestedDocument> {
    let started = Instant::now();
    let name = identity.name.clone();

    let (pages, chunks) = prepare_chunks(bytes, &name, config, progress)?;

    let vectors = embed_chunks(&chunks, &name, config.embedding.batch_size, embedder, progress)?;

    progress.report(IngestEvent::Indexing {
        document: name.clone(),
        chunks: chunks.len(),
    });
    let page_count = pages.len();
    let chunk_count = chunks.len();
    let index = VectorIndex::build(chunks, vectors)?;

    let elapsed = started.elapsed();
    progress.report(IngestEvent::Done {
        document: name.clone(),
        pages: page_count,
        chunks: chunk_count,
        elapsed_ms: elapsed.as_millis() as u64,
    });
    info!(
        document = %name,
        pages = page_count,
        chunks = chunk_count,
        model = embedder.model_name(),
        elapsed_ms = elapsed.as_millis() as u64,
        "document indexed"
    );

    Ok(IngestedDocument {
        identity,
        index,
        page_count,
        chunk_count,
        elapsed,
    })
}

fn embed_chunks(
    chunks: &[Chunk],
    name: &str,
    batch_size: usize,
    embedder: &dyn Embedder,
    progress: &dyn IngestProgress,
) -> Result<Vec<Vec<f32>>> {
    let total = chunks.len();
    let mut vectors = Vec::with_capacity(total);

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed(&texts)?;
        if embedded.len() != texts.len() {
            return Err(AdvisorError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                embedded.len()
            )));
        }
        vectors.extend(embedded);
        progress.report(IngestEvent::Embedding {
            document: name.to_string(),
            n: vectors.len(),
            total,
        });
    }

    Ok(vectors)
}
