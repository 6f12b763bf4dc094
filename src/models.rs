//! Core data models that flow through the ingestion and chat pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Text of one physical PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub text: String,
    /// 1-based, in document order.
    pub page_number: u32,
    /// File name (or path) the page was read from.
    pub source: String,
}

/// A bounded slice of page text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub source_page: u32,
    /// Contiguous from 0 across the whole document.
    pub chunk_index: usize,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// What makes two uploads "the same file": name and content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentIdentity {
    pub name: String,
    pub sha256: String,
}

impl DocumentIdentity {
    pub fn from_upload(name: &str, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            name: name.to_string(),
            sha256: hex::encode(hasher.finalize()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the chat transcript. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Numbers shown next to the transcript. Not persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub messages: usize,
    pub questions: usize,
    pub document: Option<String>,
    pub pages: usize,
    pub chunks: usize,
    pub ingest_seconds: Option<f64>,
}
