//! Per-session orchestration.
//!
//! A [`Session`] owns one user's state: the active document and its index,
//! the chat transcript, and the API token. Shared, read-only machinery
//! (configuration, embedder, chat model) lives in an [`Engine`] that is
//! passed explicitly to every operation, so any number of sessions can run
//! side by side without global state.
//!
//! # Events
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`Session::upload`] | Index a new PDF; same file again is a no-op |
//! | [`Session::ask`] | Retrieve + generate; append user and assistant turns |
//! | [`Session::select_suggestion`] | Same as `ask` |
//! | [`Session::clear_history`] | Drop the transcript, keep the document |
//!
//! Failed operations never leave partial state behind: a failed upload keeps
//! the previous document, and a failed answer appends no assistant turn
//! (the question itself stays in the transcript, unanswered).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::error::{AdvisorError, Result};
use crate::generate::{AnswerGenerator, ChatModel, HuggingFaceChat};
use crate::index::VectorIndex;
use crate::models::{ChatMessage, DocumentIdentity, Role, SessionStats};
use crate::pipeline::{ingest_pdf, IngestedDocument};
use crate::progress::{IngestProgress, NoProgress};

/// Canned questions offered once a document is active.
pub const SUGGESTED_QUESTIONS: [&str; 4] = [
    "What are the key skills?",
    "Summarize work experience",
    "What certifications are listed?",
    "List the education background",
];

/// Shared machinery used by every session.
pub struct Engine {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    generator: AnswerGenerator,
    progress: Arc<dyn IngestProgress>,
}

impl Engine {
    /// `config` must already be validated.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatModel>) -> Self {
        let generator = AnswerGenerator::new(chat, &config.llm);
        Self {
            config: Arc::new(config),
            embedder,
            generator,
            progress: Arc::new(NoProgress),
        }
    }

    /// Build the embedder and the Hugging Face client named by `config`.
    ///
    /// Loading a local embedding model happens here, so a missing model
    /// fails startup rather than the first upload.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let embedder = create_embedder(&config.embedding)?;
        let chat: Arc<dyn ChatModel> = Arc::new(HuggingFaceChat::new(&config.llm)?);
        Ok(Self::new(config, embedder, chat))
    }

    pub fn with_progress(mut self, progress: Arc<dyn IngestProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }
}

/// The document a session is currently answering questions about.
#[derive(Debug, Clone)]
pub struct ActiveDocument {
    pub identity: DocumentIdentity,
    pub index: VectorIndex,
    pub page_count: usize,
    pub chunk_count: usize,
    pub ingest_elapsed: Duration,
}

impl From<IngestedDocument> for ActiveDocument {
    fn from(doc: IngestedDocument) -> Self {
        Self {
            identity: doc.identity,
            index: doc.index,
            page_count: doc.page_count,
            chunk_count: doc.chunk_count,
            ingest_elapsed: doc.elapsed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub sha256: String,
    pub pages: usize,
    pub chunks: usize,
    pub ingest_seconds: f64,
}

impl From<&ActiveDocument> for DocumentSummary {
    fn from(doc: &ActiveDocument) -> Self {
        Self {
            name: doc.identity.name.clone(),
            sha256: doc.identity.sha256.clone(),
            pages: doc.page_count,
            chunks: doc.chunk_count,
            ingest_seconds: doc.ingest_elapsed.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// A new index was built and installed.
    Indexed(DocumentSummary),
    /// The same file is already active; nothing was rebuilt.
    AlreadyActive(DocumentSummary),
}

/// The assistant turn produced by [`Session::ask`].
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub message: ChatMessage,
    pub source_pages: Vec<u32>,
}

#[derive(Default)]
pub struct Session {
    active: Option<ActiveDocument>,
    messages: Vec<ChatMessage>,
    api_token: Option<String>,
}

impl Session {
    pub fn new(api_token: Option<String>) -> Self {
        let mut session = Self::default();
        session.set_api_token(api_token);
        session
    }

    /// Replace the credential. Blank tokens clear it.
    pub fn set_api_token(&mut self, token: Option<String>) {
        self.api_token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    pub fn has_api_token(&self) -> bool {
        self.api_token.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn active_document(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    /// Index `bytes` as the session's document.
    ///
    /// Uploading the file that is already active returns
    /// [`UploadOutcome::AlreadyActive`] without touching the index. On any
    /// failure the previous document stays active. The transcript is never
    /// modified.
    pub async fn upload(
        &mut self,
        engine: &Engine,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome> {
        let identity = DocumentIdentity::from_upload(name, &bytes);
        if let Some(active) = &self.active {
            if active.identity == identity {
                info!(document = %name, "document already processed");
                return Ok(UploadOutcome::AlreadyActive(DocumentSummary::from(active)));
            }
        }

        let config = engine.config.clone();
        let embedder = engine.embedder.clone();
        let progress = engine.progress.clone();
        let ingested = tokio::task::spawn_blocking(move || {
            ingest_pdf(
                &bytes,
                identity,
                &config,
                embedder.as_ref(),
                progress.as_ref(),
            )
        })
        .await?
        .inspect_err(|e| warn!(document = %name, error = %e, "ingestion failed"))?;

        let active = ActiveDocument::from(ingested);
        let summary = DocumentSummary::from(&active);
        self.active = Some(active);
        Ok(UploadOutcome::Indexed(summary))
    }

    /// Answer `question` from the active document.
    ///
    /// Preconditions are checked, in this order, before anything is
    /// recorded: an active document, a non-blank question, an API token.
    /// Any of them failing leaves the transcript unchanged. After that the
    /// question is appended, and the answer is appended only if generation
    /// succeeds.
    ///
    /// A failure to embed the question is reported as
    /// [`AdvisorError::Internal`]; no ingestion is involved at this point.
    pub async fn ask(&mut self, engine: &Engine, question: &str) -> Result<Reply> {
        let active = self.active.as_ref().ok_or(AdvisorError::NoDocument)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }
        let token = self
            .api_token
            .clone()
            .ok_or(AdvisorError::MissingCredential)?;

        self.messages.push(ChatMessage::user(question));

        let embedder = engine.embedder.clone();
        let query_text = question.to_string();
        let query_vector =
            tokio::task::spawn_blocking(move || embed_query(embedder.as_ref(), &query_text))
                .await?
                .map_err(|e| match e {
                    AdvisorError::Embedding(msg) => {
                        AdvisorError::Internal(format!("could not embed question: {}", msg))
                    }
                    other => other,
                })?;

        let hits = active
            .index
            .query(&query_vector, engine.config.retrieval.top_k);

        let answer = engine
            .generator
            .answer(question, &hits, Some(&token))
            .await
            .inspect_err(|e| warn!(error = %e, "answer generation failed"))?;

        let message = ChatMessage::assistant(answer.text);
        self.messages.push(message.clone());
        Ok(Reply {
            message,
            source_pages: answer.source_pages,
        })
    }

    /// Ask one of the suggested questions (or any text; behaves as `ask`).
    pub async fn select_suggestion(&mut self, engine: &Engine, text: &str) -> Result<Reply> {
        self.ask(engine, text).await
    }

    /// Empty the transcript. The active document is unaffected.
    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            messages: self.messages.len(),
            questions: self
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .count(),
            document: self.active.as_ref().map(|a| a.identity.name.clone()),
            pages: self.active.as_ref().map_or(0, |a| a.page_count),
            chunks: self.active.as_ref().map_or(0, |a| a.chunk_count),
            ingest_seconds: self
                .active
                .as_ref()
                .map(|a| a.ingest_elapsed.as_secs_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::generate::ChatRequest;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
            Ok(format!("echo: {}", request.messages[1].content))
        }
    }

    fn engine() -> Engine {
        Engine::new(
            Config::default(),
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(Echo),
        )
    }

    #[tokio::test]
    async fn ask_without_document_is_rejected() {
        let engine = engine();
        let mut session = Session::new(Some("hf_x".into()));
        let err = session.ask(&engine, "What skills?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::NoDocument));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_reported_first() {
        let engine = engine();
        let mut session = Session::new(None);
        let err = session.ask(&engine, "   ").await.unwrap_err();
        assert!(matches!(err, AdvisorError::NoDocument));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_keeps_state() {
        let engine = engine();
        let mut session = Session::new(None);
        let err = session
            .upload(&engine, "broken.pdf", b"%PDF-1.4 garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Ingestion(_)));
        assert!(session.active_document().is_none());
        assert_eq!(session.stats().chunks, 0);
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AdvisorError::Embedding("inference session closed".into()))
        }
    }

    #[tokio::test]
    async fn question_embedding_failure_is_internal() {
        let engine = Engine::new(Config::default(), Arc::new(BrokenEmbedder), Arc::new(Echo));
        let chunk = crate::models::Chunk {
            text: "Skills: Rust".into(),
            source_page: 1,
            chunk_index: 0,
        };
        let mut session = Session::new(Some("hf_x".into()));
        session.active = Some(ActiveDocument {
            identity: DocumentIdentity::from_upload("cv.pdf", b"cv"),
            index: VectorIndex::build(vec![chunk], vec![vec![1.0, 0.0]]).unwrap(),
            page_count: 1,
            chunk_count: 1,
            ingest_elapsed: Duration::from_millis(5),
        });

        let err = session.ask(&engine, "What skills?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Internal(_)), "{:?}", err);
        assert!(err.to_string().contains("could not embed question"));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn blank_token_clears_credential() {
        let mut session = Session::new(Some("hf_abc".into()));
        assert!(session.has_api_token());
        session.set_api_token(Some("  ".into()));
        assert!(!session.has_api_token());
    }

    #[test]
    fn clear_history_on_empty_session() {
        let mut session = Session::new(None);
        session.clear_history();
        let stats = session.stats();
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.questions, 0);
        assert!(stats.document.is_none());
    }
}
