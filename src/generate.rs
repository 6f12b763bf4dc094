//! Grounded answer generation.
//!
//! Retrieved chunks are stuffed into a fixed system prompt that restricts
//! the model to that context and prescribes an exact abstention sentence.
//! The question goes in a separate user message. The hosted model is reached
//! through the [`ChatModel`] trait; [`HuggingFaceChat`] speaks the
//! OpenAI-compatible chat-completions protocol served by the Hugging Face
//! router.
//!
//! Calls are never retried and never streamed: a transport, quota or
//! authentication failure surfaces as one error and no partial answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::{AdvisorError, Result};
use crate::models::ScoredChunk;

/// The sentence the model must answer with when the context is silent.
pub const ABSTENTION: &str = "This information is not present in the uploaded document.";

const SYSTEM_TEMPLATE: &str = "You are a helpful assistant for analyzing resumes. \
Use the following pieces of context to answer the question at the end.

If the answer is not present in the context, say \"{abstention}\"
Do not try to make up an answer.

Context:
{context}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Everything a [`ChatModel`] needs for one completion.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: &'a [PromptMessage],
    pub temperature: f32,
    pub max_tokens: u32,
    /// Bearer credential for the hosted endpoint.
    pub token: &'a str,
}

/// A hosted instruction-tuned chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Return the full completion text for `request`.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}

/// Join retrieved chunk texts, in retrieval order, into one context block.
pub fn render_context(context: &[ScoredChunk]) -> String {
    context
        .iter()
        .map(|c| c.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The two-message exchange sent to the model.
pub fn build_messages(question: &str, context: &[ScoredChunk]) -> Vec<PromptMessage> {
    let system = SYSTEM_TEMPLATE
        .replace("{abstention}", ABSTENTION)
        .replace("{context}", &render_context(context));
    vec![
        PromptMessage {
            role: PromptRole::System,
            content: system,
        },
        PromptMessage {
            role: PromptRole::User,
            content: question.to_string(),
        },
    ]
}

/// A generated answer plus the pages its context came from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Distinct source pages of the retrieved chunks, ascending.
    pub source_pages: Vec<u32>,
}

pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, config: &LlmConfig) -> Self {
        Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `question` from `context`.
    ///
    /// # Errors
    ///
    /// - [`AdvisorError::MissingCredential`] when `token` is absent or blank;
    ///   no request is made.
    /// - Whatever the model returns, unchanged.
    pub async fn answer(
        &self,
        question: &str,
        context: &[ScoredChunk],
        token: Option<&str>,
    ) -> Result<Answer> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AdvisorError::MissingCredential)?;

        let messages = build_messages(question, context);
        let request = ChatRequest {
            messages: &messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            token,
        };

        let started = std::time::Instant::now();
        let text = self.model.complete(&request).await?;
        info!(
            model = self.model.model_name(),
            context_chunks = context.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer generated"
        );

        let mut source_pages: Vec<u32> = context.iter().map(|c| c.chunk.source_page).collect();
        source_pages.sort_unstable();
        source_pages.dedup();

        Ok(Answer { text, source_pages })
    }
}

// ============ Hugging Face router (OpenAI-compatible) ============

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct HuggingFaceChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HuggingFaceChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for HuggingFaceChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", request.token))
            .map_err(|_| {
                AdvisorError::Unauthorized("API token contains invalid characters".into())
            })?;

        let body = CompletionRequest {
            model: &self.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "calling chat completions");
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = error_message(&body_text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AdvisorError::Unauthorized(format!("{}: {}", status, message))
                }
                _ => AdvisorError::Generation(format!(
                    "model endpoint returned {}: {}",
                    status, message
                )),
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            AdvisorError::Generation(format!("invalid chat completion response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AdvisorError::Generation("model returned an empty answer".to_string()))
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"error": "..."}`, `{"error": {"message": "..."}}` and plain text.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|json| {
        let error = json.get("error")?;
        error
            .as_str()
            .map(str::to_string)
            .or_else(|| error.get("message")?.as_str().map(str::to_string))
    });
    from_json.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "<empty body>".to_string()
        } else {
            trimmed.chars().take(500).collect()
        }
    })
}
