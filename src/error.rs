//! Error type shared by every pipeline stage.
//!
//! Each stage (loader, embedder, index, generator) returns
//! [`AdvisorError`] values instead of panicking, so the session layer can
//! refuse to commit partial state and the server can translate failures
//! into a single user-visible message.

use thiserror::Error;

/// Convenience alias used across the library.
pub type Result<T, E = AdvisorError> = std::result::Result<T, E>;

/// Every failure the ingestion and answering pipeline can produce.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    #[error("cannot build empty index")]
    EmptyIndex,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("no API token configured; set one before asking questions")]
    MissingCredential,

    #[error("authentication rejected by model endpoint: {0}")]
    Unauthorized(String),

    #[error("answer generation failed: {0}")]
    Generation(String),

    #[error("no document processed; upload a PDF first")]
    NoDocument,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The four user-facing failure classes, plus `Internal` for faults that are
/// nobody's input (a crashed worker task, a poisoned lock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable PDF, empty chunk set, embedding model failure.
    Ingestion,
    /// Missing or rejected API token.
    Authentication,
    /// Transport, timeout or quota failure from the hosted model.
    Generation,
    /// Caller broke a precondition (no document, blank question, bad config).
    Usage,
    Internal,
}

impl AdvisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdvisorError::Ingestion(_) | AdvisorError::EmptyIndex | AdvisorError::Embedding(_) => {
                ErrorKind::Ingestion
            }
            AdvisorError::MissingCredential | AdvisorError::Unauthorized(_) => {
                ErrorKind::Authentication
            }
            AdvisorError::Generation(_) => ErrorKind::Generation,
            AdvisorError::Internal(_) => ErrorKind::Internal,
            AdvisorError::NoDocument | AdvisorError::InvalidInput(_) | AdvisorError::Config(_) => {
                ErrorKind::Usage
            }
        }
    }
}

impl From<reqwest::Error> for AdvisorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdvisorError::Generation(format!("request timed out: {}", e))
        } else {
            AdvisorError::Generation(e.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for AdvisorError {
    fn from(e: tokio::task::JoinError) -> Self {
        AdvisorError::Internal(format!("background task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(AdvisorError::EmptyIndex.kind(), ErrorKind::Ingestion);
        assert_eq!(
            AdvisorError::Embedding("weights missing".into()).kind(),
            ErrorKind::Ingestion
        );
        assert_eq!(AdvisorError::MissingCredential.kind(), ErrorKind::Authentication);
        assert_eq!(
            AdvisorError::Generation("503".into()).kind(),
            ErrorKind::Generation
        );
        assert_eq!(AdvisorError::NoDocument.kind(), ErrorKind::Usage);
        assert_eq!(
            AdvisorError::Internal("join".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn messages_are_user_readable() {
        assert_eq!(AdvisorError::EmptyIndex.to_string(), "cannot build empty index");
        assert!(AdvisorError::NoDocument.to_string().contains("upload a PDF"));
    }
}
