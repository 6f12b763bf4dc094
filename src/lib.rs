//! # Resume Advisor
//!
//! Chat with a PDF resume. An uploaded PDF is split into overlapping text
//! chunks, embedded locally, and held in an in-memory vector index. Each
//! question retrieves the closest chunks and sends them, together with a
//! strict "answer only from this context" prompt, to a hosted chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────┐   ┌─────────────┐
//! │ Loader │──▶│ Chunker │──▶│ Embedder │──▶│ VectorIndex │
//! │  PDF   │   │  chars  │   │ fastembed│   │   cosine    │
//! └────────┘   └─────────┘   └──────────┘   └──────┬──────┘
//!                                                  │ top-k
//!                      ┌──────────┐          ┌─────▼─────┐
//!                      │ Session  │◀────────▶│ Generator │──▶ HF router
//!                      └────┬─────┘          └───────────┘
//!                 ┌─────────┴────────┐
//!                 ▼                  ▼
//!            ┌─────────┐        ┌─────────┐
//!            │   CLI   │        │  HTTP   │
//!            └─────────┘        └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export HUGGINGFACEHUB_API_TOKEN=hf_...
//! resume-advisor inspect cv.pdf
//! resume-advisor ask cv.pdf "What are the key skills?"
//! resume-advisor chat cv.pdf
//! resume-advisor serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Shared error type |
//! | [`models`] | Core data types |
//! | [`loader`] | PDF page extraction |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding providers |
//! | [`index`] | In-memory vector index |
//! | [`generate`] | Prompt assembly and the hosted chat model |
//! | [`pipeline`] | Upload ingestion |
//! | [`progress`] | Ingestion progress reporting |
//! | [`session`] | Per-session orchestration |
//! | [`server`] | HTTP chat server |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod session;
