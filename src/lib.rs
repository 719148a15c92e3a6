//! # unspaghetti
//!
//! A small HTTP service with two independent features:
//!
//! - **Code Q&A**: clone a public git repository, split its source files into
//!   overlapping chunks, and answer natural-language questions about it by
//!   retrieving the most similar chunks and handing them to a chat model.
//!   Without a model credential the service runs in mock mode and returns a
//!   canned answer.
//! - **Tabular cleanup**: count missing cells in an uploaded CSV and return a
//!   copy with every missing cell replaced by `0`.
//!
//! ```text
//!  POST /analyze-repo ──► git clone ──► load *.py ──► chunk ──► workspace
//!                                                                 │
//!  POST /ask-question ──► acquire workspace ──► embed + top-k ──► chat model
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, workspaces and LLM settings
//! - [`error`] - `AppError` and its mapping onto HTTP status codes
//! - [`models`] - Shared data types: documents, chunks, request/response bodies
//! - [`workspace`] - Per-analysis scratch directories with locking and eviction
//! - [`git`] - Clone operations and source file loading
//! - [`chunking`] - Recursive character splitter
//! - [`llm::embeddings`] - Batch embedding generation via Ollama or OpenAI-compatible APIs
//! - [`llm::completion`] - Single-shot chat completion
//! - [`search::vector`] - Ephemeral cosine-similarity index
//! - [`answer`] - Mock and retrieval-augmented answering strategies
//! - [`tabular`] - CSV missing-value inspection and repair
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod answer;
pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod tabular;
pub mod workspace;
