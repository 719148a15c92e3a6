//! Clients for the hosted model provider.

pub mod completion;
pub mod embeddings;
