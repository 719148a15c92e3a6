//! Similarity search over chunk embeddings.

pub mod vector;
