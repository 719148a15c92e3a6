//! Document chunking: recursive character splitting with overlap.

pub mod recursive;

pub use recursive::RecursiveSplitter;

use crate::models::{Chunk, CodeDocument};

/// Split every document, tagging each chunk with its document's source path.
pub fn split_documents(splitter: &RecursiveSplitter, documents: &[CodeDocument]) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            splitter
                .split_text(&doc.content)
                .into_iter()
                .enumerate()
                .map(|(i, content)| Chunk {
                    content,
                    source: doc.source.clone(),
                    chunk_index: i,
                })
        })
        .collect()
}
