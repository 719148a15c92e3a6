use anyhow::{Context, Result};

use crate::llm::embeddings::Embedder;
use crate::models::Chunk;

/// A chunk and its embedding.
struct VectorEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Ephemeral in-memory index with cosine similarity search.
///
/// Built from scratch for every question; nothing is persisted.
pub struct SimilarityIndex {
    entries: Vec<VectorEntry>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk: Chunk,
    pub score: f32,
}

impl SimilarityIndex {
    /// Build an index. `embeddings` must be parallel with `chunks`.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() {
            anyhow::bail!("No code chunks to search; the repository has no loadable source files");
        }
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `limit` entries most similar to the query, best first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit> {
        let mut scored: Vec<(f32, &VectorEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Stable sort, descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                chunk: e.chunk.clone(),
                score,
            })
            .collect()
    }
}

/// Embed `chunks` and `question`, then return the `k` closest chunks.
pub async fn retrieve(
    embedder: &dyn Embedder,
    chunks: Vec<Chunk>,
    question: &str,
    k: usize,
) -> Result<Vec<Chunk>> {
    if chunks.is_empty() {
        anyhow::bail!("No code chunks to search; the repository has no loadable source files");
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder
        .embed(&texts)
        .await
        .context("Failed to embed code chunks")?;
    let index = SimilarityIndex::build(chunks, embeddings)?;

    let query = embedder
        .embed(&[question.to_string()])
        .await
        .context("Failed to embed question")?
        .into_iter()
        .next()
        .context("No embedding returned for question")?;

    let hits = index.search(&query, k);
    tracing::debug!(
        "Retrieved {} of {} chunks (best score {:.3})",
        hits.len(),
        index.len(),
        hits.first().map(|h| h.score).unwrap_or_default()
    );
    Ok(hits.into_iter().map(|h| h.chunk).collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
