//! Question answering strategies.
//!
//! The service picks one [`Answerer`] at startup: [`LiveAnswerer`] when a
//! model credential is configured, [`MockAnswerer`] otherwise.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use crate::chunking::{split_documents, RecursiveSplitter};
use crate::config::Config;
use crate::error::AppError;
use crate::git::{load_documents, LoadOptions};
use crate::llm::completion::{ChatModel, HttpChatModel};
use crate::llm::embeddings::{Embedder, HttpEmbedder};
use crate::models::{Answer, Chunk, Mode};
use crate::search::vector::retrieve;

#[async_trait]
pub trait Answerer: Send + Sync {
    fn mode(&self) -> Mode;

    /// Answer `question` about the repository checked out at `repo_dir`.
    async fn answer(&self, question: &str, repo_dir: Option<&Path>) -> Result<Answer, AppError>;
}

/// Canned response used when no model credential is configured.
pub struct MockAnswerer;

pub const MOCK_SOURCE: &str = "mock_file.py";

pub fn mock_answer_text(question: &str) -> String {
    format!("MOCK ANSWER: I see you are asking about '{question}'. (Add API Key for real AI)")
}

#[async_trait]
impl Answerer for MockAnswerer {
    fn mode(&self) -> Mode {
        Mode::Mock
    }

    async fn answer(&self, question: &str, _repo_dir: Option<&Path>) -> Result<Answer, AppError> {
        Ok(Answer {
            text: mock_answer_text(question),
            sources: vec![MOCK_SOURCE.to_string()],
        })
    }
}

/// Retrieval-augmented answers from the hosted model.
pub struct LiveAnswerer {
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    splitter: RecursiveSplitter,
    load: LoadOptions,
    top_k: usize,
    timeout: Duration,
}

impl LiveAnswerer {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        splitter: RecursiveSplitter,
        load: LoadOptions,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            chat,
            embedder,
            splitter,
            load,
            top_k,
            timeout,
        }
    }

    async fn load_chunks(&self, repo_dir: PathBuf) -> Result<Vec<Chunk>, AppError> {
        let options = self.load.clone();
        let report =
            tokio::task::spawn_blocking(move || load_documents(&repo_dir, &options)).await?;
        let report = report.map_err(AppError::Load)?;
        Ok(split_documents(&self.splitter, &report.documents))
    }

    async fn retrieve_and_generate(
        &self,
        question: &str,
        repo_dir: &Path,
    ) -> Result<Answer, AppError> {
        let chunks = self.load_chunks(repo_dir.to_path_buf()).await?;

        let hits = retrieve(self.embedder.as_ref(), chunks, question, self.top_k)
            .await
            .map_err(AppError::Retrieval)?;

        let prompt = build_prompt(question, &hits);
        let text = self
            .chat
            .complete(&prompt)
            .await
            .context("Chat model call failed")
            .map_err(AppError::Generation)?;

        Ok(Answer {
            text,
            sources: hits.into_iter().map(|c| c.source).collect(),
        })
    }
}

#[async_trait]
impl Answerer for LiveAnswerer {
    fn mode(&self) -> Mode {
        Mode::Active
    }

    async fn answer(&self, question: &str, repo_dir: Option<&Path>) -> Result<Answer, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidRequest("question is required".to_string()));
        }
        let repo_dir = repo_dir.ok_or_else(|| {
            AppError::WorkspaceNotFound(
                "No analysed repository; call /analyze-repo first".to_string(),
            )
        })?;

        match tokio::time::timeout(self.timeout, self.retrieve_and_generate(question, repo_dir))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "Answering timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Build the answerer matching the configured credentials.
pub fn from_config(config: &Config, client: reqwest::Client) -> anyhow::Result<Arc<dyn Answerer>> {
    if !config.is_live() {
        return Ok(Arc::new(MockAnswerer));
    }

    let embedder: Arc<dyn Embedder> =
        Arc::new(HttpEmbedder::new(client.clone(), config.llm.clone()));
    let chat: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(client, config.llm.clone()));
    let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap)?;
    tracing::info!(
        "Live answering with {} (chunks of {} chars, {} overlap, top {})",
        config.llm.chat_model,
        splitter.chunk_size(),
        splitter.chunk_overlap(),
        config.top_k
    );
    Ok(Arc::new(LiveAnswerer::new(
        chat,
        embedder,
        splitter,
        LoadOptions {
            extensions: config.source_extensions.clone(),
            skip_unreadable: config.skip_unreadable,
        },
        config.top_k,
        Duration::from_secs(config.llm.timeout_secs),
    )))
}

/// Context block (chunks in retrieval order, newline-joined) followed by the question.
pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!("Context:\n{context}\n\nQuestion: {question}")
}
