use std::sync::Arc;

use crate::answer::{self, Answerer};
use crate::chunking::RecursiveSplitter;
use crate::config::Config;
use crate::git::LoadOptions;
use crate::models::Mode;
use crate::workspace::WorkspaceManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub workspaces: Arc<WorkspaceManager>,
    pub answerer: Arc<dyn Answerer>,
    pub splitter: RecursiveSplitter,
    pub clone_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(config.llm.timeout_secs))
            .build()?;
        let answerer = answer::from_config(&config, http_client)?;

        Self::with_answerer(config, answerer)
    }

    /// Build state around an explicit answering strategy.
    pub fn with_answerer(config: Config, answerer: Arc<dyn Answerer>) -> anyhow::Result<Self> {
        config.validate()?;

        let workspaces = WorkspaceManager::new(&config.data_dir, config.retain_workspaces)?;
        let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let max_concurrent_clones = config.max_concurrent_clones;

        Ok(Self {
            config: Arc::new(config),
            workspaces: Arc::new(workspaces),
            answerer,
            splitter,
            clone_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_clones)),
        })
    }

    pub fn mode(&self) -> Mode {
        self.answerer.mode()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            extensions: self.config.source_extensions.clone(),
            skip_unreadable: self.config.skip_unreadable,
        }
    }
}
