use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding one subdirectory per analysed workspace
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Allowed CORS origins; `["*"]` allows everything
    pub cors_origins: Vec<String>,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// File extensions (without the dot) loaded from a cloned repo
    pub source_extensions: Vec<String>,
    /// Skip files that cannot be read as UTF-8 instead of failing the load
    pub skip_unreadable: bool,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one document
    pub chunk_overlap: usize,
    /// Number of chunks handed to the chat model
    pub top_k: usize,
    /// How many analysed workspaces are kept on disk
    pub retain_workspaces: usize,
    /// Maximum concurrent clone operations
    pub max_concurrent_clones: usize,
    /// Clone timeout in seconds
    pub clone_timeout_secs: u64,
    /// Maximum accepted upload size for the CSV endpoints
    pub max_upload_bytes: usize,
    /// Git personal access token for cloning private repos
    pub git_token: Option<String>,
    /// Accept `file://` URLs and absolute paths in `/analyze-repo`
    pub allow_local_urls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answering questions
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key; its presence switches the service from Mock to Active mode
    pub api_key: Option<String>,
    /// Upper bound on retrieval + generation for one question
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./temp_clones"),
            bind_addr: "127.0.0.1:8000".to_string(),
            cors_origins: vec!["*".to_string()],
            llm: LlmConfig::default(),
            source_extensions: vec!["py".to_string()],
            skip_unreadable: true,
            chunk_size: 2000,
            chunk_overlap: 200,
            top_k: 3,
            retain_workspaces: 1,
            max_concurrent_clones: 2,
            clone_timeout_secs: 300,
            max_upload_bytes: 10 * 1024 * 1024,
            git_token: None,
            allow_local_urls: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("UNSPAGHETTI_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("UNSPAGHETTI_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(origins) = lookup("UNSPAGHETTI_CORS_ORIGINS") {
            let list = split_list(&origins);
            if !list.is_empty() {
                config.cors_origins = list;
            }
        }
        if let Some(exts) = lookup("UNSPAGHETTI_SOURCE_EXTENSIONS") {
            let list: Vec<String> = split_list(&exts)
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect();
            if !list.is_empty() {
                config.source_extensions = list;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_SKIP_UNREADABLE") {
            if let Some(v) = parse_bool(&val) {
                config.skip_unreadable = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.chunk_size = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunk_overlap = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_TOP_K") {
            if let Ok(v) = val.parse() {
                config.top_k = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_RETAIN_WORKSPACES") {
            if let Ok(v) = val.parse() {
                config.retain_workspaces = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_MAX_CONCURRENT_CLONES") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_clones = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_CLONE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.clone_timeout_secs = v;
            }
        }
        if let Some(val) = lookup("UNSPAGHETTI_MAX_UPLOAD_BYTES") {
            if let Ok(v) = val.parse() {
                config.max_upload_bytes = v;
            }
        }
        if let Some(token) = lookup("UNSPAGHETTI_GIT_TOKEN") {
            config.git_token = non_empty(token);
        }
        if let Some(val) = lookup("UNSPAGHETTI_ALLOW_LOCAL_URLS") {
            if let Some(v) = parse_bool(&val) {
                config.allow_local_urls = v;
            }
        }

        // LLM config
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(model) = lookup("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        config.llm.api_key = lookup("LLM_API_KEY")
            .and_then(non_empty)
            .or_else(|| lookup("OPENAI_API_KEY").and_then(non_empty));
        if let Some(val) = lookup("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.timeout_secs = v;
            }
        }

        config
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be greater than zero");
        }
        if self.retain_workspaces == 0 {
            anyhow::bail!("at least one workspace must be retained");
        }
        if self.max_concurrent_clones == 0 {
            anyhow::bail!("max concurrent clones must be greater than zero");
        }
        Ok(())
    }

    /// True when a model credential is configured.
    pub fn is_live(&self) -> bool {
        self.llm.api_key.is_some()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_original_pipeline() {
        let config = config_from(&[]);
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.source_extensions, vec!["py"]);
        assert_eq!(config.data_dir, PathBuf::from("./temp_clones"));
        assert!(!config.is_live());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_enables_live_mode() {
        let config = config_from(&[("LLM_API_KEY", "sk-test")]);
        assert!(config.is_live());
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_openai_api_key_fallback() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-openai")]);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
    }

    #[test]
    fn test_blank_api_key_stays_mock() {
        let config = config_from(&[("LLM_API_KEY", "   ")]);
        assert!(!config.is_live());
    }

    #[test]
    fn test_extension_list_parsing() {
        let config = config_from(&[("UNSPAGHETTI_SOURCE_EXTENSIONS", ".py, RS ,,js")]);
        assert_eq!(config.source_extensions, vec!["py", "rs", "js"]);
    }

    #[test]
    fn test_cors_origin_list() {
        let config = config_from(&[(
            "UNSPAGHETTI_CORS_ORIGINS",
            "http://localhost:5173, https://example.com",
        )]);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "https://example.com"]
        );
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = config_from(&[("UNSPAGHETTI_CHUNK_SIZE", "lots")]);
        assert_eq!(config.chunk_size, 2000);
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let config = config_from(&[
            ("UNSPAGHETTI_CHUNK_SIZE", "100"),
            ("UNSPAGHETTI_CHUNK_OVERLAP", "100"),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_skip_unreadable_flag() {
        let config = config_from(&[("UNSPAGHETTI_SKIP_UNREADABLE", "false")]);
        assert!(!config.skip_unreadable);
    }

    #[test]
    fn test_local_urls_are_off_by_default() {
        assert!(!config_from(&[]).allow_local_urls);
        let config = config_from(&[("UNSPAGHETTI_ALLOW_LOCAL_URLS", "yes")]);
        assert!(config.allow_local_urls);
    }
}
