use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one analysed workspace on disk.
pub type WorkspaceId = Uuid;

/// A source file read from a cloned repo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDocument {
    pub content: String,
    /// Path relative to the repo root, `/`-separated
    pub source: String,
}

/// A bounded slice of a document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

/// Whether questions are answered by a hosted model or a canned response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Active,
    Mock,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Active => "Active",
            Mode::Mock => "Mock",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters for POST /analyze-repo
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRepoParams {
    #[serde(default)]
    pub repo_url: String,
}

/// Response of POST /analyze-repo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: String,
    pub repo: String,
    pub chunks: usize,
    pub mode: Mode,
    pub workspace_id: WorkspaceId,
    /// Source files loaded
    pub files: usize,
    /// Source files that could not be read and were skipped
    pub skipped_files: usize,
}

/// Query parameters for POST /ask-question
#[derive(Debug, Clone, Deserialize)]
pub struct AskQuestionParams {
    #[serde(default)]
    pub question: String,
    /// Workspace returned by /analyze-repo; the latest one is used when absent
    pub workspace_id: Option<WorkspaceId>,
}

/// An answer plus the files it was grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Response of POST /ask-question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
}

/// Classification of an uploaded table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStatus {
    Spaghetti,
    Clean,
}

impl DataStatus {
    pub fn from_missing(missing: usize) -> Self {
        if missing == 0 {
            DataStatus::Clean
        } else {
            DataStatus::Spaghetti
        }
    }
}

/// Response of POST /analyze-data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularReport {
    pub filename: String,
    pub missing: usize,
    pub status: DataStatus,
    pub rows: usize,
    pub columns: usize,
}
