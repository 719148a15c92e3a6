use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use crate::chunking::split_documents;
use crate::error::AppError;
use crate::git::{clone_repo, load_documents, repo_name_from_url, validate_repo_url, LoadReport};
use crate::models::{
    AnalysisResult, AnalyzeRepoParams, AnswerResult, AskQuestionParams, Chunk,
};
use crate::state::AppState;
use crate::workspace::RepoRecord;

/// POST /analyze-repo - Clone a repo into a fresh workspace, load and chunk it.
pub async fn analyze_repo(
    State(state): State<AppState>,
    params: Result<Query<AnalyzeRepoParams>, QueryRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Query(params) = params.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let url = params.repo_url.trim().to_string();
    validate_repo_url(&url, state.config.allow_local_urls).map_err(AppError::InvalidRequest)?;
    let name = repo_name_from_url(&url).ok_or_else(|| {
        AppError::InvalidRequest(format!("Cannot derive a repository name from {url}"))
    })?;

    let mut lease = state.workspaces.create().await.map_err(AppError::Workspace)?;
    let repo_dir = lease.dir().join(&name);

    let (report, chunks) = match clone_and_chunk(&state, &url, &repo_dir).await {
        Ok(result) => result,
        Err(e) => {
            if let Err(cleanup) = state.workspaces.discard(lease) {
                tracing::warn!("Failed to clean up workspace after error: {cleanup:#}");
            }
            return Err(e);
        }
    };

    state
        .workspaces
        .commit(
            &mut lease,
            RepoRecord {
                name: name.clone(),
                url: url.clone(),
            },
        )
        .await
        .map_err(AppError::Workspace)?;

    tracing::info!(
        "Analysed {name}: {} files, {} chunks, {} skipped (workspace {})",
        report.documents.len(),
        chunks.len(),
        report.skipped,
        lease.id()
    );

    Ok(Json(AnalysisResult {
        status: "Success".to_string(),
        repo: name,
        chunks: chunks.len(),
        mode: state.mode(),
        workspace_id: lease.id(),
        files: report.documents.len(),
        skipped_files: report.skipped,
    }))
}

async fn clone_and_chunk(
    state: &AppState,
    url: &str,
    repo_dir: &Path,
) -> Result<(LoadReport, Vec<Chunk>), AppError> {
    // Limits concurrent clones; released only when the clone thread exits.
    let permit = state
        .clone_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Clone semaphore closed")))?;

    let timeout = Duration::from_secs(state.config.clone_timeout_secs);
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel.clone();
    let url_owned = url.to_string();
    let repo_dir_clone = repo_dir.to_path_buf();
    let git_token = state.config.git_token.clone();

    let mut clone_task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        clone_repo(&url_owned, &repo_dir_clone, git_token.as_deref(), &cancel_clone)
    });

    match tokio::time::timeout(timeout, &mut clone_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(AppError::Clone(e)),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            // The workspace is discarded by the caller, so wait until git stops writing.
            if let Err(e) = clone_task.await {
                tracing::warn!("Cancelled clone task failed: {e}");
            }
            return Err(AppError::Timeout(format!(
                "Clone timed out after {}s",
                state.config.clone_timeout_secs
            )));
        }
    }

    let options = state.load_options();
    let repo_dir_walk: PathBuf = repo_dir.to_path_buf();
    let report = tokio::task::spawn_blocking(move || load_documents(&repo_dir_walk, &options))
        .await?
        .map_err(AppError::Load)?;

    let chunks = split_documents(&state.splitter, &report.documents);
    Ok((report, chunks))
}

/// POST /ask-question - Answer a question about an analysed repo.
pub async fn ask_question(
    State(state): State<AppState>,
    params: Result<Query<AskQuestionParams>, QueryRejection>,
) -> Result<Json<AnswerResult>, AppError> {
    let Query(params) = params.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    // Held until the answer is built so the workspace cannot be evicted mid-read.
    let lease = state.workspaces.acquire(params.workspace_id).await;
    let repo_dir = lease.as_ref().and_then(|l| l.repo_dir());
    if let Some(repo) = lease.as_ref().and_then(|l| l.repo()) {
        tracing::debug!("Answering against {} ({})", repo.name, repo.url);
    }

    let answer = state
        .answerer
        .answer(&params.question, repo_dir.as_deref())
        .await?;

    Ok(Json(AnswerResult {
        answer: answer.text,
        sources: answer.sources,
        workspace_id: lease.map(|l| l.id()),
    }))
}
