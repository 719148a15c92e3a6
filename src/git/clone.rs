use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Check that a repository URL is something we are willing to clone.
///
/// Only remote transports are accepted unless `allow_local` is set, so a
/// caller cannot make the server copy arbitrary local directories.
pub fn validate_repo_url(url: &str, allow_local: bool) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("repo_url is required".to_string());
    }
    if url.starts_with("https://") || url.starts_with("git://") || url.starts_with("http://") {
        return Ok(());
    }
    if allow_local && (url.starts_with("file://") || Path::new(url).is_absolute()) {
        return Ok(());
    }
    Err("Only https://, http://, and git:// URLs are allowed".to_string())
}

/// Apply connect and read timeouts to every libgit2 network transport.
///
/// # Safety
/// Writes a libgit2 global without synchronization. Call it before any thread
/// that might use libgit2 is started.
pub unsafe fn set_transport_timeouts(timeout: Duration) -> Result<()> {
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    git2::opts::set_server_connect_timeout_in_milliseconds(millis)
        .context("Failed to set git connect timeout")?;
    git2::opts::set_server_timeout_in_milliseconds(millis)
        .context("Failed to set git read timeout")?;
    Ok(())
}

/// Derive a repository name from its URL: last path segment without `.git`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .trim_end_matches(".git")
        .to_string();

    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return None;
    }
    Some(name)
}

/// Clone a git repository into `target`.
///
/// `token` is sent as basic-auth credentials when the remote asks for them.
/// Setting `cancel` aborts the transfer at the next progress callback.
pub fn clone_repo(url: &str, target: &Path, token: Option<&str>, cancel: &AtomicBool) -> Result<()> {
    tracing::info!("Cloning {} into {}", url, target.display());

    let mut callbacks = git2::RemoteCallbacks::new();
    if let Some(token) = token {
        let token = token.to_string();
        callbacks.credentials(move |_url, username, _allowed| {
            git2::Cred::userpass_plaintext(username.unwrap_or("x-access-token"), &token)
        });
    }
    callbacks.transfer_progress(|_| !cancel.load(Ordering::Relaxed));
    callbacks.sideband_progress(|_| !cancel.load(Ordering::Relaxed));

    let mut fetch = git2::FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    let result = git2::build::RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, target);

    if cancel.load(Ordering::Relaxed) {
        anyhow::bail!("Clone of {url} was cancelled");
    }
    result.with_context(|| format!("Failed to clone {url}"))?;

    tracing::info!("Clone complete: {}", target.display());
    Ok(())
}
