//! Scratch directories for cloned repositories.
//!
//! Every analysis gets its own directory `<root>/<workspace_id>/`, guarded by
//! an async mutex. Writers hold the lock while cloning and chunking, readers
//! hold it while loading, so nobody ever observes a half-populated tree.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::WorkspaceId;

/// The repository held by a committed workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRecord {
    pub name: String,
    pub url: String,
}

struct Entry {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
    repo: Option<RepoRecord>,
    committed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<WorkspaceId, Entry>,
    latest: Option<WorkspaceId>,
}

/// Exclusive access to one workspace for the lifetime of the value.
pub struct WorkspaceLease {
    id: WorkspaceId,
    dir: PathBuf,
    repo: Option<RepoRecord>,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceLease {
    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repo(&self) -> Option<&RepoRecord> {
        self.repo.as_ref()
    }

    /// Directory of the cloned working tree, once a repo has been committed.
    pub fn repo_dir(&self) -> Option<PathBuf> {
        self.repo.as_ref().map(|r| self.dir.join(&r.name))
    }
}

pub struct WorkspaceManager {
    root: PathBuf,
    retain: usize,
    registry: RwLock<Registry>,
}

impl WorkspaceManager {
    /// Open the workspace root, wiping anything left over from a previous run.
    pub fn new(root: impl Into<PathBuf>, retain: usize) -> Result<Self> {
        let root = root.into();
        reset_dir(&root)?;
        Ok(Self {
            root,
            retain: retain.max(1),
            registry: RwLock::new(Registry::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, empty workspace and lock it for the caller.
    pub async fn create(&self) -> Result<WorkspaceLease> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        reset_dir(&dir)?;

        let lock = Arc::new(Mutex::new(()));
        let guard = lock.clone().lock_owned().await;
        self.registry.write().entries.insert(
            id,
            Entry {
                dir: dir.clone(),
                lock,
                repo: None,
                committed_at: None,
            },
        );

        tracing::debug!("Created workspace {id} at {}", dir.display());
        Ok(WorkspaceLease {
            id,
            dir,
            repo: None,
            _guard: guard,
        })
    }

    /// Record a successful analysis and make it the latest workspace.
    ///
    /// Older committed workspaces beyond the retention limit are removed; each
    /// is locked first so an in-flight reader finishes before its files go.
    pub async fn commit(&self, lease: &mut WorkspaceLease, repo: RepoRecord) -> Result<()> {
        let evicted: Vec<(WorkspaceId, Entry)> = {
            let mut registry = self.registry.write();
            let now = Utc::now();
            let entry = registry
                .entries
                .get_mut(&lease.id)
                .with_context(|| format!("workspace {} is no longer registered", lease.id))?;
            entry.repo = Some(repo.clone());
            entry.committed_at = Some(now);
            registry.latest = Some(lease.id);

            let mut older: Vec<(WorkspaceId, DateTime<Utc>)> = registry
                .entries
                .iter()
                .filter(|(id, _)| **id != lease.id)
                .filter_map(|(id, e)| e.committed_at.map(|t| (*id, t)))
                .collect();
            // Newest first; the current workspace occupies one retained slot.
            older.sort_by(|a, b| b.1.cmp(&a.1));
            older
                .into_iter()
                .skip(self.retain - 1)
                .filter_map(|(id, _)| registry.entries.remove(&id).map(|e| (id, e)))
                .collect()
        };
        tracing::info!("Committed workspace {} for {} ({})", lease.id, repo.name, repo.url);
        lease.repo = Some(repo);

        for (id, entry) in evicted {
            let _guard = entry.lock.lock().await;
            if let Err(e) = remove_dir(&entry.dir) {
                tracing::warn!("Failed to remove evicted workspace {id}: {e:#}");
            } else {
                tracing::info!("Evicted workspace {id}");
            }
        }
        Ok(())
    }

    /// Remove a workspace whose analysis failed.
    pub fn discard(&self, lease: WorkspaceLease) -> Result<()> {
        {
            let mut registry = self.registry.write();
            registry.entries.remove(&lease.id);
            if registry.latest == Some(lease.id) {
                registry.latest = None;
            }
        }
        remove_dir(&lease.dir)
    }

    /// Lock a committed workspace: the given id, or the latest when `None`.
    /// Returns `None` when no committed workspace matches.
    pub async fn acquire(&self, id: Option<WorkspaceId>) -> Option<WorkspaceLease> {
        let (id, lock) = {
            let registry = self.registry.read();
            let id = id.or(registry.latest)?;
            let entry = registry.entries.get(&id)?;
            entry.repo.as_ref()?;
            (id, entry.lock.clone())
        };

        let guard = lock.lock_owned().await;

        // The workspace may have been evicted while we waited.
        let registry = self.registry.read();
        let entry = registry.entries.get(&id)?;
        Some(WorkspaceLease {
            id,
            dir: entry.dir.clone(),
            repo: entry.repo.clone(),
            _guard: guard,
        })
    }

    /// Id of the most recently committed workspace.
    pub fn latest(&self) -> Option<WorkspaceId> {
        self.registry.read().latest
    }

    /// Number of workspaces currently registered (committed or in progress).
    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Delete `path` if it exists, then recreate it empty.
pub fn reset_dir(path: &Path) -> Result<()> {
    remove_dir(path)?;
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

/// Recursively delete `path`. Read-only entries (git marks pack files that
/// way) are made writable and the delete is retried once.
pub fn remove_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::debug!("Clearing read-only flags under {}", path.display());
            make_writable(path);
            std::fs::remove_dir_all(path)
                .with_context(|| format!("Failed to remove {}", path.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

fn make_writable(path: &Path) {
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        if entry.path_is_symlink() {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            let mut perms = meta.permissions();
            if perms.readonly() {
                perms.set_readonly(false);
                let _ = std::fs::set_permissions(entry.path(), perms);
            }
        }
    }
}
