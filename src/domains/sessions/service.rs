use crate::domains::git::service as git;
use crate::domains::repos::RepoStore;
use crate::domains::sessions::entity::{CreatedSession, Session, SessionSummary, TerminalTab};
use crate::domains::sessions::lifecycle::bootstrapper::{BootstrapConfig, WorktreeBootstrapper};
use crate::domains::sessions::lifecycle::hooks::{SessionHook, run_hooks};
use crate::domains::sessions::lifecycle::removal::{RemovalConfig, RemovalCoordinator};
use crate::domains::sessions::repository::SessionDbManager;
use crate::shared::{format_branch_name, format_tab_branch_name, is_valid_component_id};
use anyhow::{Result, anyhow};
use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct CreateSessionParams {
    pub session_id: Option<String>,
    pub display_name: Option<String>,
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTabParams {
    pub tab_id: Option<String>,
    pub dedicated_worktree: bool,
    pub base_branch: Option<String>,
}

/// Session Lifecycle Manager. Creation and deletion for the same session id
/// are serialized by a per-id mutex; distinct sessions proceed in parallel.
/// All VCS work runs off the I/O path via `spawn_blocking`.
pub struct SessionManager {
    db_manager: SessionDbManager,
    store: RepoStore,
    hooks: Vec<Arc<dyn SessionHook>>,
    id_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(db_manager: SessionDbManager, store: RepoStore) -> Self {
        Self {
            db_manager,
            store,
            hooks: Vec::new(),
            id_locks: DashMap::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn SessionHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn store(&self) -> &RepoStore {
        &self.store
    }

    pub fn db_manager(&self) -> &SessionDbManager {
        &self.db_manager
    }

    fn id_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.id_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Idempotent create. Re-creating an id with a valid working copy
    /// returns the existing record untouched; an invalid record is
    /// reconciled (stale worktree, branch and record removed) and recreated
    /// under the same id.
    pub async fn create_session(
        &self,
        repo_id: &str,
        params: CreateSessionParams,
    ) -> Result<CreatedSession> {
        let repo_path = self.store.require_canonical(repo_id)?;

        let session_id = match params.session_id {
            Some(id) => {
                if !is_valid_component_id(&id) {
                    return Err(anyhow!(
                        "Invalid session id: use only letters, numbers, hyphens, underscores and dots"
                    ));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let lock = self.id_lock(&session_id);
        let _guard = lock.lock().await;

        log::info!("Creating session '{session_id}' in repository '{repo_id}'");

        let mut inherited_base_branch = None;
        if let Some(existing) = self.db_manager.get_session(repo_id, &session_id)? {
            if self.validate(&existing) {
                log::info!("Session '{session_id}' already exists with a valid worktree");
                self.db_manager.touch_session(&session_id);
                return Ok(CreatedSession {
                    session: existing,
                    is_existing: true,
                });
            }

            // Registry and filesystem disagree: heal by discarding the stale
            // record and falling through to a fresh create under the same id.
            inherited_base_branch = Some(existing.base_branch.clone());
            let coordinator = RemovalCoordinator::new(&repo_path, &self.db_manager);
            coordinator.remove_stale_artifacts(&existing).await?;
        }

        let base_branch = match params.base_branch.or(inherited_base_branch) {
            Some(branch) => branch,
            None => {
                let repo_path = repo_path.clone();
                tokio::task::spawn_blocking(move || git::get_default_branch(&repo_path))
                    .await
                    .map_err(|e| anyhow!("Task join error: {e}"))??
            }
        };

        let branch = format_branch_name(&session_id);
        let worktree_path = self.store.worktree_path(repo_id, &session_id)?;

        let bootstrap_result = {
            let repo_path = repo_path.clone();
            let session_id = session_id.clone();
            let branch = branch.clone();
            let base_branch = base_branch.clone();
            let worktree_path = worktree_path.clone();
            tokio::task::spawn_blocking(move || {
                cleanup_leftover_worktree(&repo_path, &worktree_path)?;
                let bootstrapper = WorktreeBootstrapper::new(&repo_path);
                bootstrapper.bootstrap_worktree(BootstrapConfig {
                    session_id: &session_id,
                    branch_name: &branch,
                    worktree_path: &worktree_path,
                    base_branch: &base_branch,
                })
            })
            .await
            .map_err(|e| anyhow!("Task join error: {e}"))??
        };

        let now = Utc::now();
        let session = Session {
            id: session_id.clone(),
            repository_id: repo_id.to_string(),
            display_name: params.display_name,
            branch: bootstrap_result.branch.clone(),
            base_branch: bootstrap_result.base_branch.clone(),
            base_commit: bootstrap_result.base_commit.clone(),
            worktree_path: bootstrap_result.worktree_path.clone(),
            created_at: now,
            updated_at: now,
            last_accessed_at: Some(now),
        };

        // The record is written only after the worktree is confirmed; a
        // failed insert rolls the worktree back so nothing is orphaned.
        if let Err(e) = self.db_manager.create_session(&session) {
            let repo_path = repo_path.clone();
            let branch = branch.clone();
            let worktree_path = worktree_path.clone();
            let _ = tokio::task::spawn_blocking(move || {
                WorktreeBootstrapper::new(&repo_path).rollback(&branch, &worktree_path);
            })
            .await;
            return Err(e);
        }

        run_hooks(&self.hooks, &session_id, &branch, &session.worktree_path).await;

        log::info!("Successfully created session '{session_id}'");
        Ok(CreatedSession {
            session,
            is_existing: false,
        })
    }

    /// Returns false when the session does not exist; cleanup steps are
    /// best-effort and convergent.
    pub async fn delete_session(&self, repo_id: &str, session_id: &str) -> Result<bool> {
        let lock = self.id_lock(session_id);
        let _guard = lock.lock().await;

        let Some(session) = self.db_manager.get_session(repo_id, session_id)? else {
            log::info!("Delete requested for unknown session '{session_id}'");
            return Ok(false);
        };

        let repo_path = self.store.require_canonical(repo_id)?;
        let coordinator = RemovalCoordinator::new(&repo_path, &self.db_manager);
        coordinator
            .remove_session(&session, RemovalConfig::default())
            .await?;
        Ok(true)
    }

    /// Cheap on-disk validity check: the worktree directory exists and git
    /// still recognizes it. No network.
    pub fn validate(&self, session: &Session) -> bool {
        git::is_git_workdir(&session.worktree_path)
    }

    pub fn get_session(&self, repo_id: &str, session_id: &str) -> Result<Option<Session>> {
        Ok(self.db_manager.get_session(repo_id, session_id)?.map(|s| {
            self.db_manager.touch_session(&s.id);
            s
        }))
    }

    /// Best-effort access bump.
    pub fn touch(&self, session_id: &str) {
        self.db_manager.touch_session(session_id);
    }

    pub fn rename_session(
        &self,
        repo_id: &str,
        session_id: &str,
        display_name: &str,
    ) -> Result<bool> {
        if self.db_manager.get_session(repo_id, session_id)?.is_none() {
            return Ok(false);
        }
        self.db_manager
            .update_display_name(session_id, display_name)?;
        Ok(true)
    }

    pub fn list_session_summaries(&self, repo_id: &str) -> Result<Vec<SessionSummary>> {
        let sessions = self.db_manager.list_sessions(repo_id)?;
        Ok(sessions
            .into_iter()
            .map(|session| {
                let is_valid = self.validate(&session);
                SessionSummary::from_session(session, is_valid)
            })
            .collect())
    }

    /// Create a terminal tab under a session. Same idempotent contract as
    /// sessions; with `dedicated_worktree` the tab gets its own nested
    /// branch + worktree, otherwise it runs in the parent's working copy.
    pub async fn create_tab(
        &self,
        repo_id: &str,
        session_id: &str,
        params: CreateTabParams,
    ) -> Result<(TerminalTab, bool)> {
        let session = self
            .db_manager
            .get_session(repo_id, session_id)?
            .ok_or_else(|| anyhow!("Session '{session_id}' not found"))?;

        let tab_id = match params.tab_id {
            Some(id) => {
                if !is_valid_component_id(&id) {
                    return Err(anyhow!("Invalid tab id"));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let lock = self.id_lock(session_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.db_manager.get_tab(session_id, &tab_id)? {
            self.db_manager.touch_tab(session_id, &tab_id);
            return Ok((existing, true));
        }

        let (worktree_path, branch, base_branch) = if params.dedicated_worktree {
            let repo_path = self.store.require_canonical(repo_id)?;
            let base_branch = params
                .base_branch
                .unwrap_or_else(|| session.base_branch.clone());
            let branch = format_tab_branch_name(session_id, &tab_id);
            let worktree_path = self.store.tab_worktree_path(repo_id, session_id, &tab_id)?;

            {
                let repo_path = repo_path.clone();
                let session_id = session_id.to_string();
                let branch = branch.clone();
                let base_branch = base_branch.clone();
                let worktree_path = worktree_path.clone();
                tokio::task::spawn_blocking(move || {
                    cleanup_leftover_worktree(&repo_path, &worktree_path)?;
                    let bootstrapper = WorktreeBootstrapper::new(&repo_path);
                    bootstrapper.bootstrap_worktree(BootstrapConfig {
                        session_id: &session_id,
                        branch_name: &branch,
                        worktree_path: &worktree_path,
                        base_branch: &base_branch,
                    })
                })
                .await
                .map_err(|e| anyhow!("Task join error: {e}"))??
            };

            (Some(worktree_path), Some(branch), Some(base_branch))
        } else {
            (None, None, None)
        };

        let tab = TerminalTab {
            session_id: session_id.to_string(),
            tab_id: tab_id.clone(),
            worktree_path,
            branch,
            base_branch,
            index: self.db_manager.next_tab_index(session_id)?,
            last_focused_at: Some(Utc::now()),
        };

        if let Err(e) = self.db_manager.create_tab(&tab) {
            if let (Some(wt), Some(branch)) = (tab.worktree_path.as_ref(), tab.branch.as_ref()) {
                let repo_path = self.store.require_canonical(repo_id)?;
                let branch = branch.clone();
                let wt = wt.clone();
                let _ = tokio::task::spawn_blocking(move || {
                    WorktreeBootstrapper::new(&repo_path).rollback(&branch, &wt);
                })
                .await;
            }
            return Err(e);
        }

        // Tabs additionally run environment setup; failures never fail the tab
        let hook_worktree = tab
            .worktree_path
            .clone()
            .unwrap_or_else(|| session.worktree_path.clone());
        let hook_branch = tab.branch.clone().unwrap_or_else(|| session.branch.clone());
        run_hooks(&self.hooks, session_id, &hook_branch, &hook_worktree).await;

        Ok((tab, false))
    }

    pub async fn delete_tab(&self, repo_id: &str, session_id: &str, tab_id: &str) -> Result<bool> {
        let lock = self.id_lock(session_id);
        let _guard = lock.lock().await;

        let Some(tab) = self.db_manager.get_tab(session_id, tab_id)? else {
            return Ok(false);
        };

        if let (Some(wt), branch) = (tab.worktree_path.as_ref(), tab.branch.as_deref()) {
            let repo_path = self.store.require_canonical(repo_id)?;
            let wt = wt.clone();
            let branch = branch.map(str::to_string);
            let result = tokio::task::spawn_blocking(move || {
                if wt.exists()
                    && let Err(e) = git::remove_worktree(&repo_path, &wt)
                {
                    log::warn!("Tab worktree removal failed: {e}");
                }
                if let Some(branch) = branch
                    && let Err(e) = git::delete_branch_if_exists(&repo_path, &branch)
                {
                    log::warn!("Tab branch deletion failed: {e}");
                }
            })
            .await;
            if let Err(e) = result {
                log::warn!("Tab teardown task failed: {e}");
            }
        }

        self.db_manager.delete_tab(session_id, tab_id)
    }

    pub fn get_tab(&self, session_id: &str, tab_id: &str) -> Result<Option<TerminalTab>> {
        self.db_manager.get_tab(session_id, tab_id)
    }

    pub fn list_tabs(&self, session_id: &str) -> Result<Vec<TerminalTab>> {
        self.db_manager.list_tabs(session_id)
    }

    /// Maintenance sweep: remove worktree directories that no session record
    /// claims, and drop invalid git bookkeeping.
    pub async fn cleanup_orphaned_worktrees(&self, repo_id: &str) -> Result<usize> {
        let repo_path = self.store.require_canonical(repo_id)?;
        let worktrees_dir = self.store.worktrees_dir(repo_id)?;
        if !worktrees_dir.exists() {
            return Ok(0);
        }

        let known: std::collections::HashSet<PathBuf> = self
            .db_manager
            .list_sessions(repo_id)?
            .into_iter()
            .map(|s| {
                s.worktree_path
                    .canonicalize()
                    .unwrap_or(s.worktree_path)
            })
            .collect();

        let mut removed = 0;
        for entry in std::fs::read_dir(&worktrees_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if known.contains(&canonical) {
                continue;
            }

            log::info!(
                "Removing orphaned worktree: {} (no matching session record)",
                path.display()
            );
            let repo_path = repo_path.clone();
            let doomed = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                if let Err(e) = git::remove_worktree(&repo_path, &doomed) {
                    log::warn!("Orphan removal failed for {}: {e}", doomed.display());
                }
            })
            .await;
            if result.is_ok() {
                removed += 1;
            }
        }

        let repo_path = self.store.require_canonical(repo_id)?;
        tokio::task::spawn_blocking(move || git::prune_worktrees(&repo_path))
            .await
            .map_err(|e| anyhow!("Task join error: {e}"))??;

        Ok(removed)
    }
}

/// Remove remnants of a previous worktree at this path before creating a new
/// one. Handles the case where git bookkeeping survived a crash.
fn cleanup_leftover_worktree(repo_path: &Path, worktree_path: &Path) -> Result<()> {
    git::prune_worktrees(repo_path)?;

    if worktree_path.exists() {
        log::warn!(
            "Worktree directory still exists after pruning: {}",
            worktree_path.display()
        );

        if let Ok(git_marker) = worktree_path.join(".git").canonicalize()
            && git_marker.is_file()
        {
            git::remove_worktree(repo_path, worktree_path)?;
        }

        if worktree_path.exists() {
            std::fs::remove_dir_all(worktree_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;
    use std::process::Command;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, RepoStore) {
        let tmp = TempDir::new().unwrap();
        let store = RepoStore::new(tmp.path().to_path_buf());
        let repo_path = tmp.path().join("demo/source");
        std::fs::create_dir_all(&repo_path).unwrap();

        Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        std::fs::write(repo_path.join("README.md"), "Initial").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (tmp, store)
    }

    fn manager(store: RepoStore) -> SessionManager {
        SessionManager::new(SessionDbManager::new(Database::new(None).unwrap()), store)
    }

    fn create_params(id: &str) -> CreateSessionParams {
        CreateSessionParams {
            session_id: Some(id.to_string()),
            display_name: None,
            base_branch: None,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        let first = manager
            .create_session("demo", create_params("alpha"))
            .await
            .unwrap();
        assert!(!first.is_existing);

        let second = manager
            .create_session("demo", create_params("alpha"))
            .await
            .unwrap();
        assert!(second.is_existing);
        assert_eq!(first.session.worktree_path, second.session.worktree_path);
        assert_eq!(first.session.branch, second.session.branch);
        assert_eq!(first.session.base_commit, second.session.base_commit);
    }

    #[tokio::test]
    async fn create_fails_without_canonical_clone() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(RepoStore::new(tmp.path().to_path_buf()));

        let err = manager
            .create_session("missing", create_params("alpha"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no canonical clone"));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        let a = manager
            .create_session("demo", create_params("a"))
            .await
            .unwrap();
        let b = manager
            .create_session("demo", create_params("b"))
            .await
            .unwrap();

        std::fs::write(a.session.worktree_path.join("a-only.txt"), "a").unwrap();
        assert!(!b.session.worktree_path.join("a-only.txt").exists());
    }

    #[tokio::test]
    async fn reconciliation_recreates_after_out_of_band_deletion() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        let first = manager
            .create_session("demo", create_params("healme"))
            .await
            .unwrap();
        std::fs::remove_dir_all(&first.session.worktree_path).unwrap();

        let second = manager
            .create_session("demo", create_params("healme"))
            .await
            .unwrap();
        assert!(!second.is_existing);
        assert!(manager.validate(&second.session));
        assert!(second.session.worktree_path.join("README.md").exists());
    }

    #[tokio::test]
    async fn delete_returns_false_for_unknown_session() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        assert!(!manager.delete_session("demo", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn delete_tolerates_branch_removed_manually() {
        let (_tmp, store) = setup_store();
        let repo_path = store.canonical_path("demo").unwrap();
        let manager = manager(store);

        let created = manager
            .create_session("demo", create_params("fragile"))
            .await
            .unwrap();

        // Manually remove the worktree, then the branch
        git::remove_worktree(&repo_path, &created.session.worktree_path).unwrap();
        git::delete_branch(&repo_path, &created.session.branch).unwrap();

        assert!(manager.delete_session("demo", "fragile").await.unwrap());
        assert!(
            manager
                .db_manager()
                .get_session("demo", "fragile")
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn invalid_session_id_is_rejected() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        let err = manager
            .create_session("demo", create_params("../evil"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid session id"));
    }

    #[tokio::test]
    async fn list_reports_validity() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        let kept = manager
            .create_session("demo", create_params("kept"))
            .await
            .unwrap();
        let broken = manager
            .create_session("demo", create_params("broken"))
            .await
            .unwrap();
        std::fs::remove_dir_all(&broken.session.worktree_path).unwrap();

        let summaries = manager.list_session_summaries("demo").unwrap();
        let find = |id: &str| summaries.iter().find(|s| s.session_id == id).unwrap();
        assert!(find("kept").is_valid);
        assert!(!find("broken").is_valid);
        drop(kept);
    }

    #[tokio::test]
    async fn rename_updates_display_name() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        manager
            .create_session("demo", create_params("named"))
            .await
            .unwrap();
        assert!(manager.rename_session("demo", "named", "My Task").unwrap());

        let loaded = manager
            .db_manager()
            .get_session("demo", "named")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("My Task"));

        assert!(!manager.rename_session("demo", "ghost", "X").unwrap());
    }

    #[tokio::test]
    async fn shared_tab_uses_parent_worktree() {
        let (_tmp, store) = setup_store();
        let manager = manager(store);

        manager
            .create_session("demo", create_params("tabbed"))
            .await
            .unwrap();

        let (tab, existing) = manager
            .create_tab(
                "demo",
                "tabbed",
                CreateTabParams {
                    tab_id: Some("shell".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!existing);
        assert!(tab.worktree_path.is_none());
        assert_eq!(tab.index, 0);

        let (_, existing) = manager
            .create_tab(
                "demo",
                "tabbed",
                CreateTabParams {
                    tab_id: Some("shell".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(existing);
    }

    #[tokio::test]
    async fn dedicated_tab_gets_nested_worktree_and_branch() {
        let (_tmp, store) = setup_store();
        let repo_path = store.canonical_path("demo").unwrap();
        let manager = manager(store);

        manager
            .create_session("demo", create_params("nested"))
            .await
            .unwrap();

        let (tab, _) = manager
            .create_tab(
                "demo",
                "nested",
                CreateTabParams {
                    tab_id: Some("experiment".to_string()),
                    dedicated_worktree: true,
                    base_branch: None,
                },
            )
            .await
            .unwrap();

        let wt = tab.worktree_path.clone().unwrap();
        assert!(wt.join("README.md").exists());
        assert_eq!(tab.branch.as_deref(), Some("werft/nested/experiment"));
        assert!(git::branch_exists(&repo_path, "werft/nested/experiment").unwrap());

        assert!(manager.delete_tab("demo", "nested", "experiment").await.unwrap());
        assert!(!wt.exists());
        assert!(!git::branch_exists(&repo_path, "werft/nested/experiment").unwrap());
    }

    #[tokio::test]
    async fn orphan_cleanup_removes_unclaimed_worktrees() {
        let (_tmp, store) = setup_store();
        let repo_path = store.canonical_path("demo").unwrap();
        let orphan_path = store.worktree_path("demo", "orphan").unwrap();
        let manager = manager(store);

        manager
            .create_session("demo", create_params("claimed"))
            .await
            .unwrap();
        git::create_worktree_from_base(&repo_path, "werft/orphan", &orphan_path, "main").unwrap();

        let removed = manager.cleanup_orphaned_worktrees("demo").await.unwrap();
        assert_eq!(removed, 1);
        assert!(!orphan_path.exists());
        assert!(
            store_path_exists(&manager, "demo", "claimed"),
            "claimed session worktree must survive cleanup"
        );
    }

    fn store_path_exists(manager: &SessionManager, repo_id: &str, id: &str) -> bool {
        manager
            .db_manager()
            .get_session(repo_id, id)
            .unwrap()
            .map(|s| s.worktree_path.exists())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn concurrent_first_creation_yields_one_worktree() {
        let (_tmp, store) = setup_store();
        let manager = Arc::new(manager(store));

        let a = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create_session("demo", create_params("raced"))
                    .await
                    .unwrap()
            })
        };
        let b = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create_session("demo", create_params("raced"))
                    .await
                    .unwrap()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        // Exactly one of the two was the true create
        assert!(a.is_existing != b.is_existing);
        assert_eq!(a.session.worktree_path, b.session.worktree_path);
    }
}
