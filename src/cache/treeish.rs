//! Treeish resolution
//!
//! Turns (repository, ref) into a concrete commit plus the submodules
//! pinned at that commit, fetching a mirror first if needed. Results are
//! memoized for the lifetime of the resolver.

use crate::cache::acquire::MirrorAcquirer;
use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::resolver::RepoResolver;
use crate::vcs::{CachedRepo, ResolvedRef, Submodule};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// A ref resolved to a commit and its submodules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Treeish {
    pub repo: String,
    pub url: String,
    pub original_ref: String,
    pub sha1: String,
    /// Canonical ref path; `None` when a commit id was given
    #[serde(rename = "ref")]
    pub ref_path: Option<String>,
    pub submodules: Vec<Submodule>,
    #[serde(skip)]
    mirror: PathBuf,
}

pub struct TreeishResolver {
    acquirer: MirrorAcquirer,
    resolver: Arc<dyn RepoResolver>,
    ignore_submodules: bool,
    resolved: Mutex<HashMap<(String, String), Treeish>>,
}

impl TreeishResolver {
    pub fn new(acquirer: MirrorAcquirer, resolver: Arc<dyn RepoResolver>) -> Self {
        Self {
            acquirer,
            resolver,
            ignore_submodules: false,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Report every treeish as having no submodules
    pub fn ignore_submodules(mut self, ignore: bool) -> Self {
        self.ignore_submodules = ignore;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        self.acquirer.cache_dir()
    }

    /// Resolve `reference` (branch, tag, ref path or commit id) in `repo`
    /// (name or URL).
    ///
    /// A ref missing from a mirror that already existed triggers one update
    /// of the mirror before giving up. Failing to fetch the repository or to
    /// find the ref is `RepositoryFetch`; cancellation and timeouts are
    /// returned as they are.
    pub fn get_treeish(
        &self,
        repo: &str,
        reference: &str,
        deadline: &Deadline,
    ) -> MorphResult<Treeish> {
        let key = (repo.to_string(), reference.to_string());
        if let Some(hit) = self.memoized(&key) {
            return Ok(hit);
        }

        let fetch_error = |e: MorphError| {
            if e.is_interruption() {
                e
            } else {
                MorphError::RepositoryFetch {
                    repo: repo.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let url = self.resolver.pull_url(repo).map_err(fetch_error)?;
        let cloned = self
            .acquirer
            .acquire(repo, &url, deadline)
            .map_err(fetch_error)?;
        let mirror = CachedRepo::new(
            repo,
            url.clone(),
            self.acquirer.mirror_path(&url),
            self.acquirer.git().clone(),
        );

        let resolved = match mirror.resolve_ref(reference, deadline) {
            Err(MorphError::InvalidRef { .. }) if !cloned => {
                debug!("{} not in {}, updating mirror", reference, repo);
                mirror.update(deadline).map_err(fetch_error)?;
                mirror.resolve_ref(reference, deadline).map_err(fetch_error)?
            }
            other => other.map_err(fetch_error)?,
        };

        let submodules = self.submodules(&mirror, &resolved, deadline)?;
        info!("Resolved {} {} to {}", repo, reference, resolved.sha1);

        let treeish = Treeish {
            repo: repo.to_string(),
            url,
            original_ref: reference.to_string(),
            sha1: resolved.sha1,
            ref_path: resolved.ref_path,
            submodules,
            mirror: mirror.path().to_path_buf(),
        };
        self.lock().insert(key, treeish.clone());
        Ok(treeish)
    }

    fn submodules(
        &self,
        mirror: &CachedRepo,
        resolved: &ResolvedRef,
        deadline: &Deadline,
    ) -> MorphResult<Vec<Submodule>> {
        if self.ignore_submodules {
            return Ok(Vec::new());
        }
        mirror.submodules(&resolved.sha1, deadline)
    }

    /// Drop the memoized resolution of (`repo`, `reference`)
    pub fn forget(&self, repo: &str, reference: &str) {
        self.lock()
            .remove(&(repo.to_string(), reference.to_string()));
    }

    /// Drop every memoized resolution
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn memoized(&self, key: &(String, String)) -> Option<Treeish> {
        let mut resolved = self.lock();
        match resolved.get(key) {
            Some(hit) if hit.mirror.is_dir() => Some(hit.clone()),
            Some(_) => {
                resolved.remove(key);
                None
            }
            None => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Treeish>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
