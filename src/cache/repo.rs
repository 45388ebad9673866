//! Local repository mirror cache
//!
//! Owns a directory of bare mirror clones, one per pull URL. Handles are
//! memoized by URL, so aliases that resolve to the same URL share one
//! `CachedRepo`.

use crate::cache::acquire::MirrorAcquirer;
use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::resolver::RepoResolver;
use crate::vcs::CachedRepo;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub struct LocalRepoCache {
    acquirer: MirrorAcquirer,
    resolver: Arc<dyn RepoResolver>,
    cached: Mutex<HashMap<String, Arc<CachedRepo>>>,
}

impl LocalRepoCache {
    pub fn new(acquirer: MirrorAcquirer, resolver: Arc<dyn RepoResolver>) -> Self {
        Self {
            acquirer,
            resolver,
            cached: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        self.acquirer.cache_dir()
    }

    /// Whether `reponame` has a local mirror. No network access.
    pub fn has_repo(&self, reponame: &str) -> MorphResult<bool> {
        let url = self.resolver.pull_url(reponame)?;
        Ok(self.acquirer.is_cached(&url))
    }

    /// Handle on the local mirror of `reponame`, or `NotCached`
    pub fn get_repo(&self, reponame: &str) -> MorphResult<Arc<CachedRepo>> {
        let url = self.resolver.pull_url(reponame)?;
        let path = self.acquirer.mirror_path(&url);

        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(repo) = cached.get(&url) {
            if repo.path().is_dir() {
                return Ok(repo.clone());
            }
            debug!("Mirror of {} disappeared, forgetting it", url);
            cached.remove(&url);
        }

        if !path.is_dir() {
            return Err(MorphError::NotCached {
                repo: reponame.to_string(),
            });
        }

        let repo = Arc::new(CachedRepo::new(
            reponame,
            url.clone(),
            path,
            self.acquirer.git().clone(),
        ));
        cached.insert(url, repo.clone());
        Ok(repo)
    }

    /// Make sure `reponame` is cached and return its handle.
    ///
    /// Does no network work if the mirror already exists.
    pub fn cache_repo(&self, reponame: &str, deadline: &Deadline) -> MorphResult<Arc<CachedRepo>> {
        self.acquirer.ensure_cache_dir()?;

        match self.get_repo(reponame) {
            Err(MorphError::NotCached { .. }) => {}
            other => return other,
        }

        let url = self.resolver.pull_url(reponame)?;
        self.acquirer.acquire(reponame, &url, deadline)?;
        self.get_repo(reponame)
    }

    /// Fetch new history for an already cached repository
    pub fn update_repo(&self, reponame: &str, deadline: &Deadline) -> MorphResult<Arc<CachedRepo>> {
        let repo = self.get_repo(reponame)?;
        repo.update(deadline)?;
        Ok(repo)
    }
}
