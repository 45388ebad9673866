//! Bundle-then-clone mirror acquisition
//!
//! Shared by the repository cache and the treeish resolver, each with its
//! own cache directory and bundle server. A mirror is acquired by trying,
//! in order:
//!
//! 1. the pre-packed bundle `<bundle server>/<escaped url>.bndl`, cloned
//!    with `git clone --mirror -n` and pointed back at the real origin
//! 2. a direct `git clone --mirror -n` of the origin
//!
//! Each failed strategy contributes one diagnostic line; if all of them
//! fail the caller gets `NoRemote` carrying every line in attempt order.
//!
//! Clones land in a staging directory inside the cache directory and are
//! renamed into place, so `<cache dir>/<escaped url>` only ever appears
//! complete. Acquisition of one URL is serialized across processes by a
//! `KeyLock`.

use crate::cache::lock::KeyLock;
use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::escape::escape_url;
use crate::fetch::{bundle_url, BundleFetcher};
use crate::vcs::GitRunner;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{Builder, TempDir};
use tracing::{debug, info, warn};

const LOCK_DIR: &str = ".locks";
const CLONE_PREFIX: &str = ".clone-";
const BUNDLE_PREFIX: &str = ".bundle-";

/// Staging names carry the escaped key; escaped keys never contain `-`, so
/// one key's prefix cannot match another key's staging files
fn staging_prefix(kind: &str, key: &str) -> String {
    format!("{}{}-", kind, key)
}

/// Populates one mirror cache directory
pub struct MirrorAcquirer {
    cache_dir: PathBuf,
    bundle_server: Option<String>,
    git: Arc<dyn GitRunner>,
    fetcher: Arc<dyn BundleFetcher>,
}

impl MirrorAcquirer {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        git: Arc<dyn GitRunner>,
        fetcher: Arc<dyn BundleFetcher>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            bundle_server: None,
            git,
            fetcher,
        }
    }

    /// Seed clones from bundles on this server; `None` or an empty string
    /// disables bundle seeding
    pub fn with_bundle_server(mut self, bundle_server: Option<String>) -> Self {
        self.bundle_server = bundle_server.filter(|s| !s.is_empty());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn bundle_server(&self) -> Option<&str> {
        self.bundle_server.as_deref()
    }

    pub fn git(&self) -> &Arc<dyn GitRunner> {
        &self.git
    }

    pub fn ensure_cache_dir(&self) -> MorphResult<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            MorphError::io(
                format!("creating cache directory {}", self.cache_dir.display()),
                e,
            )
        })
    }

    /// Where the mirror of `url` lives
    pub fn mirror_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(escape_url(url))
    }

    /// Whether a mirror of `url` exists; never touches the network
    pub fn is_cached(&self, url: &str) -> bool {
        self.mirror_path(url).is_dir()
    }

    /// Make sure a mirror of `url` exists.
    ///
    /// Returns `true` if this call created it, `false` if it was already
    /// there (possibly created by a concurrent process while we waited for
    /// the lock).
    pub fn acquire(&self, reponame: &str, url: &str, deadline: &Deadline) -> MorphResult<bool> {
        if self.is_cached(url) {
            return Ok(false);
        }

        self.ensure_cache_dir()?;
        let key = escape_url(url);
        let _lock = KeyLock::acquire(&self.cache_dir.join(LOCK_DIR), &key, deadline)?;

        if self.is_cached(url) {
            debug!("{} was cached while waiting for the lock", url);
            return Ok(false);
        }
        self.sweep_leftovers(&key);

        let mut errors = Vec::new();

        if let Some(server) = &self.bundle_server {
            match self.clone_with_bundle(server, url, deadline) {
                Ok(()) => {
                    info!("Cached {} from bundle", reponame);
                    return Ok(true);
                }
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => {
                    warn!("Bundle strategy failed for {}: {}", reponame, e);
                    errors.push(e.to_string());
                }
            }
        }

        match self.clone_into_place(url, url, deadline) {
            Ok(()) => {
                info!("Cached {} from {}", reponame, url);
                Ok(true)
            }
            Err(e) if e.is_interruption() => Err(e),
            Err(e) => {
                errors.push(format!(
                    "Unable to clone from {} to {}: {}",
                    url,
                    self.mirror_path(url).display(),
                    e
                ));
                Err(MorphError::NoRemote {
                    repo: reponame.to_string(),
                    errors,
                })
            }
        }
    }

    /// Fetch the bundle for `url` and clone the mirror from it.
    ///
    /// The downloaded bundle is a temporary file and is removed however
    /// this returns.
    fn clone_with_bundle(&self, server: &str, url: &str, deadline: &Deadline) -> MorphResult<()> {
        let bundle = bundle_url(server, url);
        debug!("Trying bundle {}", bundle);

        let prefix = staging_prefix(BUNDLE_PREFIX, &escape_url(url));
        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(".bndl")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| MorphError::io("creating temporary bundle file", e))?;

        self.fetcher.fetch(&bundle, file.as_file_mut(), deadline)?;

        let source = file.path().to_string_lossy().into_owned();
        self.clone_into_place(&source, url, deadline).map_err(|e| {
            if e.is_interruption() {
                e
            } else {
                MorphError::BundleExtract {
                    url: bundle,
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Clone `source` as a mirror of `url` into a staging directory, point
    /// its origin at `url` and rename it into place.
    ///
    /// The staging directory is removed on every error path.
    fn clone_into_place(&self, source: &str, url: &str, deadline: &Deadline) -> MorphResult<()> {
        let prefix = staging_prefix(CLONE_PREFIX, &escape_url(url));
        let staging = Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.cache_dir)
            .map_err(|e| MorphError::io("creating staging directory", e))?;
        let target = staging.path().join("mirror");
        let target_str = target.to_string_lossy().into_owned();

        self.git.run(
            &["clone", "--mirror", "-n", source, &target_str],
            None,
            deadline,
        )?;
        if source != url {
            self.git
                .run(&["remote", "set-url", "origin", url], Some(&target), deadline)?;
        }

        self.move_into_place(staging, &target, url)
    }

    /// Remove staging directories and bundle files of `key` left behind by
    /// a process that died mid-acquisition. Only called under the key's lock.
    fn sweep_leftovers(&self, key: &str) {
        let prefixes = [
            staging_prefix(CLONE_PREFIX, key),
            staging_prefix(BUNDLE_PREFIX, key),
        ];
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Not sweeping {}: {}", self.cache_dir.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
                continue;
            }

            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!("Removed leftover {}", path.display()),
                Err(e) => warn!("Unable to remove leftover {}: {}", path.display(), e),
            }
        }
    }

    fn move_into_place(&self, staging: TempDir, target: &Path, url: &str) -> MorphResult<()> {
        let dest = self.mirror_path(url);
        fs::rename(target, &dest).map_err(|e| {
            MorphError::io(
                format!("moving {} into place at {}", target.display(), dest.display()),
                e,
            )
        })?;
        if let Err(e) = staging.close() {
            debug!("Leaving staging directory behind: {}", e);
        }
        Ok(())
    }
}
