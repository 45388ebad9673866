//! Cache construction from configuration

use crate::cache::acquire::MirrorAcquirer;
use crate::cache::artifact::LocalArtifactCache;
use crate::cache::repo::LocalRepoCache;
use crate::cache::treeish::TreeishResolver;
use crate::config::Config;
use crate::error::MorphResult;
use crate::fetch::HttpBundleFetcher;
use crate::resolver::{RepoAliasResolver, RepoResolver};
use crate::vcs::SystemGit;
use std::sync::Arc;

/// Resolver built from `git.repo_aliases`
pub fn create_resolver(config: &Config) -> MorphResult<Arc<dyn RepoResolver>> {
    Ok(Arc::new(RepoAliasResolver::new(&config.git.repo_aliases)?))
}

/// Repository mirror cache in `<cache dir>/gits`
pub fn create_repo_cache(config: &Config) -> MorphResult<LocalRepoCache> {
    let acquirer = MirrorAcquirer::new(
        config.mirrors_dir(),
        Arc::new(SystemGit::new()),
        Arc::new(HttpBundleFetcher::new()),
    )
    .with_bundle_server(config.cache.bundle_server.clone());

    Ok(LocalRepoCache::new(acquirer, create_resolver(config)?))
}

/// Treeish resolver with its own cache directory and bundle server
pub fn create_treeish_resolver(config: &Config) -> MorphResult<TreeishResolver> {
    let acquirer = MirrorAcquirer::new(
        config.treeish_cache_dir(),
        Arc::new(SystemGit::new()),
        Arc::new(HttpBundleFetcher::new()),
    )
    .with_bundle_server(config.treeish_bundle_server());

    Ok(TreeishResolver::new(acquirer, create_resolver(config)?)
        .ignore_submodules(config.git.ignore_submodules))
}

/// Artifact cache in `<cache dir>/artifacts`
pub fn create_artifact_cache(config: &Config) -> LocalArtifactCache {
    LocalArtifactCache::new(config.artifacts_dir())
}
