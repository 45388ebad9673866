//! Local caches for source repositories and build artifacts
//!
//! # Layout
//!
//! | Path | Contents |
//! |------|----------|
//! | `<cache>/gits/<escaped url>` | Bare mirror clones |
//! | `<cache>/gits/.locks/<escaped url>.lock` | Per-URL acquisition locks |
//! | `<cache>/artifacts/<digest>.<name>` | Build artifacts |
//! | `<cache>/artifacts/meta/<digest>.<label>` | Artifact and source metadata |
//!
//! Mirrors are fetched with the bundle-then-clone routine in `acquire`,
//! shared by `LocalRepoCache` and `TreeishResolver`.

pub mod acquire;
pub mod artifact;
pub mod factory;
pub mod lock;
pub mod repo;
pub mod treeish;

pub use acquire::MirrorAcquirer;
pub use artifact::{format_bytes, CacheEntry, EntryKind, LocalArtifactCache, WritableHandle};
pub use factory::{create_artifact_cache, create_repo_cache, create_treeish_resolver};
pub use lock::KeyLock;
pub use repo::LocalRepoCache;
pub use treeish::{Treeish, TreeishResolver};
