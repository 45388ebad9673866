//! Git plumbing used by the caches

pub mod git;
pub mod repo;
pub mod submodule;

pub use git::{GitRunner, SystemGit};
pub use repo::{CachedRepo, ResolvedRef};
pub use submodule::Submodule;
