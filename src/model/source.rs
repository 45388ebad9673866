//! Source and Artifact identities

use crate::model::morphology::Morphology;
use std::sync::Arc;

/// One buildable unit: where its code lives and which morphology builds it
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    repo: String,
    original_ref: String,
    sha1: String,
    morphology: Morphology,
    filename: String,
}

impl Source {
    pub fn new(
        repo: impl Into<String>,
        original_ref: impl Into<String>,
        sha1: impl Into<String>,
        morphology: Morphology,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            original_ref: original_ref.into(),
            sha1: sha1.into(),
            morphology,
            filename: filename.into(),
        }
    }

    /// Repository name or URL the source was loaded from
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Ref as written by the user (branch, tag or commit)
    pub fn original_ref(&self) -> &str {
        &self.original_ref
    }

    /// Resolved commit id
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    pub fn morphology(&self) -> &Morphology {
        &self.morphology
    }

    /// Morphology filename within the repository
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// One named output of building a `Source`
///
/// The cache key captures everything that makes the build deterministic
/// (inputs, toolchain, target architecture) and is supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    source: Arc<Source>,
    name: String,
    cache_key: String,
}

impl Artifact {
    pub fn new(source: Arc<Source>, name: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            cache_key: cache_key.into(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Artifact name, e.g. `chunk-runtime` or `chunk-devel`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}
