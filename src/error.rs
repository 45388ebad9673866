//! Error types for morph
//!
//! All modules use `MorphResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for morph operations
pub type MorphResult<T> = Result<T, MorphError>;

/// All errors that can occur in morph
#[derive(Error, Debug)]
pub enum MorphError {
    // Repository cache errors
    #[error("Repository {repo} is not cached yet")]
    NotCached { repo: String },

    #[error("{}", no_remote_message(repo, errors))]
    NoRemote { repo: String, errors: Vec<String> },

    #[error("Failed to fetch repository {repo}: {reason}")]
    RepositoryFetch { repo: String, reason: String },

    #[error("No such repository name: {0:?}")]
    UnknownRepo(String),

    #[error("Ref {reference} not found in repository {repo}")]
    InvalidRef { repo: String, reference: String },

    #[error("Submodule {path} in repository {repo} at {commit} is not a commit")]
    InvalidSubmodule {
        repo: String,
        commit: String,
        path: String,
    },

    // Artifact cache errors
    #[error("{kind} not found in cache: {}", path.display())]
    NotInCache { kind: &'static str, path: PathBuf },

    // Transport errors
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Unable to fetch bundle {url}: {reason}")]
    BundleFetch { url: String, reason: String },

    #[error("Unable to extract bundle {url}: {reason}")]
    BundleExtract { url: String, reason: String },

    #[error("Timed out while {0}")]
    DeadlineExceeded(String),

    #[error("Cancelled while {0}")]
    Cancelled(String),

    #[error("Timed out waiting for cache lock {}", path.display())]
    LockTimeout { path: PathBuf },

    // Morphology errors
    #[error("Invalid morphology {filename}: {reason}")]
    Morphology { filename: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {}: {source}", path.display())]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn no_remote_message(repo: &str, errors: &[String]) -> String {
    let mut lines = vec![format!("Cannot find remote git repository: {}", repo)];
    lines.extend(errors.iter().cloned());
    lines.join("\n\t")
}

impl MorphError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a git failure error
    pub fn git(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the caller stopped the work (cancelled or out of time), as
    /// opposed to the work itself failing
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::DeadlineExceeded(_))
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded(_) | Self::LockTimeout { .. } | Self::BundleFetch { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotCached { .. } => Some("Run: morph repo cache <name>"),
            Self::NoRemote { .. } => {
                Some("Check the repository URL and network, or configure a bundle server")
            }
            Self::UnknownRepo(_) => Some("Check git.repo_aliases in the configuration"),
            Self::LockTimeout { .. } => Some("Another morph process is populating the cache"),
            Self::DeadlineExceeded(_) => Some("Raise --timeout or git.timeout_secs, or try again"),
            _ if self.is_retryable() => Some("This may be temporary; try again"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_remote_lists_every_attempt() {
        let err = MorphError::NoRemote {
            repo: "upstream:foo".to_string(),
            errors: vec![
                "Unable to fetch bundle a: refused".to_string(),
                "Unable to clone from b: refused".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Cannot find remote git repository: upstream:foo\n\t\
             Unable to fetch bundle a: refused\n\t\
             Unable to clone from b: refused"
        );
    }

    #[test]
    fn error_hint() {
        let err = MorphError::NotCached {
            repo: "foo".to_string(),
        };
        assert_eq!(err.hint(), Some("Run: morph repo cache <name>"));
        assert!(MorphError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn error_retryable() {
        assert!(MorphError::DeadlineExceeded("cloning".to_string()).is_retryable());
        assert!(!MorphError::UnknownRepo("x".to_string()).is_retryable());
    }

    #[test]
    fn retryable_errors_get_a_retry_hint() {
        let fetch = MorphError::BundleFetch {
            url: "http://bundles.example/foo.bndl".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(fetch.hint(), Some("This may be temporary; try again"));

        let timeout = MorphError::DeadlineExceeded("cloning".to_string());
        assert!(timeout.hint().unwrap().contains("--timeout"));

        let git = MorphError::git("clone", "fatal: repository not found");
        assert!(!git.is_retryable());
        assert!(git.hint().is_none());
    }
}
