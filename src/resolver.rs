//! Repository name resolution
//!
//! Morphologies refer to repositories by short names such as
//! `upstream:linux`. A resolver turns those into the URL git pulls from.

use crate::error::{MorphError, MorphResult};
use std::collections::HashMap;
use tracing::debug;

/// Maps a repository name to its canonical pull URL
pub trait RepoResolver: Send + Sync {
    /// Pull URL for `reponame`, or `UnknownRepo`
    fn pull_url(&self, reponame: &str) -> MorphResult<String>;
}

/// Fixed name to URL table; unknown names are an error
impl RepoResolver for HashMap<String, String> {
    fn pull_url(&self, reponame: &str) -> MorphResult<String> {
        self.get(reponame)
            .cloned()
            .ok_or_else(|| MorphError::UnknownRepo(reponame.to_string()))
    }
}

/// One `prefix=pull#push` alias definition
#[derive(Debug, Clone, PartialEq, Eq)]
struct RepoAlias {
    prefix: String,
    pull_pattern: String,
    push_pattern: String,
}

/// Resolver driven by `prefix=pull_pattern#push_pattern` aliases
///
/// `upstream=git://git.example.org/delta/%s#ssh://git@git.example.org/delta/%s`
/// makes `upstream:linux` pull from `git://git.example.org/delta/linux`.
/// Names with no matching alias (full URLs, local paths) are used verbatim.
#[derive(Debug, Clone, Default)]
pub struct RepoAliasResolver {
    aliases: Vec<RepoAlias>,
}

impl RepoAliasResolver {
    /// Parse alias definitions
    pub fn new<S: AsRef<str>>(definitions: &[S]) -> MorphResult<Self> {
        let aliases = definitions
            .iter()
            .map(|d| parse_alias(d.as_ref()))
            .collect::<MorphResult<Vec<_>>>()?;
        Ok(Self { aliases })
    }

    /// Push URL for `reponame`
    pub fn push_url(&self, reponame: &str) -> MorphResult<String> {
        self.expand(reponame, |alias| &alias.push_pattern)
    }

    fn expand(
        &self,
        reponame: &str,
        pattern: impl Fn(&RepoAlias) -> &String,
    ) -> MorphResult<String> {
        if reponame.is_empty() {
            return Err(MorphError::UnknownRepo(reponame.to_string()));
        }

        if let Some((prefix, rest)) = reponame.split_once(':') {
            if let Some(alias) = self.aliases.iter().find(|a| a.prefix == prefix) {
                let url = pattern(alias).replace("%s", rest);
                debug!("Resolved {} to {}", reponame, url);
                return Ok(url);
            }
        }

        Ok(reponame.to_string())
    }
}

impl RepoResolver for RepoAliasResolver {
    fn pull_url(&self, reponame: &str) -> MorphResult<String> {
        self.expand(reponame, |alias| &alias.pull_pattern)
    }
}

fn parse_alias(definition: &str) -> MorphResult<RepoAlias> {
    let invalid = || {
        MorphError::User(format!(
            "Invalid repo alias '{}': expected prefix=pull_pattern#push_pattern",
            definition
        ))
    };

    let (prefix, patterns) = definition.split_once('=').ok_or_else(invalid)?;
    let (pull, push) = patterns.split_once('#').ok_or_else(invalid)?;

    let prefix_ok = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !prefix_ok || pull.is_empty() || push.is_empty() {
        return Err(invalid());
    }

    Ok(RepoAlias {
        prefix: prefix.to_string(),
        pull_pattern: pull.to_string(),
        push_pattern: push.to_string(),
    })
}
