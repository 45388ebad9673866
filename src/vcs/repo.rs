//! Handle on one local mirror clone

use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::vcs::git::GitRunner;
use crate::vcs::submodule::{parse_gitmodules, parse_ls_tree_line, Submodule};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A ref resolved to a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRef {
    pub sha1: String,
    /// Canonical ref path; `None` when a commit id was given
    pub ref_path: Option<String>,
}

/// A bare mirror clone of one remote repository
pub struct CachedRepo {
    name: String,
    url: String,
    path: PathBuf,
    git: Arc<dyn GitRunner>,
}

impl fmt::Debug for CachedRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedRepo")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("path", &self.path)
            .finish()
    }
}

impl CachedRepo {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        path: impl Into<PathBuf>,
        git: Arc<dyn GitRunner>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            path: path.into(),
            git,
        }
    }

    /// Name the repository was first requested by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull URL of the origin
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Mirror directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self, args: &[&str], deadline: &Deadline) -> MorphResult<String> {
        self.git.run(args, Some(&self.path), deadline)
    }

    /// Resolve a branch, tag, ref path or commit id to a commit.
    ///
    /// Branches are reported as `refs/remotes/origin/<branch>`, although a
    /// mirror stores them under `refs/heads/`.
    pub fn resolve_ref(&self, reference: &str, deadline: &Deadline) -> MorphResult<ResolvedRef> {
        for (lookup, reported) in ref_candidates(reference) {
            if let Some(sha1) = self.rev_parse(&lookup, deadline)? {
                debug!("Resolved {} in {} to {}", reference, self.name, sha1);
                return Ok(ResolvedRef {
                    sha1,
                    ref_path: reported,
                });
            }
        }

        Err(MorphError::InvalidRef {
            repo: self.name.clone(),
            reference: reference.to_string(),
        })
    }

    /// `Ok(None)` if git does not know the ref
    fn rev_parse(&self, lookup: &str, deadline: &Deadline) -> MorphResult<Option<String>> {
        let spec = format!("{}^{{commit}}", lookup);
        match self.git(&["rev-parse", "--verify", "--quiet", &spec], deadline) {
            Ok(out) => {
                let sha1 = out.trim();
                Ok((!sha1.is_empty()).then(|| sha1.to_string()))
            }
            Err(MorphError::Git { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch new objects and refs from the origin, pruning deleted refs
    pub fn update(&self, deadline: &Deadline) -> MorphResult<()> {
        debug!("Updating {} from {}", self.name, self.url);
        self.git(&["remote", "update", "origin", "--prune"], deadline)?;
        Ok(())
    }

    /// Contents of `path` at `commit`
    pub fn cat_file(&self, commit: &str, path: &str, deadline: &Deadline) -> MorphResult<String> {
        let object = format!("{}:{}", commit, path);
        self.git(&["cat-file", "blob", &object], deadline)
    }

    /// Submodules declared in `.gitmodules` at `commit`, each pinned to the
    /// commit recorded in the tree
    pub fn submodules(&self, commit: &str, deadline: &Deadline) -> MorphResult<Vec<Submodule>> {
        let listing = self.git(&["ls-tree", commit, ".gitmodules"], deadline)?;
        if listing.trim().is_empty() {
            return Ok(Vec::new());
        }

        let text = self.cat_file(commit, ".gitmodules", deadline)?;
        let mut submodules = Vec::new();
        for decl in parse_gitmodules(&text) {
            let entry = self.git(&["ls-tree", commit, "--", &decl.path], deadline)?;
            let pinned = entry
                .lines()
                .filter_map(parse_ls_tree_line)
                .find(|(_, kind, _, _)| *kind == "commit")
                .map(|(_, _, object, _)| object.to_string());

            let Some(pinned) = pinned else {
                return Err(MorphError::InvalidSubmodule {
                    repo: self.name.clone(),
                    commit: commit.to_string(),
                    path: decl.path,
                });
            };

            submodules.push(Submodule {
                name: decl.name,
                path: decl.path,
                url: decl.url,
                commit: pinned,
            });
        }

        Ok(submodules)
    }
}

/// Ordered (lookup, reported) pairs to try for a user supplied ref
fn ref_candidates(reference: &str) -> Vec<(String, Option<String>)> {
    if let Some(branch) = reference.strip_prefix("refs/remotes/origin/") {
        return vec![(format!("refs/heads/{}", branch), Some(reference.to_string()))];
    }
    if let Some(branch) = reference.strip_prefix("refs/heads/") {
        return vec![(
            reference.to_string(),
            Some(format!("refs/remotes/origin/{}", branch)),
        )];
    }
    if reference.starts_with("refs/") {
        return vec![(reference.to_string(), Some(reference.to_string()))];
    }

    let mut candidates = vec![
        (
            format!("refs/heads/{}", reference),
            Some(format!("refs/remotes/origin/{}", reference)),
        ),
        (
            format!("refs/tags/{}", reference),
            Some(format!("refs/tags/{}", reference)),
        ),
    ];
    if is_commit_id(reference) {
        candidates.push((reference.to_string(), None));
    }
    candidates
}

fn is_commit_id(reference: &str) -> bool {
    (4..=40).contains(&reference.len()) && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SHA: &str = "e28a23812eadf2fce6583b8819b9c5dbd36b9fb9";
    const SUB_SHA: &str = "a4da32f5a81c8bc6d660404724cedc3bc0914a75";

    /// Answers git commands from a fixed table; anything else fails
    #[derive(Default)]
    struct ScriptedGit {
        answers: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGit {
        fn answer(mut self, command: &str, output: &str) -> Self {
            self.answers.insert(command.to_string(), output.to_string());
            self
        }
    }

    impl GitRunner for ScriptedGit {
        fn run(&self, args: &[&str], _: Option<&Path>, _: &Deadline) -> MorphResult<String> {
            let command = args.join(" ");
            self.calls.lock().unwrap().push(command.clone());
            self.answers
                .get(&command)
                .cloned()
                .ok_or_else(|| MorphError::git(command, "fatal: not found"))
        }
    }

    fn repo(git: ScriptedGit) -> CachedRepo {
        CachedRepo::new("upstream:foo", "git://example.com/foo", "/cache/gits/foo", Arc::new(git))
    }

    #[test]
    fn branch_resolves_to_remote_tracking_ref() {
        let git = ScriptedGit::default().answer(
            "rev-parse --verify --quiet refs/heads/master^{commit}",
            &format!("{}\n", SHA),
        );
        let resolved = repo(git).resolve_ref("master", &Deadline::never()).unwrap();
        assert_eq!(resolved.sha1, SHA);
        assert_eq!(resolved.ref_path.as_deref(), Some("refs/remotes/origin/master"));
    }

    #[test]
    fn tag_resolves_to_tag_ref() {
        let git = ScriptedGit::default().answer(
            "rev-parse --verify --quiet refs/tags/v1.0^{commit}",
            SHA,
        );
        let resolved = repo(git).resolve_ref("v1.0", &Deadline::never()).unwrap();
        assert_eq!(resolved.ref_path.as_deref(), Some("refs/tags/v1.0"));
    }

    #[test]
    fn commit_id_has_no_ref_path() {
        let git = ScriptedGit::default().answer(
            &format!("rev-parse --verify --quiet {}^{{commit}}", SHA),
            SHA,
        );
        let resolved = repo(git).resolve_ref(SHA, &Deadline::never()).unwrap();
        assert_eq!(resolved.sha1, SHA);
        assert_eq!(resolved.ref_path, None);
    }

    #[test]
    fn remote_tracking_ref_is_looked_up_as_head() {
        let git = ScriptedGit::default().answer(
            "rev-parse --verify --quiet refs/heads/dev^{commit}",
            SHA,
        );
        let resolved = repo(git)
            .resolve_ref("refs/remotes/origin/dev", &Deadline::never())
            .unwrap();
        assert_eq!(resolved.ref_path.as_deref(), Some("refs/remotes/origin/dev"));
    }

    #[test]
    fn unknown_ref_is_invalid() {
        let err = repo(ScriptedGit::default())
            .resolve_ref("no-such-branch", &Deadline::never())
            .unwrap_err();
        assert!(matches!(err, MorphError::InvalidRef { .. }));
    }

    #[test]
    fn no_gitmodules_means_no_submodules() {
        let git = ScriptedGit::default().answer(&format!("ls-tree {} .gitmodules", SHA), "");
        let subs = repo(git).submodules(SHA, &Deadline::never()).unwrap();
        assert!(subs.is_empty());
    }

    #[test]
    fn lists_pinned_submodules() {
        let gitmodules = "[submodule \"lib\"]\n\tpath = lib\n\turl = git://example.com/lib\n";
        let git = ScriptedGit::default()
            .answer(
                &format!("ls-tree {} .gitmodules", SHA),
                "100644 blob 1111111111111111111111111111111111111111\t.gitmodules\n",
            )
            .answer(&format!("cat-file blob {}:.gitmodules", SHA), gitmodules)
            .answer(
                &format!("ls-tree {} -- lib", SHA),
                &format!("160000 commit {}\tlib\n", SUB_SHA),
            );

        let subs = repo(git).submodules(SHA, &Deadline::never()).unwrap();
        assert_eq!(
            subs,
            vec![Submodule {
                name: "lib".to_string(),
                path: "lib".to_string(),
                url: "git://example.com/lib".to_string(),
                commit: SUB_SHA.to_string(),
            }]
        );
    }

    #[test]
    fn submodule_path_must_be_a_commit() {
        let gitmodules = "[submodule \"lib\"]\n\tpath = lib\n\turl = git://example.com/lib\n";
        let git = ScriptedGit::default()
            .answer(
                &format!("ls-tree {} .gitmodules", SHA),
                "100644 blob 1111111111111111111111111111111111111111\t.gitmodules\n",
            )
            .answer(&format!("cat-file blob {}:.gitmodules", SHA), gitmodules)
            .answer(
                &format!("ls-tree {} -- lib", SHA),
                "040000 tree 2222222222222222222222222222222222222222\tlib\n",
            );

        let err = repo(git).submodules(SHA, &Deadline::never()).unwrap_err();
        assert!(matches!(err, MorphError::InvalidSubmodule { ref path, .. } if path == "lib"));
    }
}
