//! Integration tests for morph

use std::path::Path;
use std::process::Command as StdCommand;

/// Run git, panicking with its stderr on failure
fn git(cwd: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args([
            "-c",
            "user.name=Morph Tests",
            "-c",
            "user.email=tests@morph.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn git_available() -> bool {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A repository with one commit on master
fn init_repo(dir: &Path) -> String {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    std::fs::write(dir.join("hello.morph"), "name: hello\nkind: chunk\n").unwrap();
    git(dir, &["add", "hello.morph"]);
    git(dir, &["commit", "-q", "-m", "Add hello"]);
    git(dir, &["rev-parse", "HEAD"])
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// morph with an isolated config file and cache root
    fn morph(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("morph");
        cmd.env("MORPH_CONFIG", home.path().join("morph.toml"))
            .env("MORPH_CACHEDIR", home.path().join("cache"))
            .env_remove("MORPH_BUNDLE_SERVER");
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Morph"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("morph"));
    }

    #[test]
    fn escape_prints_cache_key() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["escape", "git://example.com/foo"])
            .assert()
            .success()
            .stdout("git___example_com_foo\n");
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("morph.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("gc_days = 30"));
    }

    #[test]
    fn config_init_writes_file() {
        let home = TempDir::new().unwrap();
        morph(&home).args(["config", "init"]).assert().success();
        assert!(home.path().join("morph.toml").is_file());
    }

    #[test]
    fn invalid_config_reported() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("morph.toml"), "[cache\n").unwrap();
        morph(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn artifacts_list_empty() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["artifacts", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached artifacts"));
    }

    #[test]
    fn artifacts_list_json_empty() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["artifacts", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn artifacts_clear_empty() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["artifacts", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached artifacts to clear"));
    }

    #[test]
    fn repo_has_uncached_fails() {
        let home = TempDir::new().unwrap();
        morph(&home)
            .args(["repo", "has", "git://example.com/foo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not cached"));
    }

    #[test]
    fn resolve_missing_repo_fails() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("nonexistent").join("repo");
        morph(&home)
            .args(["resolve", &missing.display().to_string(), "master"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to fetch repository"));
    }
}

mod git_tests {
    use super::{git, git_available, init_repo};
    use morph::cache::{create_repo_cache, create_treeish_resolver};
    use morph::config::Config;
    use morph::deadline::Deadline;
    use morph::escape::escape_url;
    use tempfile::TempDir;

    fn config(home: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.dir = Some(home.path().join("cache"));
        config
    }

    #[test]
    fn resolves_branch_to_remote_ref() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        let head = init_repo(&repo);
        let url = repo.display().to_string();

        let resolver = create_treeish_resolver(&config(&home)).unwrap();
        let treeish = resolver
            .get_treeish(&url, "master", &Deadline::never())
            .unwrap();

        assert_eq!(treeish.sha1, head);
        assert_eq!(treeish.ref_path.as_deref(), Some("refs/remotes/origin/master"));
        assert!(treeish.submodules.is_empty());

        let by_commit = resolver.get_treeish(&url, &head, &Deadline::never()).unwrap();
        assert_eq!(by_commit.sha1, head);
        assert_eq!(by_commit.ref_path, None);
    }

    #[test]
    fn resolution_is_deterministic_across_resolvers() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        init_repo(&repo);
        let url = repo.display().to_string();

        let first = create_treeish_resolver(&config(&home))
            .unwrap()
            .get_treeish(&url, "master", &Deadline::never())
            .unwrap();
        let second = create_treeish_resolver(&config(&home))
            .unwrap()
            .get_treeish(&url, "master", &Deadline::never())
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn new_commits_found_after_update() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        init_repo(&repo);
        let url = repo.display().to_string();
        create_treeish_resolver(&config(&home))
            .unwrap()
            .get_treeish(&url, "master", &Deadline::never())
            .unwrap();

        git(&repo, &["checkout", "-q", "-b", "feature"]);
        git(&repo, &["commit", "-q", "--allow-empty", "-m", "Feature"]);
        let feature = git(&repo, &["rev-parse", "HEAD"]);

        let treeish = create_treeish_resolver(&config(&home))
            .unwrap()
            .get_treeish(&url, "feature", &Deadline::never())
            .unwrap();
        assert_eq!(treeish.sha1, feature);
    }

    #[test]
    fn unknown_ref_is_fetch_error() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        init_repo(&repo);
        let url = repo.display().to_string();

        let err = create_treeish_resolver(&config(&home))
            .unwrap()
            .get_treeish(&url, "no-such-branch", &Deadline::never())
            .unwrap_err();
        assert!(
            matches!(err, morph::MorphError::RepositoryFetch { ref reason, .. }
                if reason.contains("no-such-branch")),
            "{:?}",
            err
        );
    }

    #[test]
    fn mirror_seeded_from_bundle() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        let head = init_repo(&repo);
        let url = repo.display().to_string();

        let bundles = home.path().join("bundles");
        std::fs::create_dir_all(&bundles).unwrap();
        let bundle = bundles.join(format!("{}.bndl", escape_url(&url)));
        git(&repo, &["bundle", "create", &bundle.display().to_string(), "--all"]);

        // Only the bundle can provide the history now
        std::fs::remove_dir_all(&repo).unwrap();

        let mut config = config(&home);
        config.cache.bundle_server = Some(format!("file://{}", bundles.display()));
        let cache = create_repo_cache(&config).unwrap();
        let cached = cache.cache_repo(&url, &Deadline::never()).unwrap();

        assert!(cached.path().is_dir());
        assert_eq!(cached.path(), home.path().join("cache/gits").join(escape_url(&url)));
        let origin = git(cached.path(), &["config", "remote.origin.url"]);
        assert_eq!(origin, url);
        let master = git(cached.path(), &["rev-parse", "refs/heads/master"]);
        assert_eq!(master, head);
    }

    #[test]
    fn repo_cache_is_idempotent() {
        if !git_available() {
            return;
        }
        let home = TempDir::new().unwrap();
        let repo = home.path().join("upstream");
        init_repo(&repo);
        let url = repo.display().to_string();

        let cache = create_repo_cache(&config(&home)).unwrap();
        assert!(!cache.has_repo(&url).unwrap());
        let first = cache.cache_repo(&url, &Deadline::never()).unwrap();
        let second = cache.cache_repo(&url, &Deadline::never()).unwrap();

        assert!(cache.has_repo(&url).unwrap());
        assert_eq!(first.path(), second.path());
        cache.update_repo(&url, &Deadline::never()).unwrap();
    }
}
