//! Submodule declarations
//!
//! Submodules are read straight from `.gitmodules` and the tree of a given
//! commit, since mirrors have no working tree to run `git submodule` in.

use serde::Serialize;
use tracing::warn;

/// A submodule pinned at a specific commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submodule {
    pub name: String,
    pub path: String,
    pub url: String,
    pub commit: String,
}

/// A `[submodule "name"]` section from `.gitmodules`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleDecl {
    pub name: String,
    pub path: String,
    pub url: String,
}

/// Parse `.gitmodules` text.
///
/// Sections missing `path` or `url` are skipped with a warning.
pub fn parse_gitmodules(text: &str) -> Vec<SubmoduleDecl> {
    let mut decls = Vec::new();
    let mut current: Option<(String, Option<String>, Option<String>)> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            finish(current.take(), &mut decls);
            current = section_name(line).map(|name| (name, None, None));
            continue;
        }

        let Some((_, path, url)) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim()).to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "path" => *path = Some(value),
            "url" => *url = Some(value),
            _ => {}
        }
    }
    finish(current, &mut decls);

    decls
}

fn finish(section: Option<(String, Option<String>, Option<String>)>, out: &mut Vec<SubmoduleDecl>) {
    let Some((name, path, url)) = section else {
        return;
    };
    match (path, url) {
        (Some(path), Some(url)) => out.push(SubmoduleDecl { name, path, url }),
        _ => warn!("Ignoring submodule {:?}: missing path or url", name),
    }
}

/// `[submodule "foo"]` -> `foo`; other sections -> None
fn section_name(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let rest = inner.strip_prefix("submodule")?.trim();
    Some(unquote(rest).to_string())
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Parse one `git ls-tree` line into (mode, type, object, path)
pub fn parse_ls_tree_line(line: &str) -> Option<(&str, &str, &str, &str)> {
    let (meta, path) = line.split_once('\t')?;
    let mut fields = meta.split_whitespace();
    let mode = fields.next()?;
    let kind = fields.next()?;
    let object = fields.next()?;
    Some((mode, kind, object, path))
}
