//! Note fetching: git checkout and note discovery.
//!
//! Ensures a local clone of the notes repository exists, then walks it and
//! keeps the files that qualify as notes: markdown, excluding READMEs.
//! An existing checkout is reused as-is — presence is the cache, and a stale
//! checkout is never refreshed automatically.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::NoteDocument;

/// Whether a repo-relative path qualifies as a note.
///
/// True iff the path ends with `.md` and does not end with `README.md`.
/// Exact, case-sensitive suffix semantics: `a/b.md` qualifies, `a/README.md`,
/// `a/b.MD`, and `notes.md.bak` do not.
pub fn filter_notes(path: &str) -> bool {
    path.ends_with(".md") && !path.ends_with("README.md")
}

/// Ensure a local checkout of the configured notes repository and return its
/// path. Clones on first use; an existing checkout is returned untouched.
pub fn ensure_checkout(config: &Config) -> Result<PathBuf> {
    let checkout = config.notes_path();

    if checkout.join(".git").exists() {
        debug!(path = %checkout.display(), "reusing existing checkout");
        return Ok(checkout);
    }

    std::fs::create_dir_all(&checkout).with_context(|| {
        format!(
            "Cannot create checkout directory {} (is the data directory writable?)",
            checkout.display()
        )
    })?;

    git_clone(
        &config.notes.repo_url,
        &config.notes.branch,
        config.notes.shallow,
        &checkout,
    )?;

    Ok(checkout)
}

fn git_clone(url: &str, branch: &str, shallow: bool, dest: &Path) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(["clone", "--branch", branch, "--single-branch"]);
    if shallow {
        cmd.args(["--depth", "1"]);
    }
    cmd.arg(url);
    cmd.arg(dest);

    debug!(url, branch, "cloning notes repository");
    let output = cmd
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git clone of {} failed (is the remote reachable?): {}",
            url,
            stderr.trim()
        );
    }

    Ok(())
}

/// Walk the checkout and load every qualifying note, sorted by path for
/// deterministic ordering.
pub fn collect_notes(checkout: &Path) -> Result<Vec<NoteDocument>> {
    let exclude_set = build_globset(&["**/.git/**".to_string()])?;

    let mut notes = Vec::new();

    for entry in WalkDir::new(checkout) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(checkout).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !filter_notes(&rel_str) {
            continue;
        }

        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read note: {}", path.display()))?;

        notes.push(NoteDocument {
            path: rel_str,
            body,
        });
    }

    notes.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(count = notes.len(), "collected notes from checkout");
    Ok(notes)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_filter_notes_accepts_markdown() {
        assert!(filter_notes("a/b.md"));
        assert!(filter_notes("deeply/nested/note.md"));
        assert!(filter_notes("top.md"));
    }

    #[test]
    fn test_filter_notes_rejects_readme() {
        assert!(!filter_notes("a/README.md"));
        assert!(!filter_notes("README.md"));
    }

    #[test]
    fn test_filter_notes_is_case_sensitive() {
        assert!(!filter_notes("a/b.MD"));
        // Lowercase readme is just another note.
        assert!(filter_notes("a/readme.md"));
    }

    #[test]
    fn test_filter_notes_requires_md_suffix() {
        assert!(!filter_notes("notes.md.bak"));
        assert!(!filter_notes("a/b.txt"));
        assert!(!filter_notes("a/b"));
    }

    #[test]
    fn test_collect_notes_filters_and_sorts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("zeta.md"), "zeta body").unwrap();
        fs::write(root.join("sub/alpha.md"), "alpha body").unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        fs::write(root.join("notes.txt"), "not markdown").unwrap();
        fs::write(root.join(".git/config.md"), "git internals").unwrap();

        let notes = collect_notes(root).unwrap();
        let paths: Vec<&str> = notes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["sub/alpha.md", "zeta.md"]);
        assert_eq!(notes[0].body, "alpha body");
    }

    #[test]
    fn test_collect_notes_empty_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let notes = collect_notes(tmp.path()).unwrap();
        assert!(notes.is_empty());
    }
}
