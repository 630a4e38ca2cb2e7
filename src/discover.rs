use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::DocumentsConfig;

/// A PDF found under the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPdf {
    pub path: PathBuf,
    /// Path relative to the document root, `/`-separated.
    pub relative: String,
    /// Bare file name, as it appears in the ledger.
    pub filename: String,
}

/// Recursively find `.pdf` files under the configured root.
///
/// Sorted by file name, then relative path, so builds are reproducible.
pub fn discover_pdfs(config: &DocumentsConfig) -> Result<Vec<DiscoveredPdf>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Document root does not exist: {}", root.display());
    }

    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        if !filename.ends_with(".pdf") {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude_set.is_match(&relative) {
            continue;
        }

        found.push(DiscoveredPdf {
            path: path.to_path_buf(),
            relative,
            filename,
        });
    }

    found.sort_by(|a, b| {
        a.filename
            .cmp(&b.filename)
            .then_with(|| a.relative.cmp(&b.relative))
    });

    Ok(found)
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
    fn finds_only_pdfs_recursively_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::create_dir_all(root.join("archive")).unwrap();
        fs::write(root.join("zeta.pdf"), b"").unwrap();
        fs::write(root.join("b/nested/alpha.pdf"), b"").unwrap();
        fs::write(root.join("b/notes.txt"), b"").unwrap();
        fs::write(root.join("upper.PDF"), b"").unwrap();
        fs::write(root.join("archive/old.pdf"), b"").unwrap();

        let config = DocumentsConfig {
            root: root.to_path_buf(),
            exclude_globs: vec!["archive/**".to_string()],
            follow_symlinks: false,
        };
        let found = discover_pdfs(&config).unwrap();
        let names: Vec<&str> = found.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["alpha.pdf", "zeta.pdf"]);
        assert_eq!(found[0].relative, "b/nested/alpha.pdf");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("good.pdf"), b"").unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("broken.pdf")).unwrap();

        let config = DocumentsConfig {
            root: root.to_path_buf(),
            exclude_globs: Vec::new(),
            follow_symlinks: true,
        };
        let found = discover_pdfs(&config).unwrap();
        let names: Vec<&str> = found.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["good.pdf"]);
    }

    #[test]
    fn missing_root_is_error() {
        let config = DocumentsConfig {
            root: PathBuf::from("/no/such/policy/root"),
            ..DocumentsConfig::default()
        };
        assert!(discover_pdfs(&config).is_err());
    }
}
