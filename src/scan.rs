//! Vault discovery.
//!
//! Walks the vault directory and returns every markdown file that is not
//! excluded, together with its current stat. This is the candidate list the
//! source cache is refreshed against.
//!
//! ```text
//! vault/
//! ├── .obsidian/            # excluded by default
//! ├── posts/
//! │   ├── hello.md          # → "posts/hello.md"
//! │   └── world.MD          # extension match is case-insensitive
//! ├── notes.md
//! └── diagram.png           # not markdown, ignored
//! ```
//!
//! Exclusion patterns are glob patterns matched against the vault-relative,
//! `/`-separated path. A pattern that matches a directory prunes the whole
//! subtree. The output directory and cache directory are always skipped when
//! they live inside the vault.
//!
//! The walk itself is sequential; stat-ing the discovered files runs on the
//! rayon pool. Results are sorted by relative path.

use crate::source_cache::{SourceFile, SourceStat};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Compiled exclusion rules.
#[derive(Debug, Clone)]
pub struct Excluder {
    set: GlobSet,
    skip_dirs: Vec<PathBuf>,
}

impl Excluder {
    pub fn new(patterns: &[String]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| ScanError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
            // `dir/**` should also prune `dir` itself.
            if let Some(dir) = pattern.strip_suffix("/**") {
                let glob = Glob::new(dir).map_err(|source| ScanError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                builder.add(glob);
            }
        }
        let set = builder.build().map_err(|source| ScanError::Pattern {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(Self {
            set,
            skip_dirs: Vec::new(),
        })
    }

    /// Additionally skip an absolute directory (output or cache dir).
    pub fn skip_dir(mut self, dir: &Path) -> Self {
        if let Ok(canonical) = dir.canonicalize() {
            self.skip_dirs.push(canonical);
        }
        self.skip_dirs.push(dir.to_path_buf());
        self
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }

    fn is_skipped_dir(&self, path: &Path) -> bool {
        self.skip_dirs.iter().any(|dir| path == dir)
            || path
                .canonicalize()
                .map(|c| self.skip_dirs.iter().any(|dir| &c == dir))
                .unwrap_or(false)
    }
}

/// Discover markdown sources under `vault`.
pub fn discover(vault: &Path, excluder: &Excluder) -> Result<Vec<SourceFile>, ScanError> {
    let mut candidates: Vec<(PathBuf, String)> = Vec::new();

    let walker = WalkDir::new(vault)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = rel_path_of(vault, entry.path());
            if excluder.is_excluded(&rel) {
                return false;
            }
            !(entry.file_type().is_dir() && excluder.is_skipped_dir(entry.path()))
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        let rel = rel_path_of(vault, entry.path());
        candidates.push((entry.into_path(), rel));
    }

    let mut files = candidates
        .into_par_iter()
        .map(|(path, rel_path)| {
            let stat = stat_file(&path)?;
            Ok(SourceFile {
                source_path: path,
                rel_path,
                stat,
            })
        })
        .collect::<Result<Vec<_>, std::io::Error>>()?;

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::debug!("discovered {} markdown files in {}", files.len(), vault.display());
    Ok(files)
}

/// Current `(mtime, size)` of a file.
pub fn stat_file(path: &Path) -> std::io::Result<SourceStat> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    Ok(SourceStat {
        mtime_ns,
        size: meta.len(),
    })
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn rel_path_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_note;
    use tempfile::TempDir;

    fn rels(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.rel_path.as_str()).collect()
    }

    #[test]
    fn finds_markdown_recursively_sorted() {
        let tmp = TempDir::new().unwrap();
        write_note(tmp.path(), "posts/world.md", "w");
        write_note(tmp.path(), "posts/hello.md", "h");
        write_note(tmp.path(), "notes.MD", "n");
        write_note(tmp.path(), "diagram.png", "png");

        let files = discover(tmp.path(), &Excluder::new(&[]).unwrap()).unwrap();
        assert_eq!(rels(&files), vec!["notes.MD", "posts/hello.md", "posts/world.md"]);
    }

    #[test]
    fn stat_matches_file() {
        let tmp = TempDir::new().unwrap();
        write_note(tmp.path(), "a.md", "12345");
        let files = discover(tmp.path(), &Excluder::new(&[]).unwrap()).unwrap();
        assert_eq!(files[0].stat.size, 5);
        assert!(files[0].stat.mtime_ns > 0);
    }

    #[test]
    fn exclude_prunes_directories() {
        let tmp = TempDir::new().unwrap();
        write_note(tmp.path(), ".obsidian/workspace.md", "x");
        write_note(tmp.path(), "private/secret.md", "x");
        write_note(tmp.path(), "public.md", "x");

        let excluder =
            Excluder::new(&[".obsidian/**".to_string(), "private/**".to_string()]).unwrap();
        let files = discover(tmp.path(), &excluder).unwrap();
        assert_eq!(rels(&files), vec!["public.md"]);
    }

    #[test]
    fn exclude_single_file_pattern() {
        let tmp = TempDir::new().unwrap();
        write_note(tmp.path(), "a.md", "x");
        write_note(tmp.path(), "b.md", "x");
        let files = discover(tmp.path(), &Excluder::new(&["b.md".to_string()]).unwrap()).unwrap();
        assert_eq!(rels(&files), vec!["a.md"]);
    }

    #[test]
    fn skips_output_dir_inside_vault() {
        let tmp = TempDir::new().unwrap();
        write_note(tmp.path(), "dist/leftover.md", "x");
        write_note(tmp.path(), "a.md", "x");
        let excluder = Excluder::new(&[]).unwrap().skip_dir(&tmp.path().join("dist"));
        let files = discover(tmp.path(), &excluder).unwrap();
        assert_eq!(rels(&files), vec!["a.md"]);
    }

    #[test]
    fn invalid_pattern_is_error() {
        let err = Excluder::new(&["a[".to_string()]).unwrap_err();
        assert!(matches!(err, ScanError::Pattern { .. }));
    }
}
