//! Shared test utilities for the vaultsite test suite.
//!
//! Builds throwaway vaults on disk and options that point a build at them.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let vault = tmp.path().join("vault");
//! write_note(&vault, "posts/hello.md", &note("Hello"));
//!
//! let options = options_for(tmp.path());
//! build_site(&options, &mut CollectingSink::new()).unwrap();
//! ```

use crate::config::BuildOptions;
use std::path::Path;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_note(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A published note with a title and a one-line body.
pub fn note(title: &str) -> String {
    format!("---\npublish: true\ntitle: {}\n---\n# {}\n\nBody of {}.\n", title, title, title)
}

/// Stock options for a workspace laid out as `root/vault`, `root/dist`,
/// `root/.cache`.
pub fn options_for(root: &Path) -> BuildOptions {
    let mut options = BuildOptions::with_defaults(root);
    options.vault_dir = root.join("vault");
    options
}
