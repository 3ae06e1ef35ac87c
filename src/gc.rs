//! Garbage collection of orphaned outputs.
//!
//! Runs once per build, after the new registry is known and before anything
//! is written, driven purely by the previous build's render cache:
//!
//! - a previous doc id that no longer exists loses its content fragment
//!   (both the hashed name and the legacy `content/<id>.html`) and its route
//!   page;
//! - a doc whose route changed loses the page at its old route.
//!
//! After removing a route page, now-empty directories are pruned upward,
//! stopping at the output root. Files that are already gone count as removed
//! successfully.

use crate::cache::RenderCacheEntry;
use crate::naming::{content_file_name, legacy_content_file_name, route_dir, route_output_path};
use crate::registry::DocRecord;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::Path;

/// Delete outputs of removed documents and stale routes.
///
/// Returns the output-relative paths that were actually deleted.
pub fn collect_garbage(
    out_dir: &Path,
    previous: &BTreeMap<String, RenderCacheEntry>,
    current: &[DocRecord],
) -> io::Result<Vec<String>> {
    let current_routes: HashMap<&str, &str> = current
        .iter()
        .map(|doc| (doc.id.as_str(), doc.route.as_str()))
        .collect();
    let mut removed = Vec::new();

    for (id, entry) in previous {
        match current_routes.get(id.as_str()) {
            Some(route) if *route == entry.route => {}
            Some(_) => {
                tracing::debug!("route of {} moved away from {}", id, entry.route);
                remove_route_page(out_dir, &entry.route, &mut removed)?;
            }
            None => {
                for name in [legacy_content_file_name(id), content_file_name(id)] {
                    let rel = format!("content/{}", name);
                    if remove_file(&out_dir.join(&rel))? {
                        removed.push(rel);
                    }
                }
                remove_route_page(out_dir, &entry.route, &mut removed)?;
            }
        }
    }

    if !removed.is_empty() {
        tracing::debug!("garbage collected {} outputs", removed.len());
    }
    Ok(removed)
}

fn remove_route_page(out_dir: &Path, route: &str, removed: &mut Vec<String>) -> io::Result<()> {
    let rel = route_output_path(route);
    if remove_file(&out_dir.join(&rel))? {
        removed.push(rel);
    }
    let dir = route_dir(route);
    if !dir.is_empty() {
        remove_empty_parents(&out_dir.join(dir), out_dir);
    }
    Ok(())
}

/// Remove a file; `Ok(false)` if it did not exist.
fn remove_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove `start` and each parent while empty, never touching `stop` or
/// anything outside it.
pub fn remove_empty_parents(start: &Path, stop: &Path) {
    let mut current = start;
    while current.starts_with(stop) && current != stop {
        let is_empty = match std::fs::read_dir(current) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => return,
        };
        if !is_empty || std::fs::remove_dir(current).is_err() {
            return;
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_cache::parse_source;
    use std::fs;
    use tempfile::TempDir;

    fn doc(rel_path: &str) -> DocRecord {
        let entry = parse_source("---\npublish: true\n---\n").unwrap();
        DocRecord::from_entry(Path::new("/v"), rel_path, &entry, 0)
    }

    fn entry(route: &str) -> RenderCacheEntry {
        RenderCacheEntry {
            hash: "h".into(),
            route: route.into(),
            rel_path: String::new(),
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    // =========================================================================
    // Removed documents
    // =========================================================================

    #[test]
    fn removed_doc_outputs_are_deleted_and_dirs_pruned() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path();
        let hashed = format!("content/{}", content_file_name("posts__old"));
        touch(out, &hashed);
        touch(out, "content/posts__old.html");
        touch(out, "posts/old/index.html");
        touch(out, "keep.html");

        let previous = BTreeMap::from([("posts__old".to_string(), entry("/posts/old/"))]);
        let removed = collect_garbage(out, &previous, &[]).unwrap();

        assert!(removed.contains(&hashed));
        assert!(removed.contains(&"content/posts__old.html".to_string()));
        assert!(removed.contains(&"posts/old/index.html".to_string()));
        assert!(!out.join("posts").exists());
        assert!(out.join("content").exists());
        assert!(out.join("keep.html").exists());
    }

    #[test]
    fn pruning_stops_at_non_empty_parent() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path();
        touch(out, "posts/old/index.html");
        touch(out, "posts/other/index.html");

        let previous = BTreeMap::from([("posts__old".to_string(), entry("/posts/old/"))]);
        collect_garbage(out, &previous, &[]).unwrap();

        assert!(!out.join("posts/old").exists());
        assert!(out.join("posts/other/index.html").exists());
    }

    #[test]
    fn missing_files_are_not_errors() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::from([("gone".to_string(), entry("/gone/"))]);
        let removed = collect_garbage(tmp.path(), &previous, &[]).unwrap();
        assert!(removed.is_empty());
    }

    // =========================================================================
    // Surviving documents
    // =========================================================================

    #[test]
    fn unchanged_route_is_untouched() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a/index.html");
        let current = vec![doc("a.md")];
        let previous = BTreeMap::from([("a".to_string(), entry("/a/"))]);

        let removed = collect_garbage(tmp.path(), &previous, &current).unwrap();
        assert!(removed.is_empty());
        assert!(tmp.path().join("a/index.html").exists());
    }

    #[test]
    fn changed_route_removes_old_page_only() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path();
        touch(out, "a-abc123/index.html");
        let content = format!("content/{}", content_file_name("a"));
        touch(out, &content);

        let current = vec![doc("a.md")];
        let previous = BTreeMap::from([("a".to_string(), entry("/a-abc123/"))]);
        let removed = collect_garbage(out, &previous, &current).unwrap();

        assert_eq!(removed, vec!["a-abc123/index.html".to_string()]);
        assert!(!out.join("a-abc123").exists());
        assert!(out.join(&content).exists());
    }

    // =========================================================================
    // remove_empty_parents
    // =========================================================================

    #[test]
    fn never_removes_stop_dir() {
        let tmp = TempDir::new().unwrap();
        let stop = tmp.path().join("out");
        fs::create_dir_all(stop.join("a/b")).unwrap();
        remove_empty_parents(&stop.join("a/b"), &stop);
        assert!(stop.exists());
        assert!(!stop.join("a").exists());
    }

    #[test]
    fn ignores_paths_outside_stop() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        remove_empty_parents(&outside, &tmp.path().join("out"));
        assert!(outside.exists());
    }
}
