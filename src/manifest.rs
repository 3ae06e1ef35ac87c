//! Manifest and explorer tree construction.
//!
//! The explorer shows the vault as a folder tree built from each document's
//! `rel_no_ext`, preceded by virtual folders:
//!
//! ```text
//! Pinned                 (optional, __virtual__/pinned/<source_dir>)
//! Recent                 (__virtual__/recent, newest first)
//! posts/
//!   hello.md
//!   world.md
//! about.md
//! ```
//!
//! Folders come before files at every level; names compare locale-aware.
//! Recent orders by `updatedDate`, falling back to `date`: dated docs newest
//! first, then undated, ties broken by path.

use crate::config::BuildOptions;
use crate::naming::locale_cmp;
use crate::registry::{DocRecord, parse_date_millis};
use crate::types::{
    DEFAULT_BRANCH, DocSummary, FileNode, FolderNode, Manifest, TreeNode, UiSettings,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const RECENT_PATH: &str = "__virtual__/recent";
const RECENT_LABEL: &str = "Recent";
const PINNED_PATH_PREFIX: &str = "__virtual__/pinned/";

pub fn file_node(doc: &DocRecord) -> FileNode {
    FileNode {
        name: doc.file_name.clone(),
        id: doc.id.clone(),
        title: doc.title.clone(),
        prefix: doc.prefix.clone(),
        route: doc.route.clone(),
        content_url: doc.content_url.clone(),
        is_new: doc.is_new,
        tags: doc.tags.clone(),
        description: doc.description.clone(),
        date: doc.date.clone(),
        updated_date: doc.updated_date.clone(),
        branch: doc.branch.clone(),
    }
}

/// Full explorer tree: virtual folders first, then the vault hierarchy.
pub fn build_tree(docs: &[DocRecord], options: &BuildOptions) -> Vec<TreeNode> {
    let mut root = FolderNode {
        name: "root".to_string(),
        path: String::new(),
        is_virtual: false,
        children: Vec::new(),
    };
    for doc in docs {
        let segments: Vec<&str> = doc.rel_no_ext.split('/').collect();
        let folders = &segments[..segments.len().saturating_sub(1)];
        insert(&mut root, folders, "", file_node(doc));
    }
    sort_tree(&mut root.children);

    let mut tree = Vec::with_capacity(root.children.len() + 2);
    if let Some(pinned) = pinned_folder(docs, options) {
        tree.push(TreeNode::Folder(pinned));
    }
    tree.push(TreeNode::Folder(recent_folder(docs, options.recent_limit)));
    tree.extend(root.children);
    tree
}

fn insert(parent: &mut FolderNode, folders: &[&str], parent_path: &str, file: FileNode) {
    let Some((first, rest)) = folders.split_first() else {
        parent.children.push(TreeNode::File(file));
        return;
    };
    let path = if parent_path.is_empty() {
        first.to_string()
    } else {
        format!("{}/{}", parent_path, first)
    };

    let existing = parent.children.iter().position(
        |node| matches!(node, TreeNode::Folder(folder) if folder.path == path),
    );
    let index = match existing {
        Some(index) => index,
        None => {
            parent.children.push(TreeNode::Folder(FolderNode {
                name: first.to_string(),
                path: path.clone(),
                is_virtual: false,
                children: Vec::new(),
            }));
            parent.children.len() - 1
        }
    };
    if let TreeNode::Folder(folder) = &mut parent.children[index] {
        insert(folder, rest, &path, file);
    }
}

/// Folders before files, then locale-aware by name, recursively.
pub fn sort_tree(nodes: &mut [TreeNode]) {
    nodes.sort_by(|left, right| match (left, right) {
        (TreeNode::Folder(_), TreeNode::File(_)) => Ordering::Less,
        (TreeNode::File(_), TreeNode::Folder(_)) => Ordering::Greater,
        _ => locale_cmp(left.name(), right.name()),
    });
    for node in nodes.iter_mut() {
        if let TreeNode::Folder(folder) = node {
            sort_tree(&mut folder.children);
        }
    }
}

fn recent_folder(docs: &[DocRecord], limit: u32) -> FolderNode {
    let mut sorted: Vec<&DocRecord> = docs.iter().collect();
    sorted.sort_by(|a, b| compare_recent(a, b));
    FolderNode {
        name: RECENT_LABEL.to_string(),
        path: RECENT_PATH.to_string(),
        is_virtual: true,
        children: sorted
            .into_iter()
            .take(limit as usize)
            .map(|doc| TreeNode::File(file_node(doc)))
            .collect(),
    }
}

fn recent_millis(doc: &DocRecord) -> Option<i64> {
    doc.updated_date
        .as_deref()
        .and_then(parse_date_millis)
        .or_else(|| doc.date.as_deref().and_then(parse_date_millis))
}

/// Dated before undated, newest first, then path.
pub fn compare_recent(left: &DocRecord, right: &DocRecord) -> Ordering {
    let by_date = match (recent_millis(left), recent_millis(right)) {
        (Some(l), Some(r)) => r.cmp(&l),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| locale_cmp(&left.rel_no_ext, &right.rel_no_ext))
        .then_with(|| left.rel_path.cmp(&right.rel_path))
}

fn pinned_folder(docs: &[DocRecord], options: &BuildOptions) -> Option<FolderNode> {
    let pinned = options.pinned_menu.as_ref()?;
    let source_dir = pinned.source_dir();
    let prefix = format!("{}/", source_dir);

    let mut members: Vec<&DocRecord> = docs
        .iter()
        .filter(|doc| doc.rel_no_ext.starts_with(&prefix))
        .collect();
    members.sort_by(|a, b| locale_cmp(&a.rel_no_ext, &b.rel_no_ext));

    Some(FolderNode {
        name: pinned.label.clone(),
        path: format!("{}{}", PINNED_PATH_PREFIX, source_dir),
        is_virtual: true,
        children: members
            .into_iter()
            .map(|doc| TreeNode::File(file_node(doc)))
            .collect(),
    })
}

/// `dev` first, then every other branch label, locale-aware.
pub fn branches(docs: &[DocRecord]) -> Vec<String> {
    let others: BTreeSet<&str> = docs
        .iter()
        .filter_map(|doc| doc.branch.as_deref())
        .filter(|branch| *branch != DEFAULT_BRANCH)
        .collect();
    let mut others: Vec<&str> = others.into_iter().collect();
    others.sort_by(|a, b| locale_cmp(a, b));

    std::iter::once(DEFAULT_BRANCH)
        .chain(others)
        .map(str::to_string)
        .collect()
}

/// RFC 3339 timestamp of the newest document mtime.
pub fn generated_at(docs: &[DocRecord]) -> String {
    let newest = docs.iter().map(|doc| doc.mtime_ns).max().unwrap_or(0);
    let secs = (newest / 1_000_000_000) as i64;
    let nanos = (newest % 1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn build_manifest(docs: &[DocRecord], tree: Vec<TreeNode>, options: &BuildOptions) -> Manifest {
    let route_map: BTreeMap<String, String> = docs
        .iter()
        .map(|doc| (doc.route.clone(), doc.id.clone()))
        .collect();

    Manifest {
        generated_at: generated_at(docs),
        default_branch: DEFAULT_BRANCH.to_string(),
        branches: branches(docs),
        ui: UiSettings {
            new_within_days: options.new_within_days,
            recent_limit: options.recent_limit,
        },
        tree,
        route_map,
        docs: docs.iter().map(summary).collect(),
    }
}

fn summary(doc: &DocRecord) -> DocSummary {
    DocSummary {
        id: doc.id.clone(),
        route: doc.route.clone(),
        title: doc.title.clone(),
        prefix: doc.prefix.clone(),
        date: doc.date.clone(),
        updated_date: doc.updated_date.clone(),
        tags: doc.tags.clone(),
        description: doc.description.clone(),
        is_new: doc.is_new,
        content_url: doc.content_url.clone(),
        branch: doc.branch.clone(),
    }
}

/// Document shown on the home page: `/index/` within the default branch,
/// else the first doc of the default branch (or of all docs).
pub fn pick_home_doc(docs: &[DocRecord]) -> Option<&DocRecord> {
    let in_default: Vec<&DocRecord> = docs
        .iter()
        .filter(|doc| doc.branch.as_deref().is_none_or(|b| b == DEFAULT_BRANCH))
        .collect();
    let candidates: Vec<&DocRecord> = if in_default.is_empty() {
        docs.iter().collect()
    } else {
        in_default
    };
    candidates
        .iter()
        .find(|doc| doc.route == "/index/")
        .or_else(|| candidates.first())
        .copied()
}
