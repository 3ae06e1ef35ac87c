//! Wire types of `manifest.json`.
//!
//! The browser UI reads these, so field names (camelCase) and the `type`
//! tags on tree nodes are an external contract. Optional fields are omitted
//! when absent, except `branch`, which the UI expects as an explicit `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The branch every unlabeled document belongs to.
pub const DEFAULT_BRANCH: &str = "dev";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub generated_at: String,
    pub default_branch: String,
    pub branches: Vec<String>,
    pub ui: UiSettings,
    pub tree: Vec<TreeNode>,
    /// Route → doc id.
    pub route_map: BTreeMap<String, String>,
    pub docs: Vec<DocSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSettings {
    pub new_within_days: u32,
    pub recent_limit: u32,
}

/// Explorer tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Folder(FolderNode),
    File(FileNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder(folder) => &folder.name,
            TreeNode::File(file) => &file.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub name: String,
    /// Vault-relative folder path, or `__virtual__/...` for synthetic folders.
    pub path: String,
    #[serde(rename = "virtual", default, skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// File name including extension.
    pub name: String,
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub route: String,
    pub content_url: String,
    pub is_new: bool,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    pub branch: Option<String>,
}

/// Flat per-document entry of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSummary {
    pub id: String,
    pub route: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_new: bool,
    pub content_url: String,
    pub branch: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
