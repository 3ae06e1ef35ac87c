//! YAML frontmatter parsing.
//!
//! A source file may open with a `---` fenced YAML block:
//!
//! ```text
//! ---
//! title: Hello
//! publish: true
//! date: 2024-01-01T09:30:00
//! tags: [rust, notes]
//! ---
//! Body markdown starts here.
//! ```
//!
//! The fence must be the very first line. An unclosed fence consumes the rest
//! of the file as frontmatter and leaves an empty body.
//!
//! ## Literal scalars
//!
//! Date-like fields are read from the raw block text first (`date:
//! 2024-01-01T09:30:00` stays exactly that string) and only fall back to the
//! parsed YAML value when no literal line exists. This avoids any timezone
//! reinterpretation of what the author wrote.

use chrono::{Local, TimeZone};
use serde_yaml::{Mapping, Value};

const FENCE: &str = "---";

/// Structured fields pulled out of a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFields {
    pub publish: bool,
    pub draft: bool,
    pub title: Option<String>,
    pub prefix: Option<String>,
    pub date: Option<String>,
    pub updated_date: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub branch: Option<String>,
    /// Markdown after the frontmatter block.
    pub body: String,
}

/// Split raw text into `(frontmatter block, body)`.
///
/// Returns `None` when the text does not open with a `---` fence.
pub fn split(raw: &str) -> Option<(&str, &str)> {
    let first_end = raw.find('\n').unwrap_or(raw.len());
    if raw[..first_end].trim_end() != FENCE {
        return None;
    }
    let block_start = (first_end + 1).min(raw.len());

    let mut offset = block_start;
    for line in raw[block_start..].split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let block = &raw[block_start..offset];
            let body = &raw[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    Some((&raw[block_start..], ""))
}

/// Parse the frontmatter block into a YAML mapping.
///
/// Empty blocks and non-mapping documents yield an empty mapping.
pub fn parse_block(block: &str) -> Result<Mapping, serde_yaml::Error> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(block)? {
        Value::Mapping(m) => Ok(m),
        _ => Ok(Mapping::new()),
    }
}

/// Parse a whole source file into [`DocFields`].
pub fn parse(raw: &str) -> Result<DocFields, serde_yaml::Error> {
    let (block, body) = match split(raw) {
        Some((block, body)) => (Some(block), body),
        None => (None, raw),
    };
    let data = match block {
        Some(block) => parse_block(block)?,
        None => Mapping::new(),
    };
    let block = block.unwrap_or("");

    Ok(DocFields {
        publish: is_true(&data, "publish"),
        draft: is_true(&data, "draft"),
        title: string_field(&data, "title"),
        prefix: pick_prefix(&data, block),
        date: pick_date(&data, block, &["date", "createdDate"]),
        updated_date: pick_date(
            &data,
            block,
            &["updatedDate", "modifiedDate", "lastModified"],
        ),
        description: string_field(&data, "description"),
        tags: string_list(&data, "tags"),
        branch: string_field(&data, "branch").map(|b| b.to_lowercase()),
        body: body.to_string(),
    })
}

/// The literal scalar text written for a top-level `key:` line.
///
/// Only the first `key:` line counts. Block scalar indicators (`|`, `>`)
/// and empty values yield `None`; surrounding quotes are stripped.
pub fn literal_scalar(block: &str, key: &str) -> Option<String> {
    let line = block.lines().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
    })?;

    let mut value = line.trim();
    if value.is_empty() || value == "|" || value == ">" {
        return None;
    }
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        value = value[1..value.len() - 1].trim();
    }
    (!value.is_empty()).then(|| value.to_string())
}

fn pick_date(data: &Mapping, block: &str, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| literal_scalar(block, key))
        .or_else(|| keys.iter().find_map(|key| normalize_date_value(data.get(*key)?)))
}

fn pick_prefix(data: &Mapping, block: &str) -> Option<String> {
    if let Some(literal) = literal_scalar(block, "prefix") {
        return Some(literal);
    }
    match data.get("prefix")? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(number_to_string(n)),
        _ => None,
    }
}

/// Parsed fallback for date fields: strings as written, numbers as epoch
/// milliseconds rendered in local time.
fn normalize_date_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => {
            let millis = n.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            Local
                .timestamp_millis_opt(millis as i64)
                .single()
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        }
        _ => None,
    }
}

fn is_true(data: &Mapping, key: &str) -> bool {
    matches!(data.get(key), Some(Value::Bool(true)))
}

fn string_field(data: &Mapping, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => non_empty(s),
        _ => None,
    }
}

fn string_list(data: &Mapping, key: &str) -> Vec<String> {
    let Some(Value::Sequence(items)) = data.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(number_to_string(n)),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn number_to_string(n: &serde_yaml::Number) -> String {
    match (n.as_i64(), n.as_u64()) {
        (Some(i), _) => i.to_string(),
        (None, Some(u)) => u.to_string(),
        _ => n.to_string(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
