//! Change-detecting output writer.
//!
//! Every file the build emits goes through [`OutputWriter`]. The writer keeps
//! two ledgers of `output path → hash`: the previous build's (read-only) and
//! the one being built now. A write is skipped when the new hash equals the
//! previous one and the file is still on disk; the file itself is never read
//! back. Skipped or not, the path is recorded in the new ledger, so the next
//! build sees every output of this one.
//!
//! Callers normally let the writer hash the bytes. Content fragments are
//! ledgered under their render fingerprint instead, which is what lets the
//! render cache check "was this exact render written" without reading it.
//!
//! ## Runtime assets
//!
//! The UI bundle is written as `assets/app.<hash12>.js` and
//! `assets/app.<hash12>.css`. Any previously ledgered `assets/app*` script
//! or stylesheet that is not one of the current names is deleted.

use crate::hashing::hash_bytes;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

const ASSET_HASH_LEN: usize = 12;

/// Output paths of the current runtime assets, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeAssets {
    pub js: String,
    pub css: String,
}

/// Write counters for one build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub written: u32,
    pub unchanged: u32,
    pub stale_assets_removed: u32,
}

pub struct OutputWriter<'a> {
    out_dir: PathBuf,
    previous: &'a BTreeMap<String, String>,
    next: BTreeMap<String, String>,
    stats: WriteStats,
}

impl<'a> OutputWriter<'a> {
    pub fn new(out_dir: &Path, previous: &'a BTreeMap<String, String>) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            previous,
            next: BTreeMap::new(),
            stats: WriteStats::default(),
        }
    }

    /// Write `bytes` to `rel_path` unless the ledger says they are already
    /// there. Returns whether the file was written.
    pub fn write(&mut self, rel_path: &str, bytes: &[u8]) -> io::Result<bool> {
        let hash = hash_bytes(bytes);
        self.write_with_hash(rel_path, bytes, hash)
    }

    /// Like [`write`](Self::write), ledgering under a caller-supplied hash.
    pub fn write_with_hash(&mut self, rel_path: &str, bytes: &[u8], hash: String) -> io::Result<bool> {
        let target = self.out_dir.join(rel_path);
        let unchanged = self.previous.get(rel_path) == Some(&hash) && target.exists();

        if unchanged {
            self.stats.unchanged += 1;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, bytes)?;
            self.stats.written += 1;
            tracing::debug!("wrote {}", rel_path);
        }

        self.next.insert(rel_path.to_string(), hash);
        Ok(!unchanged)
    }

    /// Write the UI bundle under content-addressed names and delete bundles
    /// from earlier builds.
    pub fn write_runtime_assets(&mut self, js: &str, css: &str) -> io::Result<RuntimeAssets> {
        let assets = RuntimeAssets {
            js: asset_path(js, "js"),
            css: asset_path(css, "css"),
        };
        self.write(&assets.js, js.as_bytes())?;
        self.write(&assets.css, css.as_bytes())?;

        let stale: Vec<&String> = self
            .previous
            .keys()
            .filter(|path| is_runtime_asset(path) && **path != assets.js && **path != assets.css)
            .collect();
        for path in stale {
            match std::fs::remove_file(self.out_dir.join(path)) {
                Ok(()) => {
                    self.stats.stale_assets_removed += 1;
                    tracing::debug!("removed stale asset {}", path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(assets)
    }

    /// Finish the build and hand back the new ledger.
    pub fn finish(self) -> (BTreeMap<String, String>, WriteStats) {
        (self.next, self.stats)
    }
}

fn asset_path(content: &str, ext: &str) -> String {
    let hash = hash_bytes(content);
    format!("assets/app.{}.{}", &hash[..ASSET_HASH_LEN], ext)
}

fn is_runtime_asset(path: &str) -> bool {
    path.strip_prefix("assets/app")
        .is_some_and(|_| path.ends_with(".js") || path.ends_with(".css"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Write skipping
    // =========================================================================

    #[test]
    fn first_write_creates_file_and_ledgers() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::new();
        let mut writer = OutputWriter::new(tmp.path(), &previous);

        assert!(writer.write("a/b/index.html", b"hello").unwrap());
        assert_eq!(fs::read(tmp.path().join("a/b/index.html")).unwrap(), b"hello");

        let (ledger, stats) = writer.finish();
        assert_eq!(ledger["a/b/index.html"], hash_bytes("hello"));
        assert_eq!(stats.written, 1);
    }

    #[test]
    fn unchanged_bytes_are_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.html"), "sentinel").unwrap();
        let previous = BTreeMap::from([("x.html".to_string(), hash_bytes("hello"))]);

        let mut writer = OutputWriter::new(tmp.path(), &previous);
        assert!(!writer.write("x.html", b"hello").unwrap());

        // The ledger is trusted; the file is not read or replaced.
        assert_eq!(fs::read_to_string(tmp.path().join("x.html")).unwrap(), "sentinel");
        let (ledger, stats) = writer.finish();
        assert_eq!(ledger["x.html"], hash_bytes("hello"));
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.written, 0);
    }

    #[test]
    fn missing_file_is_rewritten_despite_ledger() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::from([("x.html".to_string(), hash_bytes("hello"))]);
        let mut writer = OutputWriter::new(tmp.path(), &previous);
        assert!(writer.write("x.html", b"hello").unwrap());
        assert!(tmp.path().join("x.html").exists());
    }

    #[test]
    fn custom_hash_is_ledgered() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::new();
        let mut writer = OutputWriter::new(tmp.path(), &previous);
        writer.write_with_hash("content/a.html", b"<p>a</p>", "fp".into()).unwrap();
        let (ledger, _) = writer.finish();
        assert_eq!(ledger["content/a.html"], "fp");
    }

    #[test]
    fn unwritten_paths_drop_out_of_ledger() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::from([("old.html".to_string(), "h".to_string())]);
        let writer = OutputWriter::new(tmp.path(), &previous);
        let (ledger, _) = writer.finish();
        assert!(ledger.is_empty());
    }

    // =========================================================================
    // Runtime assets
    // =========================================================================

    #[test]
    fn assets_are_content_addressed() {
        let tmp = TempDir::new().unwrap();
        let previous = BTreeMap::new();
        let mut writer = OutputWriter::new(tmp.path(), &previous);
        let assets = writer.write_runtime_assets("js()", "css{}").unwrap();

        assert_eq!(assets.js, format!("assets/app.{}.js", &hash_bytes("js()")[..12]));
        assert_eq!(assets.css, format!("assets/app.{}.css", &hash_bytes("css{}")[..12]));
        assert!(tmp.path().join(&assets.js).exists());
        assert!(tmp.path().join(&assets.css).exists());
    }

    #[test]
    fn stale_assets_are_deleted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("assets")).unwrap();
        fs::write(tmp.path().join("assets/app.old000000000.js"), "old").unwrap();
        fs::write(tmp.path().join("assets/app.old000000000.css"), "old").unwrap();
        fs::write(tmp.path().join("assets/logo.png"), "png").unwrap();
        let previous = BTreeMap::from([
            ("assets/app.old000000000.js".to_string(), "h1".to_string()),
            ("assets/app.old000000000.css".to_string(), "h2".to_string()),
            ("assets/app.gone00000000.js".to_string(), "h3".to_string()),
            ("assets/logo.png".to_string(), "h4".to_string()),
        ]);

        let mut writer = OutputWriter::new(tmp.path(), &previous);
        writer.write_runtime_assets("new js", "new css").unwrap();

        assert!(!tmp.path().join("assets/app.old000000000.js").exists());
        assert!(!tmp.path().join("assets/app.old000000000.css").exists());
        assert!(tmp.path().join("assets/logo.png").exists());
        let (_, stats) = writer.finish();
        assert_eq!(stats.stale_assets_removed, 2);
    }

    #[test]
    fn current_assets_survive_rebuild() {
        let tmp = TempDir::new().unwrap();
        let empty = BTreeMap::new();
        let mut first = OutputWriter::new(tmp.path(), &empty);
        let assets = first.write_runtime_assets("js", "css").unwrap();
        let (ledger, _) = first.finish();

        let mut second = OutputWriter::new(tmp.path(), &ledger);
        second.write_runtime_assets("js", "css").unwrap();
        let (_, stats) = second.finish();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.stale_assets_removed, 0);
        assert!(tmp.path().join(&assets.js).exists());
    }
}
