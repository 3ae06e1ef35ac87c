//! CLI output formatting.
//!
//! The build summary leads with what changed, not with every file touched:
//!
//! ```text
//! 12 documents
//!     Sources: 11 reused, 1 parsed
//!     Render cache: total=12 rendered=1 skipped=11
//!     Outputs: 3 written, 27 unchanged
//! Removed 2 stale outputs
//!     posts/old/index.html
//!     content/3f1c….html
//! 1 warning
//! Site written to dist
//! ```
//!
//! Each `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure: no
//! I/O, no side effects.

use crate::pipeline::BuildReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 document`, `2 documents`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

pub fn format_build_output(report: &BuildReport, out_dir: &Path) -> Vec<String> {
    let mut lines = vec![plural(report.docs, "document")];
    lines.push(format!(
        "{}Sources: {} reused, {} parsed",
        indent(1),
        report.sources_reused,
        report.sources_parsed
    ));
    lines.push(format!("{}Render cache: {}", indent(1), report.render));

    let mut outputs = format!(
        "{}Outputs: {} written, {} unchanged",
        indent(1),
        report.writes.written,
        report.writes.unchanged
    );
    if report.writes.stale_assets_removed > 0 {
        outputs.push_str(&format!(
            ", {} stale assets removed",
            report.writes.stale_assets_removed
        ));
    }
    lines.push(outputs);

    if !report.removed.is_empty() {
        lines.push(format!("Removed {}", plural(report.removed.len(), "stale output")));
        for path in &report.removed {
            lines.push(format!("{}{}", indent(1), path));
        }
    }
    if report.warnings > 0 {
        lines.push(plural(report.warnings, "warning"));
    }
    lines.push(format!("Site written to {}", out_dir.display()));
    lines
}

pub fn print_build_output(report: &BuildReport, out_dir: &Path) {
    for line in format_build_output(report, out_dir) {
        println!("{}", line);
    }
}
