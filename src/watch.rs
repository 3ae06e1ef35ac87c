//! Watch mode (`vaultsite dev`).
//!
//! Runs one build, then watches the vault and rebuilds when markdown files
//! change:
//!
//! ```text
//! notify ──► debouncer (250 ms) ──► .md filter ──► channel ──► build loop
//! ```
//!
//! Builds never overlap. Changes that arrive while a build is running are
//! collapsed into a single trailing rebuild by [`Coalescer`]. A failing
//! rebuild is logged and the watcher keeps going; only the initial build is
//! fatal.

use crate::config::BuildOptions;
use crate::diagnostics::DiagnosticSink;
use crate::pipeline::{BuildError, BuildReport, build_site};
use crate::scan::is_markdown;
use notify_debouncer_full::{
    DebounceEventResult, new_debouncer,
    notify::{self, RecursiveMode, Watcher},
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use thiserror::Error;

pub const DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Running/queued state of the rebuild loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Coalescer {
    running: bool,
    queued: bool,
}

impl Coalescer {
    /// A change arrived. Returns whether a build should start now; if one
    /// is already running the change is queued instead.
    pub fn request(&mut self) -> bool {
        if self.running {
            self.queued = true;
            false
        } else {
            self.running = true;
            true
        }
    }

    /// The running build finished. Returns whether to build again.
    pub fn finish(&mut self) -> bool {
        if self.queued {
            self.queued = false;
            true
        } else {
            self.running = false;
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Paths under the output or cache directory never trigger a rebuild.
struct ChangeFilter {
    ignored: Vec<PathBuf>,
}

impl ChangeFilter {
    fn new(options: &BuildOptions) -> Self {
        let mut ignored = Vec::new();
        for dir in [&options.out_dir, &options.cache_dir] {
            if let Ok(canonical) = dir.canonicalize() {
                ignored.push(canonical);
            }
            ignored.push(dir.clone());
        }
        Self { ignored }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        is_markdown(path) && !self.ignored.iter().any(|dir| path.starts_with(dir))
    }
}

/// Build, then rebuild on every markdown change until the process exits.
pub fn run_dev(
    options: &BuildOptions,
    sink: &mut dyn DiagnosticSink,
    mut on_build: impl FnMut(&BuildReport),
) -> Result<(), WatchError> {
    let report = build_site(options, sink)?;
    on_build(&report);

    let (tx, rx) = channel::<()>();
    let filter = ChangeFilter::new(options);
    let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let changed = events
                    .iter()
                    .flat_map(|event| event.paths.iter())
                    .any(|path| filter.is_relevant(path));
                if changed {
                    // The receiver only goes away on shutdown.
                    let _ = tx.send(());
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::error!("watch error: {}", error);
                }
            }
        }
    })?;
    debouncer
        .watcher()
        .watch(&options.vault_dir, RecursiveMode::Recursive)?;
    tracing::info!("Watching {} for changes", options.vault_dir.display());

    rebuild_loop(&rx, || match build_site(options, sink) {
        Ok(report) => on_build(&report),
        Err(e) => tracing::error!("rebuild failed: {}", e),
    });
    Ok(())
}

/// Run `build` once per burst of change signals until the channel closes.
/// Returns the number of builds run.
pub fn rebuild_loop(rx: &Receiver<()>, mut build: impl FnMut()) -> usize {
    let mut coalescer = Coalescer::default();
    let mut builds = 0;

    while rx.recv().is_ok() {
        if !coalescer.request() {
            continue;
        }
        loop {
            tracing::info!("Change detected, rebuilding");
            build();
            builds += 1;
            for () in rx.try_iter() {
                coalescer.request();
            }
            if !coalescer.finish() {
                break;
            }
        }
    }

    builds
}
