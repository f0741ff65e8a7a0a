//! File system watcher for the dev server.
//!
//! Watches the whole site directory, batches bursts of events, and asks the
//! [`DevSite`] to rebuild once things go quiet. Events for paths inside the
//! output directory and editor scratch files are dropped before batching.
//!
//! ```text
//! notify events ──▶ filter ──▶ Debouncer ──▶ DevSite::rebuild
//!                                (quiet)       (checkpoint gated)
//! ```
//!
//! Events that arrive while a rebuild runs queue up in the channel and form
//! the next batch, so a burst of saves during a build costs one extra rebuild
//! at most. The rebuild itself compares modification times against the last
//! build and does nothing if no source actually changed.

use crate::serve::{DevSite, ServeError};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Path Filters
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_ignored(path: &Path, output_dir: &Path) -> bool {
    path.starts_with(output_dir) || is_temp_file(path)
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events until `delay` passes without a new one.
#[derive(Debug)]
struct Debouncer {
    delay: Duration,
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashSet::new(),
            last_event: None,
        }
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.pending.extend(paths);
        if !self.pending.is_empty() {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.delay)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_TIMEOUT
        } else {
            self.delay
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch `site` and rebuild it on change until the event channel closes.
pub fn watch_for_changes_blocking(site: &DevSite, debounce: Duration) -> Result<(), ServeError> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(site.base_dir(), RecursiveMode::Recursive)?;
    tracing::info!("watching {}", site.base_dir().display());

    let mut debouncer = Debouncer::new(debounce);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => {
                let output_dir = site.output_dir();
                debouncer.add(
                    event
                        .paths
                        .into_iter()
                        .filter(|p| !is_ignored(p, &output_dir)),
                );
            }
            Ok(Err(e)) => tracing::warn!("watch error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                for path in &changed {
                    tracing::debug!("changed: {}", rel_path(path, site.base_dir()));
                }
                match site.rebuild(false) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!("no source changes, skipping rebuild"),
                    Err(e) => tracing::error!("{e}"),
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn temp_files_are_recognized() {
        assert!(is_temp_file(Path::new("/s/content/a/page.yaml~")));
        assert!(is_temp_file(Path::new("/s/content/a/.page.yaml.swp")));
        assert!(is_temp_file(Path::new("/s/templates/page.html.bak")));
        assert!(is_temp_file(Path::new("/s/4913.tmp")));
        assert!(!is_temp_file(Path::new("/s/content/a/page.yaml")));
        assert!(!is_temp_file(Path::new("/s/public/css/site.scss")));
    }

    #[test]
    fn output_paths_are_ignored() {
        let out = Path::new("/s/output");
        assert!(is_ignored(Path::new("/s/output/index.html"), out));
        assert!(is_ignored(Path::new("/s/output"), out));
        assert!(!is_ignored(Path::new("/s/output-notes.md"), out));
        assert!(!is_ignored(Path::new("/s/content/a/page.yaml"), out));
    }

    #[test]
    fn debouncer_waits_for_quiet() {
        let mut debouncer = Debouncer::new(Duration::from_millis(20));
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), IDLE_TIMEOUT);

        debouncer.add([PathBuf::from("/s/a"), PathBuf::from("/s/b")]);
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), Duration::from_millis(20));

        sleep(Duration::from_millis(30));
        assert!(debouncer.ready());
    }

    #[test]
    fn debouncer_take_drains_and_dedups() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add([PathBuf::from("/s/b"), PathBuf::from("/s/a")]);
        debouncer.add([PathBuf::from("/s/a")]);

        assert_eq!(
            debouncer.take(),
            vec![PathBuf::from("/s/a"), PathBuf::from("/s/b")]
        );
        assert!(!debouncer.ready());
        assert!(debouncer.take().is_empty());
    }

    #[test]
    fn filtered_out_events_do_not_arm_the_debouncer() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add(std::iter::empty());
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), IDLE_TIMEOUT);
    }
}
