//! Modification-time snapshots of a site's sources.
//!
//! The dev server compares a fresh [`Checkpoint`] against the one taken at the
//! last build before rebuilding, so watcher events that changed nothing on
//! disk (editors probing files, the build writing its own output) do not
//! trigger work.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Checkpoint {
    files: Vec<(PathBuf, Option<SystemTime>)>,
}

impl Checkpoint {
    /// Record every path under `base_dir` except those inside `skip_dir`.
    ///
    /// Entries that vanish or cannot be read mid-walk are left out.
    pub fn take(base_dir: &Path, skip_dir: &Path) -> Self {
        let files = WalkDir::new(base_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != skip_dir)
            .filter_map(Result::ok)
            .map(|e| {
                let modified = e.metadata().ok().and_then(|m| m.modified().ok());
                (e.into_path(), modified)
            })
            .collect();
        Self { files }
    }

    /// Take a fresh checkpoint and report whether it differs from `previous`.
    ///
    /// Without a previous checkpoint there is always a change.
    pub fn has_changes(
        previous: Option<&Checkpoint>,
        base_dir: &Path,
        skip_dir: &Path,
    ) -> (bool, Checkpoint) {
        let now = Checkpoint::take(base_dir, skip_dir);
        let changed = previous.is_none_or(|prev| *prev != now);
        (changed, now)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
