//! Content discovery.
//!
//! Walks the content directory and finds every page directory: a directory is
//! a page iff at least one file *directly* inside it has a registered metadata
//! or markup extension. Nesting is free-form; an intermediate directory with no
//! recognized file is not a page but its descendants still can be.
//!
//! ```text
//! content/
//! ├── index/                 # page "/"
//! │   └── home.yaml
//! ├── 1.docs/                # page "/docs"
//! │   ├── page.yaml
//! │   ├── 1.install/         # page "/docs/install"
//! │   │   └── body.md
//! │   └── images/            # not a page (no recognized file)
//! │       └── 2.shots/       # page "/shots": its parent directory is not
//! │           └── page.yaml  #   a page, so it sits at the root
//! └── about/                 # floating page "/about"
//!     └── page.yml
//! ```
//!
//! The root directory itself is never a page. Hidden entries (leading `.`)
//! are skipped. Unreadable directories are logged and left out; the walk
//! carries on with their siblings.

use crate::registry::Registry;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find all page directories under `root`, sorted by path.
///
/// A missing `root` yields an empty list.
pub fn scan(root: &Path, registry: &Registry) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::debug!("content directory {} does not exist", root.display());
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry.file_name()));

    let mut pages = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn_unreadable(err.path().unwrap_or(root), &err);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        match has_recognized_file(entry.path(), registry) {
            Ok(true) => pages.push(entry.into_path()),
            Ok(false) => {}
            Err(err) => warn_unreadable(entry.path(), &err),
        }
    }

    pages.sort();
    pages
}

fn has_recognized_file(dir: &Path, registry: &Registry) -> std::io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        if path.is_file() && registry.is_recognized(&path) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn warn_unreadable(path: &Path, err: &dyn std::fmt::Display) {
    tracing::warn!("skipping unreadable directory {}: {err}", path.display());
}

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}
