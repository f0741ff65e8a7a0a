//! Shared test utilities for the tack test suite.
//!
//! Provides site builders, page lookups, and navigation assertions that work
//! with page-graph data (`PageGraph`, `Page`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let graph = PageGraph::open(tmp.path()).unwrap();
//!
//! let page = find_page(&graph, "/docs/install");
//! assert_eq!(page.title, "Install");
//!
//! assert_nav_shape(&graph, &[
//!     ("/docs", &["/docs/install", "/docs/usage"]),
//!     ("/blog", &[]),
//! ]);
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::graph::PageGraph;
use crate::page::Page;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `(relative path, contents)` pairs below `root`, creating directories.
pub fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a page by permalink. Panics with the available permalinks if missing.
pub fn find_page<'a>(graph: &'a PageGraph, permalink: &str) -> &'a Page {
    graph
        .pages()
        .iter()
        .find(|p| p.permalink == permalink)
        .unwrap_or_else(|| {
            let known: Vec<&str> = graph.pages().iter().map(|p| p.permalink.as_str()).collect();
            panic!("page {permalink} not found; have {known:?}")
        })
}

/// Permalinks of the given pages, in order.
pub fn permalinks_of<'a>(graph: &'a PageGraph, ids: &[crate::page::PageId]) -> Vec<&'a str> {
    ids.iter()
        .map(|&id| graph.site().page(id).permalink.as_str())
        .collect()
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert navigation order and each entry's children, by permalink.
pub fn assert_nav_shape(graph: &PageGraph, expected: &[(&str, &[&str])]) {
    let actual: Vec<(&str, Vec<&str>)> = graph
        .navigation()
        .map(|p| (p.permalink.as_str(), permalinks_of(graph, &p.children)))
        .collect();
    let expected: Vec<(&str, Vec<&str>)> = expected
        .iter()
        .map(|(link, children)| (*link, children.to_vec()))
        .collect();
    assert_eq!(actual, expected, "navigation shape mismatch");
}
