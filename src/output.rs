//! CLI output formatting for `check` and `build`.
//!
//! # Information-First Display
//!
//! Every page leads with its positional index, display name and permalink; the
//! source directory and template follow as indented context lines. Pages in
//! navigation are shown as a tree in sibling order; everything else (floating
//! pages and their descendants) follows as a flat list.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Navigation
//! 001 Docs → /docs
//!     Source: 1.docs/
//!     Template: page
//!     001 Install → /docs/install
//!         Source: 1.docs/1.install/
//!         Template: page
//!         Assets: 1
//!
//! Other pages
//!     Index → /
//!         Source: index/
//!         Template: home
//!
//! Skipped
//!     /bare: content/1.bare: no metadata file names a template
//! ```
//!
//! ## Build
//!
//! ```text
//! / → index.html
//! /docs → docs/index.html
//! /docs/install → docs/install/index.html (+1 asset)
//!
//! Assets
//!     css/site.scss → css/site.css
//!     robots.txt
//!
//! Generated 3 pages, 2 assets
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::graph::{PageFailure, PageGraph, TackReport};
use crate::page::{Page, PageId};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display a path relative to `root` with `/` separators.
fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn display_name(page: &Page) -> &str {
    if page.title.is_empty() {
        &page.dir_name
    } else {
        &page.title
    }
}

fn page_context_lines(page: &Page, content_root: &Path, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth + 1);
    lines.push(format!(
        "{}Source: {}/",
        pad,
        relative_display(&page.disk_path, content_root)
    ));
    if let Some(template) = &page.template {
        lines.push(format!("{}Template: {}", pad, template));
    }
    if !page.assets.is_empty() {
        lines.push(format!("{}Assets: {}", pad, page.assets.len()));
    }
}

fn failure_lines(failures: &[PageFailure], lines: &mut Vec<String>) {
    if failures.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push("Skipped".to_string());
    for failure in failures {
        lines.push(format!("    {}: {}", failure.permalink, failure.error));
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the page tree of a graph without generating anything.
pub fn format_check_output(graph: &PageGraph) -> Vec<String> {
    let content_root = &graph.dirs().content;
    let mut lines = Vec::new();
    let mut shown = HashSet::new();

    let nav: Vec<PageId> = graph.site().navigation.clone();
    if !nav.is_empty() {
        lines.push("Navigation".to_string());
        walk_tree(graph, &nav, 0, content_root, &mut shown, &mut lines);
    }

    let mut others: Vec<&Page> = graph
        .pages()
        .iter()
        .filter(|p| !shown.contains(&p.id))
        .collect();
    others.sort_by(|a, b| a.permalink.cmp(&b.permalink));
    if !others.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Other pages".to_string());
        for page in others {
            lines.push(format!("    {} \u{2192} {}", display_name(page), page.permalink));
            page_context_lines(page, content_root, 1, &mut lines);
        }
    }

    failure_lines(graph.init_failures(), &mut lines);

    lines.push(format!(
        "{} pages, {} in navigation",
        graph.pages().len(),
        graph.site().navigation.len()
    ));
    lines
}

fn walk_tree(
    graph: &PageGraph,
    ids: &[PageId],
    depth: usize,
    content_root: &Path,
    shown: &mut HashSet<PageId>,
    lines: &mut Vec<String>,
) {
    for (i, &id) in ids.iter().enumerate() {
        let page = graph.site().page(id);
        shown.insert(id);
        lines.push(format!(
            "{}{} {} \u{2192} {}",
            indent(depth),
            format_index(i + 1),
            display_name(page),
            page.permalink
        ));
        page_context_lines(page, content_root, depth, lines);
        walk_tree(graph, &page.children, depth + 1, content_root, shown, lines);
    }
}

/// Print check output to stdout.
pub fn print_check_output(graph: &PageGraph) {
    for line in format_check_output(graph) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format the result of one tack, paths relative to `output_root`.
pub fn format_tack_report(report: &TackReport, output_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for page in &report.generated {
        let target = relative_display(&page.output, output_root);
        match page.assets {
            0 => lines.push(format!("{} \u{2192} {}", page.permalink, target)),
            1 => lines.push(format!("{} \u{2192} {} (+1 asset)", page.permalink, target)),
            n => lines.push(format!("{} \u{2192} {} (+{} assets)", page.permalink, target, n)),
        }
    }

    if !report.assets.is_empty() {
        lines.push(String::new());
        lines.push("Assets".to_string());
        for asset in &report.assets {
            let source = asset.source.to_string_lossy().replace('\\', "/");
            match (&asset.output, asset.filtered) {
                (Some(out), true) => lines.push(format!(
                    "    {} \u{2192} {}",
                    source,
                    relative_display(out, output_root)
                )),
                (None, true) => lines.push(format!("    {} (no output)", source)),
                _ => lines.push(format!("    {}", source)),
            }
        }
    }

    failure_lines(&report.failures, &mut lines);

    lines.push(String::new());
    let mut summary = format!(
        "Generated {} pages, {} assets",
        report.generated.len(),
        report.assets.len()
    );
    if !report.failures.is_empty() {
        summary.push_str(&format!(", skipped {}", report.failures.len()));
    }
    lines.push(summary);
    lines
}

/// Print build output to stdout.
pub fn print_tack_report(report: &TackReport, output_root: &Path) {
    for line in format_tack_report(report, output_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
