//! # Tack
//!
//! A minimal static site generator. Directories become pages, YAML files become
//! template variables, and templates do the rest.
//!
//! # Site Layout
//!
//! ```text
//! site/
//! ├── tack.toml                # optional; `tack gen-config` prints every key
//! ├── site.yaml                # global variables, visible from every page
//! ├── content/
//! │   ├── index/               # unordered page: reachable, not in navigation
//! │   │   └── home.yaml        # file stem names the template ("home")
//! │   ├── 1.docs/              # ordered page: /docs, first in navigation
//! │   │   ├── page.yaml
//! │   │   ├── body.md          # rendered to HTML, exposed as `body`
//! │   │   ├── 1.install/       # child page: /docs/install
//! │   │   └── diagram.svg      # asset, copied next to index.html
//! │   └── 2.blog/
//! ├── templates/               # minijinja; `extends`/`include` by name
//! └── public/                  # mirrored into output/, `.scss` compiled
//! ```
//!
//! # Pipeline
//!
//! ```text
//! scan content/  →  construct pages  →  init (parallel)  →  permalinks
//!                                          │
//!          output/  ←  assets  ←  generate (parallel)  ←──┘
//! ```
//!
//! Construction and initialization are separate passes: initialization needs
//! the complete [`page::PageIndex`] to find parents and siblings, so no page
//! is initialized until every page exists. After that the graph is read-only
//! and shared across render threads.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`graph`] | Builds the page graph for a site and tacks it into `output/` |
//! | [`page`] | One page: linking, loading its files, variable lookup, generation |
//! | [`scan`] | Finds page directories under `content/` |
//! | [`naming`] | `N.name` directory convention: order, permalink segment, title |
//! | [`metadata`] | YAML to variables, with markup rendering for literal blocks |
//! | [`markup`] | Markdown rendering and front matter splitting |
//! | [`registry`] | Which file extensions count as metadata or markup |
//! | [`template`] | Template lookup and the minijinja view of a page |
//! | [`assets`] | Mirrors `public/` into `output/` through per-extension filters |
//! | [`config`] | `tack.toml` loading, merging over stock defaults, validation |
//! | [`serve`] | Development HTTP server |
//! | [`watch`] | Filesystem watcher driving dev-server rebuilds |
//! | [`checkpoint`] | Modification-time snapshots used to skip no-op rebuilds |
//! | [`output`] | CLI output formatting for `check` and `build` |
//!
//! # Design Decisions
//!
//! ## Pages in an Arena
//!
//! Pages refer to their parent, siblings and children constantly, and those
//! references form cycles. The graph stores pages in one `Vec` and links them
//! with [`page::PageId`] indices, so the whole structure is plain data that
//! can be shared between threads without locks.
//!
//! ## One Bad Page Does Not Sink the Site
//!
//! A page without a template, or whose template fails to render, is reported
//! and skipped. Problems that make the output untrustworthy as a whole (a
//! broken `site.yaml`, two pages claiming one permalink, a failed write) stop
//! the run.
//!
//! ## Clean Output Every Time
//!
//! `output/` is deleted and regenerated on each tack. There is no incremental
//! mode to get out of sync; the dev server skips a rebuild only when nothing
//! under the site changed at all.

pub mod assets;
pub mod checkpoint;
pub mod config;
pub mod graph;
pub mod markup;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod page;
pub mod registry;
pub mod scan;
pub mod serve;
pub mod template;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
