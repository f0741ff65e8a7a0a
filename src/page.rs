//! Pages: one per content directory.
//!
//! A [`Page`] is created from a directory path alone ([`Page::new`]); nothing is
//! read from disk until [`Page::init`], which needs the complete [`PageIndex`]
//! so it can find its parent, siblings and children. After `init` a page is
//! never mutated again and can be rendered any number of times.
//!
//! ## Identity
//!
//! Pages live in a `Vec<Page>` owned by the page graph and refer to each other
//! through [`PageId`]s (their position in that vector). The [`PageIndex`] maps
//! directory paths to ids so linking is a hash lookup per page rather than a
//! scan over the whole set.
//!
//! ## Variables
//!
//! Files directly in the page directory are visited in file-name order:
//!
//! | File kind | Effect |
//! |-----------|--------|
//! | metadata (`*.yaml`) | merged into `variables`, later files win; the first non-empty one names the template |
//! | markup (`*.md`) | front matter merged into `variables`; body rendered and stored under the file stem |
//! | anything else | recorded as an asset, copied next to the rendered page |
//!
//! Sub-directories that are not pages themselves are walked for assets too.

use crate::markup::{self, Markdown};
use crate::metadata::{self, Metadata};
use crate::naming::parse_entry_name;
use crate::registry::{FileKind, Registry};
use crate::scan::is_hidden;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File name of the rendered document inside each page's output directory.
pub const INDEX_DOCUMENT: &str = "index.html";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("{}: no metadata file names a template", path.display())]
    MissingTemplate { path: PathBuf },
    #[error("{permalink}: template \"{name}\" not found")]
    TemplateNotFound { permalink: String, name: String },
    #[error("{permalink}: cannot render template \"{name}\": {message}")]
    Render {
        permalink: String,
        name: String,
        message: String,
    },
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Position of a page in the page graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(usize);

impl PageId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Page {
    pub id: PageId,
    /// Raw directory name, ordering prefix included. Sort key for siblings.
    pub dir_name: String,
    /// Directory name without the ordering prefix.
    pub name: String,
    /// Title-cased display form of `name`.
    pub title: String,
    pub disk_path: PathBuf,
    /// True when the directory name has no `N.` ordering prefix.
    pub floating: bool,

    pub parent: Option<PageId>,
    pub siblings: Vec<PageId>,
    pub children: Vec<PageId>,
    pub permalink: String,
    /// Paths relative to the page directory, `/`-separated, sorted.
    pub assets: Vec<String>,
    pub variables: Metadata,
    pub template: Option<String>,
}

/// Read-only lookup tables shared by every page during `init`.
#[derive(Debug, Default)]
pub struct PageIndex {
    by_path: HashMap<PathBuf, PageId>,
    /// Non-floating pages grouped by parent directory, sorted by raw name.
    ordered_by_dir: HashMap<PathBuf, Vec<PageId>>,
}

impl PageIndex {
    pub fn build(pages: &[Page]) -> Self {
        let mut by_path = HashMap::with_capacity(pages.len());
        let mut grouped: HashMap<PathBuf, Vec<&Page>> = HashMap::new();

        for page in pages {
            by_path.insert(page.disk_path.clone(), page.id);
            if !page.floating
                && let Some(dir) = page.disk_path.parent()
            {
                grouped.entry(dir.to_path_buf()).or_default().push(page);
            }
        }

        let ordered_by_dir = grouped
            .into_iter()
            .map(|(dir, mut group)| {
                group.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
                (dir, group.into_iter().map(|p| p.id).collect())
            })
            .collect();

        Self {
            by_path,
            ordered_by_dir,
        }
    }

    pub fn get(&self, path: &Path) -> Option<PageId> {
        self.by_path.get(path).copied()
    }

    pub fn is_page_dir(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Non-floating pages whose directory sits directly in `dir`.
    pub fn ordered_in(&self, dir: &Path) -> &[PageId] {
        self.ordered_by_dir.get(dir).map_or(&[], Vec::as_slice)
    }
}

/// Collaborators needed to read a page directory.
#[derive(Debug, Clone, Copy)]
pub struct InitContext<'a> {
    pub registry: &'a Registry,
    pub markdown: &'a Markdown,
    pub default_template: Option<&'a str>,
}

/// Everything a page needs to answer data lookups while being rendered.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub pages: &'a [Page],
    pub navigation: &'a [PageId],
    pub global: &'a Metadata,
    /// The page whose document is being produced.
    pub current: PageId,
}

/// Result of a data lookup on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    Value(Value),
    Borrowed(&'a Value),
    Page(PageId),
    Pages(Vec<PageId>),
}

/// Produces a page's document. Implemented by the template layer.
pub trait Renderer: Sync {
    fn render(&self, template: &str, page: &Page) -> Result<String, PageError>;
}

/// Outcome of [`Page::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPage {
    pub permalink: String,
    pub output: PathBuf,
    pub assets: usize,
}

impl Page {
    pub fn new(id: PageId, disk_path: PathBuf) -> Self {
        let dir_name = disk_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = parse_entry_name(&dir_name);

        Self {
            id,
            dir_name,
            name: parsed.name,
            title: parsed.display_title,
            disk_path,
            floating: !parsed.ordered,
            parent: None,
            siblings: Vec::new(),
            children: Vec::new(),
            permalink: String::new(),
            assets: Vec::new(),
            variables: Metadata::new(),
            template: None,
        }
    }

    /// Link the page into the tree and read its directory.
    ///
    /// Links are always set, even when reading fails, so a failed page still
    /// has a permalink to be reported under.
    pub fn init(&mut self, index: &PageIndex, ctx: &InitContext) -> Result<(), PageError> {
        self.link(index);
        self.load(index, ctx)?;

        if self.template.is_none() {
            self.template = ctx.default_template.map(str::to_string);
        }
        if self.template.is_none() {
            return Err(PageError::MissingTemplate {
                path: self.disk_path.clone(),
            });
        }
        Ok(())
    }

    fn link(&mut self, index: &PageIndex) {
        let parent_dir = self.disk_path.parent();
        self.parent = parent_dir.and_then(|dir| index.get(dir));
        self.siblings = parent_dir
            .map(|dir| index.ordered_in(dir))
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|&id| id != self.id)
            .collect();
        self.children = index.ordered_in(&self.disk_path).to_vec();
    }

    fn load(&mut self, index: &PageIndex, ctx: &InitContext) -> Result<(), PageError> {
        let walker = WalkDir::new(&self.disk_path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !is_hidden(e.file_name()) && !(e.file_type().is_dir() && index.is_page_dir(e.path()))
            });

        for entry in walker {
            let entry = entry.map_err(|err| PageError::Io {
                path: err.path().unwrap_or(&self.disk_path).to_path_buf(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let direct = entry.depth() == 1;

            match ctx.registry.kind_of(path).filter(|_| direct) {
                Some(FileKind::Metadata) => self.add_metadata_file(path, ctx.markdown),
                Some(FileKind::Markup) => self.add_markup_file(path, ctx.markdown)?,
                None => self.add_asset(path),
            }
        }
        self.assets.sort();
        Ok(())
    }

    fn add_asset(&mut self, path: &Path) {
        let relative = relative_slash_path(&self.disk_path, path);
        if relative == INDEX_DOCUMENT {
            tracing::warn!(
                "ignoring {}: it would replace the generated page",
                path.display()
            );
            return;
        }
        self.assets.push(relative);
    }

    fn add_metadata_file(&mut self, path: &Path, markdown: &Markdown) {
        let parsed = match metadata::parse_file(path, markdown) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("{err}");
                return;
            }
        };
        if parsed.is_empty() {
            return;
        }
        if self.template.is_none() {
            self.template = file_stem(path);
        }
        metadata::merge_into(&mut self.variables, parsed);
    }

    fn add_markup_file(&mut self, path: &Path, markdown: &Markdown) -> Result<(), PageError> {
        let bytes = fs::read(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        if matches!(text, std::borrow::Cow::Owned(_)) {
            tracing::warn!("{} is not valid UTF-8; replacing bad bytes", path.display());
        }

        let (front, body) = markup::split_front_matter(&text);
        if let Some(front) = front {
            match metadata::parse_str(front, markdown) {
                Ok(parsed) => metadata::merge_into(&mut self.variables, parsed),
                Err(message) => tracing::warn!(
                    "ignoring front matter of {}: {message}",
                    path.display()
                ),
            }
        }

        if let Some(key) = file_stem(path) {
            self.variables
                .insert(key, Value::String(markdown.to_html(body)));
        }
        Ok(())
    }

    /// Walk from the parent up to the root. Never yields the page itself.
    pub fn ancestors<'a>(&self, pages: &'a [Page]) -> Ancestors<'a> {
        Ancestors {
            pages,
            next: self.parent,
        }
    }

    /// Whether this page is at the top of the tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Look up `key` for a template.
    ///
    /// Reserved keys are computed from the tree; everything else comes from the
    /// page's own variables and then the site-wide metadata. `None` means the
    /// key is unknown everywhere.
    pub fn resolve_data<'a>(&'a self, key: &str, ctx: &RenderContext<'a>) -> Option<Resolved<'a>> {
        let computed = match key {
            "permalink" => Resolved::Value(Value::String(self.permalink.clone())),
            "slug" => Resolved::Value(Value::String(self.name.clone())),
            "name" => Resolved::Value(Value::String(self.title.clone())),
            "parent" => match self.parent {
                Some(id) => Resolved::Page(id),
                None => Resolved::Value(Value::Null),
            },
            "siblings" => Resolved::Pages(self.siblings.clone()),
            "children" => Resolved::Pages(self.children.clone()),
            "navigation" => Resolved::Pages(ctx.navigation.to_vec()),
            "ancestors" => {
                let mut chain: Vec<PageId> = self.ancestors(ctx.pages).map(|p| p.id).collect();
                chain.reverse();
                Resolved::Pages(chain)
            }
            "current" => Resolved::Value(Value::Bool(self.id == ctx.current)),
            "root" => Resolved::Value(Value::Bool(self.is_root())),
            "assets" => Resolved::Value(Value::from(self.assets.clone())),
            _ => {
                return self
                    .variables
                    .get(key)
                    .or_else(|| ctx.global.get(key))
                    .map(Resolved::Borrowed);
            }
        };
        Some(computed)
    }

    /// Directory this page renders into, below `target_dir`.
    pub fn output_dir(&self, target_dir: &Path) -> PathBuf {
        self.permalink
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(target_dir.to_path_buf(), |dir, segment| dir.join(segment))
    }

    /// Render the page and write it, with its assets, below `target_dir`.
    pub fn generate<R: Renderer + ?Sized>(
        &self,
        pages: &[Page],
        target_dir: &Path,
        renderer: &R,
    ) -> Result<GeneratedPage, PageError> {
        let template = self
            .template
            .as_deref()
            .ok_or_else(|| PageError::MissingTemplate {
                path: self.disk_path.clone(),
            })?;
        let dest_dir = self.output_dir(target_dir);

        tracing::debug!("generating {}", self.name);
        tracing::debug!(" - disk path: {}", self.disk_path.display());
        tracing::debug!(
            " - parent: {}",
            self.parent
                .map(|id| pages[id.index()].disk_path.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        tracing::debug!(" - permalink: {}", self.permalink);
        tracing::debug!(" - destdir: {}", dest_dir.display());
        tracing::debug!(
            " - ancestors: {}",
            self.ancestors(pages)
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(" << ")
        );
        tracing::debug!(
            " - siblings: {}",
            self.siblings
                .iter()
                .map(|id| pages[id.index()].name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        fs::create_dir_all(&dest_dir).map_err(|source| PageError::Output {
            path: dest_dir.clone(),
            source,
        })?;

        let html = renderer.render(template, self)?;
        let output = dest_dir.join(INDEX_DOCUMENT);
        fs::write(&output, html).map_err(|source| PageError::Output {
            path: output.clone(),
            source,
        })?;

        for asset in &self.assets {
            let dest = dest_dir.join(asset);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|source| PageError::Output {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            tracing::debug!("copying ...{asset}");
            fs::copy(self.disk_path.join(asset), &dest).map_err(|source| PageError::Output {
                path: dest.clone(),
                source,
            })?;
        }

        Ok(GeneratedPage {
            permalink: self.permalink.clone(),
            output,
            assets: self.assets.len(),
        })
    }
}

/// Iterator over a page's ancestors, nearest first.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    pages: &'a [Page],
    next: Option<PageId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Page;

    fn next(&mut self) -> Option<&'a Page> {
        let page = &self.pages[self.next?.index()];
        self.next = page.parent;
        Some(page)
    }
}

/// Permalink of `id`: the parent's permalink plus the page's name.
///
/// A root page called `index` is the site root, `/`.
pub fn compute_permalink(pages: &[Page], id: PageId) -> String {
    let page = &pages[id.index()];
    match page.parent {
        None if page.name == "index" => "/".to_string(),
        None => format!("/{}", page.name),
        Some(parent) => {
            let base = compute_permalink(pages, parent);
            format!("{}/{}", base.trim_end_matches('/'), page.name)
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn relative_slash_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan;
    use crate::test_helpers::write_site;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Build and init every page under `root`, returning per-page results.
    fn build(root: &Path, default_template: Option<&str>) -> (Vec<Page>, Vec<Result<(), PageError>>) {
        let registry = Registry::default();
        let markdown = Markdown::new();
        let mut pages: Vec<Page> = scan::scan(root, &registry)
            .into_iter()
            .enumerate()
            .map(|(i, path)| Page::new(PageId::new(i), path))
            .collect();
        let index = PageIndex::build(&pages);
        let ctx = InitContext {
            registry: &registry,
            markdown: &markdown,
            default_template,
        };
        let results = pages.iter_mut().map(|p| p.init(&index, &ctx)).collect();
        let permalinks: Vec<String> = (0..pages.len())
            .map(|i| compute_permalink(&pages, PageId::new(i)))
            .collect();
        for (page, link) in pages.iter_mut().zip(permalinks) {
            page.permalink = link;
        }
        (pages, results)
    }

    fn by_dir<'a>(pages: &'a [Page], dir: &str) -> &'a Page {
        pages.iter().find(|p| p.dir_name == dir).unwrap()
    }

    fn dir_names(pages: &[Page], ids: &[PageId]) -> Vec<String> {
        ids.iter().map(|id| pages[id.index()].dir_name.clone()).collect()
    }

    fn context<'a>(pages: &'a [Page], global: &'a Metadata, current: PageId) -> RenderContext<'a> {
        RenderContext {
            pages,
            navigation: &[],
            global,
            current,
        }
    }

    // =========================================================================
    // Tree linking
    // =========================================================================

    #[test]
    fn siblings_exclude_self_and_floating_in_raw_name_order() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("2.setup/page.yaml", "a: 1\n"),
                ("alpha/page.yaml", "a: 1\n"),
                ("1.intro/page.yaml", "a: 1\n"),
                ("10.later/page.yaml", "a: 1\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        let intro = by_dir(&pages, "1.intro");
        assert_eq!(dir_names(&pages, &intro.siblings), vec!["10.later", "2.setup"]);

        let alpha = by_dir(&pages, "alpha");
        assert_eq!(
            dir_names(&pages, &alpha.siblings),
            vec!["1.intro", "10.later", "2.setup"]
        );

        for page in &pages {
            assert!(!page.siblings.contains(&page.id));
            assert!(page.siblings.iter().all(|id| !pages[id.index()].floating));
        }
    }

    #[test]
    fn parent_and_children_are_linked() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("1.docs/page.yaml", "a: 1\n"),
                ("1.docs/2.usage/page.yaml", "a: 1\n"),
                ("1.docs/1.install/page.yaml", "a: 1\n"),
                ("1.docs/extra/page.yaml", "a: 1\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        let docs = by_dir(&pages, "1.docs");
        assert!(docs.is_root());
        assert_eq!(dir_names(&pages, &docs.children), vec!["1.install", "2.usage"]);

        let install = by_dir(&pages, "1.install");
        assert_eq!(install.parent, Some(docs.id));
    }

    #[test]
    fn page_under_non_page_directory_is_root() {
        let tmp = TempDir::new().unwrap();
        write_site(tmp.path(), &[("group/1.inner/page.yaml", "a: 1\n")]);
        let (pages, _) = build(tmp.path(), None);

        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_root());
        assert_eq!(pages[0].permalink, "/inner");
    }

    #[test]
    fn permalink_joins_ancestor_names() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("index/page.yaml", "a: 1\n"),
                ("1.docs/page.yaml", "a: 1\n"),
                ("1.docs/3.deep-dive/page.yaml", "a: 1\n"),
                ("1.docs/3.deep-dive/x/page.yaml", "a: 1\n"),
                ("index/1.welcome/page.yaml", "a: 1\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        assert_eq!(by_dir(&pages, "index").permalink, "/");
        assert_eq!(by_dir(&pages, "1.docs").permalink, "/docs");
        assert_eq!(by_dir(&pages, "3.deep-dive").permalink, "/docs/deep-dive");
        assert_eq!(by_dir(&pages, "x").permalink, "/docs/deep-dive/x");
        assert_eq!(by_dir(&pages, "1.welcome").permalink, "/welcome");
    }

    #[test]
    fn nested_index_is_not_the_site_root() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("docs/page.yaml", "a: 1\n"), ("docs/index/page.yaml", "a: 1\n")],
        );
        let (pages, _) = build(tmp.path(), None);
        assert_eq!(by_dir(&pages, "index").permalink, "/docs/index");
    }

    #[test]
    fn ancestors_walk_to_root_and_restart() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("1.a/page.yaml", "a: 1\n"),
                ("1.a/1.b/page.yaml", "a: 1\n"),
                ("1.a/1.b/1.c/page.yaml", "a: 1\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);
        let c = by_dir(&pages, "1.c");

        let names: Vec<&str> = c.ancestors(&pages).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(c.ancestors(&pages).count(), 2);
        assert_eq!(by_dir(&pages, "1.a").ancestors(&pages).count(), 0);
    }

    // =========================================================================
    // Directory loading
    // =========================================================================

    #[test]
    fn template_from_first_non_empty_metadata_file() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("p/a-empty.yaml", ""),
                ("p/b-article.yaml", "title: First\n"),
                ("p/c-extra.yml", "title: Second\n"),
            ],
        );
        let (pages, results) = build(tmp.path(), None);

        assert!(results[0].is_ok());
        assert_eq!(pages[0].template.as_deref(), Some("b-article"));
    }

    #[test]
    fn metadata_merge_is_last_write_wins_by_file_name() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("p/2-second.yaml", "title: Second\nonly2: yes\n"),
                ("p/1-first.yaml", "title: First\nonly1: yes\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        let vars = &pages[0].variables;
        assert_eq!(vars["title"], json!("Second"));
        assert_eq!(vars["only1"], json!("yes"));
        assert_eq!(vars["only2"], json!("yes"));
        assert_eq!(pages[0].template.as_deref(), Some("1-first"));
    }

    #[test]
    fn markup_body_stored_under_stem_after_metadata() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("p/body.md", "Hello *there*\n"),
                ("p/page.yaml", "body: from yaml\nintro: kept\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        // body.md sorts before page.yaml, so the metadata value is scanned later.
        assert_eq!(pages[0].variables["body"], json!("from yaml"));
        assert_eq!(pages[0].variables["intro"], json!("kept"));
    }

    #[test]
    fn markup_scanned_after_metadata_overwrites() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("p/page.yaml", "text: from yaml\n"),
                ("p/text.md", "Hello\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);
        assert_eq!(pages[0].variables["text"], json!("<p>Hello</p>\n"));
    }

    #[test]
    fn front_matter_merges_but_does_not_name_template() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("p/post.md", "---\ntitle: From front matter\n---\nBody\n")],
        );
        let (pages, results) = build(tmp.path(), None);

        assert!(matches!(results[0], Err(PageError::MissingTemplate { .. })));
        assert_eq!(pages[0].variables["title"], json!("From front matter"));
        assert_eq!(pages[0].variables["post"], json!("<p>Body</p>\n"));
    }

    #[test]
    fn missing_template_fails_only_that_page() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("1.bare/body.md", "text\n"), ("2.ok/page.yaml", "a: 1\n")],
        );
        let (pages, results) = build(tmp.path(), None);

        let bare = by_dir(&pages, "1.bare").id.index();
        let ok = by_dir(&pages, "2.ok").id.index();
        assert!(matches!(results[bare], Err(PageError::MissingTemplate { .. })));
        assert!(results[ok].is_ok());
    }

    #[test]
    fn default_template_fills_gap() {
        let tmp = TempDir::new().unwrap();
        write_site(tmp.path(), &[("p/body.md", "text\n")]);
        let (pages, results) = build(tmp.path(), Some("page"));

        assert!(results[0].is_ok());
        assert_eq!(pages[0].template.as_deref(), Some("page"));
    }

    #[test]
    fn malformed_metadata_keeps_other_files() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("p/a.yaml", "broken: [1, 2\n"), ("p/b.yaml", "title: Good\n")],
        );
        let (pages, results) = build(tmp.path(), None);

        assert!(results[0].is_ok());
        assert_eq!(pages[0].template.as_deref(), Some("b"));
        assert_eq!(pages[0].variables["title"], json!("Good"));
    }

    #[test]
    fn assets_collected_but_subpages_excluded() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("p/page.yaml", "a: 1\n"),
                ("p/photo.jpg", "jpg"),
                ("p/files/doc.pdf", "pdf"),
                ("p/.DS_Store", "junk"),
                ("p/1.sub/page.yaml", "a: 1\n"),
                ("p/1.sub/sub.png", "png"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);

        assert_eq!(by_dir(&pages, "p").assets, vec!["files/doc.pdf", "photo.jpg"]);
        assert_eq!(by_dir(&pages, "1.sub").assets, vec!["sub.png"]);
    }

    #[test]
    fn markup_with_invalid_utf8_keeps_the_page() {
        let tmp = TempDir::new().unwrap();
        write_site(tmp.path(), &[("1.a/page.yaml", "title: A\n")]);
        fs::write(tmp.path().join("1.a/body.md"), b"caf\xe9 *au lait*").unwrap();

        let (pages, results) = build(tmp.path(), None);
        assert!(results[0].is_ok());
        let body = pages[0].variables["body"].as_str().unwrap();
        assert!(body.contains("caf\u{FFFD}"));
        assert!(body.contains("<em>au lait</em>"));
        assert_eq!(pages[0].variables["title"], json!("A"));
    }

    #[test]
    fn index_document_is_never_an_asset() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("1.a/page.yaml", "a: 1\n"),
                ("1.a/index.html", "stale"),
                ("1.a/old/index.html", "kept"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);
        assert_eq!(by_dir(&pages, "1.a").assets, vec!["old/index.html"]);

        let out = TempDir::new().unwrap();
        let renderer = FakeRenderer {
            calls: Mutex::new(Vec::new()),
        };
        let generated = pages[0].generate(&pages, out.path(), &renderer).unwrap();
        assert_eq!(
            fs::read_to_string(&generated.output).unwrap(),
            "<p>/a via page</p>"
        );
    }

    // =========================================================================
    // Data resolution
    // =========================================================================

    #[test]
    fn page_value_shadows_global_and_global_fills_gaps() {
        let tmp = TempDir::new().unwrap();
        write_site(tmp.path(), &[("p/page.yaml", "title: Page title\n")]);
        let (pages, _) = build(tmp.path(), None);

        let mut global = Metadata::new();
        global.insert("title".into(), json!("Site title"));
        global.insert("author".into(), json!("Ada"));
        let ctx = context(&pages, &global, pages[0].id);

        assert_eq!(
            pages[0].resolve_data("title", &ctx),
            Some(Resolved::Borrowed(&json!("Page title")))
        );
        assert_eq!(
            pages[0].resolve_data("author", &ctx),
            Some(Resolved::Borrowed(&json!("Ada")))
        );
        assert_eq!(pages[0].resolve_data("missing", &ctx), None);
    }

    #[test]
    fn reserved_keys_win_over_variables() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("1.getting-started/page.yaml", "permalink: /fake\nname: fake\n")],
        );
        let (pages, _) = build(tmp.path(), None);
        let global = Metadata::new();
        let ctx = context(&pages, &global, pages[0].id);
        let page = &pages[0];

        assert_eq!(
            page.resolve_data("permalink", &ctx),
            Some(Resolved::Value(json!("/getting-started")))
        );
        assert_eq!(
            page.resolve_data("slug", &ctx),
            Some(Resolved::Value(json!("getting-started")))
        );
        assert_eq!(
            page.resolve_data("name", &ctx),
            Some(Resolved::Value(json!("Getting Started")))
        );
        assert_eq!(
            page.resolve_data("parent", &ctx),
            Some(Resolved::Value(Value::Null))
        );
        assert_eq!(page.resolve_data("root", &ctx), Some(Resolved::Value(json!(true))));
    }

    #[test]
    fn current_is_true_only_for_render_subject() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[("1.a/page.yaml", "a: 1\n"), ("2.b/page.yaml", "a: 1\n")],
        );
        let (pages, _) = build(tmp.path(), None);
        let global = Metadata::new();
        let a = by_dir(&pages, "1.a");
        let b = by_dir(&pages, "2.b");
        let ctx = context(&pages, &global, a.id);

        assert_eq!(a.resolve_data("current", &ctx), Some(Resolved::Value(json!(true))));
        assert_eq!(b.resolve_data("current", &ctx), Some(Resolved::Value(json!(false))));
    }

    #[test]
    fn ancestors_key_is_root_first() {
        let tmp = TempDir::new().unwrap();
        write_site(
            tmp.path(),
            &[
                ("1.a/page.yaml", "a: 1\n"),
                ("1.a/1.b/page.yaml", "a: 1\n"),
                ("1.a/1.b/1.c/page.yaml", "a: 1\n"),
            ],
        );
        let (pages, _) = build(tmp.path(), None);
        let global = Metadata::new();
        let c = by_dir(&pages, "1.c");
        let ctx = context(&pages, &global, c.id);

        match c.resolve_data("ancestors", &ctx) {
            Some(Resolved::Pages(ids)) => assert_eq!(dir_names(&pages, &ids), vec!["1.a", "1.b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    struct FakeRenderer {
        calls: Mutex<Vec<String>>,
    }

    impl Renderer for FakeRenderer {
        fn render(&self, template: &str, page: &Page) -> Result<String, PageError> {
            self.calls.lock().unwrap().push(template.to_string());
            Ok(format!("<p>{} via {}</p>", page.permalink, template))
        }
    }

    struct MissingRenderer;

    impl Renderer for MissingRenderer {
        fn render(&self, template: &str, page: &Page) -> Result<String, PageError> {
            Err(PageError::TemplateNotFound {
                permalink: page.permalink.clone(),
                name: template.to_string(),
            })
        }
    }

    #[test]
    fn generate_writes_index_document_and_assets() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_site(
            src.path(),
            &[
                ("1.docs/article.yaml", "a: 1\n"),
                ("1.docs/img/logo.png", "PNG"),
            ],
        );
        let (pages, _) = build(src.path(), None);
        let renderer = FakeRenderer {
            calls: Mutex::new(Vec::new()),
        };

        let generated = pages[0].generate(&pages, out.path(), &renderer).unwrap();

        assert_eq!(generated.output, out.path().join("docs/index.html"));
        assert_eq!(
            fs::read_to_string(&generated.output).unwrap(),
            "<p>/docs via article</p>"
        );
        assert_eq!(
            fs::read(out.path().join("docs/img/logo.png")).unwrap(),
            b"PNG"
        );
        assert_eq!(generated.assets, 1);
        assert_eq!(*renderer.calls.lock().unwrap(), vec!["article"]);
    }

    #[test]
    fn root_index_generates_at_target_root() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_site(src.path(), &[("index/home.yaml", "a: 1\n")]);
        let (pages, _) = build(src.path(), None);
        let renderer = FakeRenderer {
            calls: Mutex::new(Vec::new()),
        };

        let generated = pages[0].generate(&pages, out.path(), &renderer).unwrap();
        assert_eq!(generated.output, out.path().join("index.html"));
    }

    #[test]
    fn generate_surfaces_renderer_errors() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_site(src.path(), &[("p/nope.yaml", "a: 1\n")]);
        let (pages, _) = build(src.path(), None);

        let err = pages[0].generate(&pages, out.path(), &MissingRenderer).unwrap_err();
        assert!(matches!(err, PageError::TemplateNotFound { ref name, .. } if name == "nope"));
        assert!(!out.path().join("p/index.html").exists());
    }
}
