//! The page graph: every page of a site, linked, plus what it takes to tack it.
//!
//! Building a [`PageGraph`] is a barrier: all pages are constructed first, then
//! every page is initialized against the complete, read-only [`PageIndex`].
//! Initialization and generation both fan out across threads with `rayon`;
//! neither mutates anything shared.
//!
//! ```text
//! site/
//! ├── tack.toml       # optional tool configuration
//! ├── site.yaml       # global metadata (every *.yaml / *.yml here)
//! ├── content/        # one directory per page
//! ├── templates/      # minijinja templates, looked up by name
//! ├── public/         # static assets, mirrored into output/
//! └── output/         # generated; wiped on every tack
//! ```
//!
//! A page that cannot be initialized or rendered is reported in the
//! [`TackReport`] and skipped; the rest of the site is still written. Failing
//! to write output, or to copy assets, aborts the run.

use crate::assets::{AssetError, AssetFilters, AssetPipeline, CopiedAsset};
use crate::config::{self, ConfigError, SiteConfig};
use crate::markup::Markdown;
use crate::metadata::{self, Metadata, MetadataError};
use crate::page::{
    GeneratedPage, InitContext, Page, PageError, PageId, PageIndex, RenderContext,
    compute_permalink,
};
use crate::registry::Registry;
use crate::scan;
use crate::template::{SiteRenderer, TemplateResolver};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TackError {
    #[error("{} is not a site: it has neither a content nor a templates directory", path.display())]
    NotASite { path: PathBuf },
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot load site metadata: {0}")]
    GlobalMetadata(#[from] MetadataError),
    #[error("{} and {} both map to {permalink}", first.display(), second.display())]
    DuplicatePermalink {
        permalink: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("cannot write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

/// The linked, initialized pages of a site. Immutable once built.
#[derive(Debug, Default)]
pub struct Site {
    pub pages: Vec<Page>,
    /// Root-level, non-floating pages in raw directory-name order.
    pub navigation: Vec<PageId>,
    pub global: Metadata,
}

impl Site {
    pub fn context(&self, current: PageId) -> RenderContext<'_> {
        RenderContext {
            pages: &self.pages,
            navigation: &self.navigation,
            global: &self.global,
            current,
        }
    }

    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.index()]
    }
}

/// A page that was skipped, and why.
#[derive(Debug, Clone)]
pub struct PageFailure {
    pub disk_path: PathBuf,
    pub permalink: String,
    pub error: Arc<PageError>,
}

/// What one `tack` produced.
#[derive(Debug, Default)]
pub struct TackReport {
    /// Sorted by permalink.
    pub generated: Vec<GeneratedPage>,
    /// Sorted by permalink.
    pub failures: Vec<PageFailure>,
    pub assets: Vec<CopiedAsset>,
}

impl TackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolved directory roles of one site.
#[derive(Debug, Clone)]
pub struct SiteDirs {
    pub base: PathBuf,
    pub content: PathBuf,
    pub templates: PathBuf,
    pub assets: PathBuf,
    pub output: PathBuf,
}

impl SiteDirs {
    pub fn new(base_dir: &Path, config: &SiteConfig) -> Self {
        Self {
            base: base_dir.to_path_buf(),
            content: base_dir.join(&config.dirs.content),
            templates: base_dir.join(&config.dirs.templates),
            assets: base_dir.join(&config.dirs.assets),
            output: base_dir.join(&config.dirs.output),
        }
    }
}

#[derive(Debug)]
pub struct PageGraph {
    dirs: SiteDirs,
    site: Arc<Site>,
    index: PageIndex,
    init_failures: Vec<PageFailure>,
    templates: TemplateResolver,
    filters: AssetFilters,
}

impl PageGraph {
    /// Load `tack.toml` from `base_dir` and build the graph with stock filters.
    pub fn open(base_dir: &Path) -> Result<Self, TackError> {
        if !base_dir.is_dir() {
            return Err(TackError::NotASite {
                path: base_dir.to_path_buf(),
            });
        }
        let config = config::load_config(base_dir)?;
        Self::build(base_dir, &config, &Markdown::new(), AssetFilters::stock())
    }

    /// Build the graph for the site at `base_dir`.
    pub fn build(
        base_dir: &Path,
        config: &SiteConfig,
        markdown: &Markdown,
        filters: AssetFilters,
    ) -> Result<Self, TackError> {
        config.validate()?;
        let dirs = SiteDirs::new(base_dir, config);
        if !(base_dir.is_dir() && (dirs.content.is_dir() || dirs.templates.is_dir())) {
            return Err(TackError::NotASite {
                path: base_dir.to_path_buf(),
            });
        }
        let registry = Registry::from_config(&config.extensions);

        let global = load_global_metadata(base_dir, &registry, markdown)?;

        let mut pages: Vec<Page> = scan::scan(&dirs.content, &registry)
            .into_iter()
            .enumerate()
            .map(|(i, path)| Page::new(PageId::new(i), path))
            .collect();
        let index = PageIndex::build(&pages);

        let ctx = InitContext {
            registry: &registry,
            markdown,
            default_template: config.default_template.as_deref(),
        };
        let results: Vec<Result<(), PageError>> =
            pages.par_iter_mut().map(|p| p.init(&index, &ctx)).collect();

        let permalinks: Vec<String> = (0..pages.len())
            .map(|i| compute_permalink(&pages, PageId::new(i)))
            .collect();
        for (page, permalink) in pages.iter_mut().zip(permalinks) {
            page.permalink = permalink;
        }
        check_unique_permalinks(&pages)?;

        let init_failures: Vec<PageFailure> = pages
            .iter()
            .zip(results)
            .filter_map(|(page, result)| result.err().map(|err| failure(page, err)))
            .collect();
        for f in &init_failures {
            tracing::warn!("skipping {}: {}", f.permalink, f.error);
        }

        let mut navigation: Vec<&Page> = pages
            .iter()
            .filter(|p| p.is_root() && !p.floating)
            .collect();
        navigation.sort_by(|a, b| {
            a.dir_name
                .cmp(&b.dir_name)
                .then_with(|| a.disk_path.cmp(&b.disk_path))
        });
        let navigation = navigation.into_iter().map(|p| p.id).collect();

        tracing::debug!(
            "built page graph for {}: {} pages",
            base_dir.display(),
            pages.len()
        );

        Ok(Self {
            templates: TemplateResolver::new(&dirs.templates, config.extensions.templates.clone()),
            dirs,
            site: Arc::new(Site {
                pages,
                navigation,
                global,
            }),
            index,
            init_failures,
            filters,
        })
    }

    pub fn dirs(&self) -> &SiteDirs {
        &self.dirs
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn pages(&self) -> &[Page] {
        &self.site.pages
    }

    pub fn navigation(&self) -> impl Iterator<Item = &Page> {
        self.site.navigation.iter().map(|&id| self.site.page(id))
    }

    pub fn global_metadata(&self) -> &Metadata {
        &self.site.global
    }

    /// Pages that failed to initialize and will be skipped.
    pub fn init_failures(&self) -> &[PageFailure] {
        &self.init_failures
    }

    /// The page whose source directory is `path`.
    pub fn page_at(&self, path: &Path) -> Option<&Page> {
        self.index.get(path).map(|id| self.site.page(id))
    }

    /// Template file for `name`; an empty name means `default`.
    pub fn find_template(&self, name: &str) -> Option<PathBuf> {
        self.templates.find(name)
    }

    /// Regenerate the whole output directory.
    pub fn tack(&self) -> Result<TackReport, TackError> {
        let output = &self.dirs.output;
        if output.exists() {
            fs::remove_dir_all(output).map_err(|source| TackError::OutputWrite {
                path: output.clone(),
                source,
            })?;
        }
        fs::create_dir_all(output).map_err(|source| TackError::OutputWrite {
            path: output.clone(),
            source,
        })?;

        let skipped: Vec<PageId> = self
            .init_failures
            .iter()
            .filter_map(|f| self.index.get(&f.disk_path))
            .collect();
        let renderer = SiteRenderer::new(&self.templates, Arc::clone(&self.site));

        let results: Vec<(PageId, Result<GeneratedPage, PageError>)> = self
            .site
            .pages
            .par_iter()
            .filter(|page| !skipped.contains(&page.id))
            .map(|page| (page.id, page.generate(&self.site.pages, output, &renderer)))
            .collect();

        let mut report = TackReport {
            failures: self.init_failures.clone(),
            ..TackReport::default()
        };
        for (id, result) in results {
            match result {
                Ok(generated) => report.generated.push(generated),
                Err(PageError::Output { path, source }) => {
                    return Err(TackError::OutputWrite { path, source });
                }
                Err(err) => {
                    let page = self.site.page(id);
                    tracing::warn!("skipping {}: {err}", page.permalink);
                    report.failures.push(failure(page, err));
                }
            }
        }
        report.generated.sort_by(|a, b| a.permalink.cmp(&b.permalink));
        report.failures.sort_by(|a, b| a.permalink.cmp(&b.permalink));

        report.assets = AssetPipeline::new(&self.dirs.assets, output, &self.filters).run()?;

        tracing::info!(
            "tacked {} pages ({} skipped), {} assets",
            report.generated.len(),
            report.failures.len(),
            report.assets.len()
        );
        Ok(report)
    }
}

fn failure(page: &Page, error: PageError) -> PageFailure {
    PageFailure {
        disk_path: page.disk_path.clone(),
        permalink: page.permalink.clone(),
        error: Arc::new(error),
    }
}

/// Merge every metadata file directly in `base_dir`, in file-name order.
fn load_global_metadata(
    base_dir: &Path,
    registry: &Registry,
    markdown: &Markdown,
) -> Result<Metadata, MetadataError> {
    let io_err = |source| MetadataError::Io {
        path: base_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(base_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file()
            && registry.is_metadata(&path)
            && !path.file_name().is_some_and(scan::is_hidden)
        {
            files.push(path);
        }
    }
    files.sort();

    let mut global = Metadata::new();
    for path in files {
        metadata::merge_into(&mut global, metadata::parse_file(&path, markdown)?);
    }
    Ok(global)
}

/// Two pages collide when they render into the same directory, which also
/// catches permalinks that differ only by a trailing `/` (`1.docs/3.`).
fn check_unique_permalinks(pages: &[Page]) -> Result<(), TackError> {
    let mut seen: HashMap<PathBuf, &Page> = HashMap::with_capacity(pages.len());
    for page in pages {
        if let Some(first) = seen.insert(page.output_dir(Path::new("")), page) {
            return Err(TackError::DuplicatePermalink {
                permalink: page.permalink.clone(),
                first: first.disk_path.clone(),
                second: page.disk_path.clone(),
            });
        }
    }
    Ok(())
}
