//! Static asset pipeline.
//!
//! Every file below the asset directory (`public/` by default) is mirrored into
//! the output directory at the same relative path. Files whose extension has a
//! registered [`AssetFilter`] are transformed on the way; all others are copied
//! byte for byte.
//!
//! Filters are held in an explicit [`AssetFilters`] registry that the caller
//! builds and hands to the pipeline. The stock registry knows one filter:
//! `.scss` compiled to `.css` through `grass`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot filter {}: {message}", path.display())]
    Filter { path: PathBuf, message: String },
}

impl AssetError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Transforms one asset file on its way into the output directory.
pub trait AssetFilter: Send + Sync {
    /// Process `source`. `dest` is the mirrored destination path; the filter
    /// substitutes its own extension. Returns the path actually written, or
    /// `None` if the file produces no output.
    fn apply(&self, source: &Path, dest: &Path) -> Result<Option<PathBuf>, AssetError>;
}

/// Extension → filter lookup.
#[derive(Clone, Default)]
pub struct AssetFilters {
    by_extension: HashMap<String, Arc<dyn AssetFilter>>,
}

impl AssetFilters {
    /// A registry with no filters: every asset is copied verbatim.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The stock registry.
    pub fn stock() -> Self {
        let mut filters = Self::empty();
        filters.register("scss", ScssFilter);
        filters
    }

    pub fn register(&mut self, extension: &str, filter: impl AssetFilter + 'static) {
        self.by_extension
            .insert(extension.to_ascii_lowercase(), Arc::new(filter));
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn AssetFilter> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).map(|f| f.as_ref())
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

impl std::fmt::Debug for AssetFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetFilters")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Sass (SCSS syntax) → CSS.
///
/// Partials (`_name.scss`) are only ever imported and produce no output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScssFilter;

impl AssetFilter for ScssFilter {
    fn apply(&self, source: &Path, dest: &Path) -> Result<Option<PathBuf>, AssetError> {
        let is_partial = source
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'));
        if is_partial {
            return Ok(None);
        }

        let css = grass::from_path(source, &grass::Options::default()).map_err(|err| {
            AssetError::Filter {
                path: source.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        let out = dest.with_extension("css");
        fs::write(&out, css).map_err(AssetError::io(&out))?;
        Ok(Some(out))
    }
}

/// One file the pipeline handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedAsset {
    /// Path relative to the asset directory.
    pub source: PathBuf,
    /// Path written, if any.
    pub output: Option<PathBuf>,
    pub filtered: bool,
}

/// Mirrors an asset directory into a target directory.
pub struct AssetPipeline<'a> {
    source_dir: &'a Path,
    target_dir: &'a Path,
    filters: &'a AssetFilters,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(source_dir: &'a Path, target_dir: &'a Path, filters: &'a AssetFilters) -> Self {
        Self {
            source_dir,
            target_dir,
            filters,
        }
    }

    /// Copy or filter every file. A missing asset directory copies nothing.
    pub fn run(&self) -> Result<Vec<CopiedAsset>, AssetError> {
        if !self.source_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut handled = Vec::new();
        for entry in WalkDir::new(self.source_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| AssetError::Io {
                path: err.path().unwrap_or(self.source_dir).to_path_buf(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let source = entry.path();
            let relative = source
                .strip_prefix(self.source_dir)
                .unwrap_or(source)
                .to_path_buf();
            let dest = self.target_dir.join(&relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(AssetError::io(parent))?;
            }

            if dest.exists() {
                tracing::warn!(
                    "asset {} replaces generated {}",
                    relative.display(),
                    dest.display()
                );
            }

            let (output, filtered) = match self.filters.for_path(source) {
                Some(filter) => (filter.apply(source, &dest)?, true),
                None => {
                    fs::copy(source, &dest).map_err(AssetError::io(&dest))?;
                    (Some(dest), false)
                }
            };
            tracing::debug!("asset {}", relative.display());
            handled.push(CopiedAsset {
                source: relative,
                output,
                filtered,
            });
        }
        Ok(handled)
    }
}
