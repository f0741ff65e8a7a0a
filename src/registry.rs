//! Extension registry: which files are data, which are prose, which are assets.
//!
//! Every file in a page directory is classified exactly once, by extension,
//! through a [`Registry`] built from the `[extensions]` config section. The
//! same registry feeds the content scanner its set of recognized extensions, so
//! "is this a page directory?" and "what is this file?" can never disagree.

use crate::config::ExtensionsConfig;
use std::collections::HashMap;
use std::path::Path;

/// What a recognized file contributes to its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Parsed as YAML, merged into the page's variables; may name the template.
    Metadata,
    /// Rendered from Markdown to HTML, stored under the file's base name.
    Markup,
}

#[derive(Debug, Clone)]
pub struct Registry {
    kinds: HashMap<String, FileKind>,
}

impl Registry {
    pub fn from_config(extensions: &ExtensionsConfig) -> Self {
        let mut kinds = HashMap::new();
        for ext in &extensions.metadata {
            kinds.insert(ext.to_ascii_lowercase(), FileKind::Metadata);
        }
        for ext in &extensions.markup {
            kinds.insert(ext.to_ascii_lowercase(), FileKind::Markup);
        }
        Self { kinds }
    }

    /// Classify a file by extension (case-insensitive). `None` means asset.
    pub fn kind_of(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.kinds.get(&ext).copied()
    }

    pub fn is_recognized(&self, path: &Path) -> bool {
        self.kind_of(path).is_some()
    }

    pub fn is_metadata(&self, path: &Path) -> bool {
        self.kind_of(path) == Some(FileKind::Metadata)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::from_config(&ExtensionsConfig::default())
    }
}
