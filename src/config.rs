//! Site configuration module.
//!
//! Handles loading, validating, and merging the optional `tack.toml` that lives
//! next to the `content/` and `templates/` directories of a site. Stock defaults
//! are overridden by whatever the user file specifies.
//!
//! `tack.toml` is deliberately *not* YAML: the site's own `*.yaml` files in the
//! base directory are global template data, and keeping tool configuration in a
//! different format means the two never get mixed up.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # default_template = "page"   # Template for pages without a metadata file
//!
//! [dirs]
//! content = "content"           # Page sources
//! templates = "templates"       # Template sources
//! assets = "public"             # Static files copied verbatim (or filtered)
//! output = "output"             # Generated site
//!
//! [extensions]
//! metadata = ["yaml", "yml"]
//! markup = ["md", "mkd", "markdown"]
//! templates = ["html", "jinja", "j2"]   # Lookup priority order
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 8080
//! debounce_ms = 300
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// File name of the site configuration inside a site's base directory.
pub const CONFIG_FILE: &str = "tack.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `tack.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Template used for pages whose directory has no non-empty metadata file.
    /// When unset, such pages fail with a missing-template error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,
    /// Directory roles, relative to the site's base directory.
    pub dirs: DirsConfig,
    /// Recognized file extensions per role.
    pub extensions: ExtensionsConfig,
    /// Development server settings.
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Validate config values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.default_template
            && name.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "default_template must not be empty".into(),
            ));
        }

        let dirs = [
            ("dirs.content", &self.dirs.content),
            ("dirs.templates", &self.dirs.templates),
            ("dirs.assets", &self.dirs.assets),
            ("dirs.output", &self.dirs.output),
        ];
        for (key, value) in &dirs {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        for (i, (key_a, a)) in dirs.iter().enumerate() {
            for (key_b, b) in &dirs[i + 1..] {
                if a == b {
                    return Err(ConfigError::Validation(format!(
                        "{key_a} and {key_b} must be different directories"
                    )));
                }
            }
        }

        // Output is wiped on every run, so it must be a plain subdirectory of
        // the site that neither contains nor sits inside another role.
        let output = Path::new(&self.dirs.output);
        if !output
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ConfigError::Validation(format!(
                "dirs.output must be a relative path inside the site without \".\" or \"..\", got {:?}",
                self.dirs.output
            )));
        }
        for (key, value) in &dirs[..3] {
            let other = Path::new(value.as_str());
            if other.starts_with(output) || output.starts_with(other) {
                return Err(ConfigError::Validation(format!(
                    "dirs.output and {key} must not contain one another"
                )));
            }
        }

        let ext = &self.extensions;
        for (key, list) in [
            ("extensions.metadata", &ext.metadata),
            ("extensions.markup", &ext.markup),
            ("extensions.templates", &ext.templates),
        ] {
            if list.is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
            if list.iter().any(|e| e.is_empty() || e.starts_with('.')) {
                return Err(ConfigError::Validation(format!(
                    "{key} entries must be bare extensions like \"yaml\""
                )));
            }
        }
        if let Some(dup) = ext
            .metadata
            .iter()
            .find(|m| ext.markup.iter().any(|k| k.eq_ignore_ascii_case(m)))
        {
            return Err(ConfigError::Validation(format!(
                "extension \"{dup}\" cannot be both metadata and markup"
            )));
        }

        if self.serve.port == 0 {
            return Err(ConfigError::Validation("serve.port must be non-zero".into()));
        }
        Ok(())
    }
}

/// Directory roles inside a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
    pub content: String,
    pub templates: String,
    pub assets: String,
    pub output: String,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            content: "content".to_string(),
            templates: "templates".to_string(),
            assets: "public".to_string(),
            output: "output".to_string(),
        }
    }
}

/// Recognized file extensions (without the leading dot).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    /// Structured data files contributing page variables.
    pub metadata: Vec<String>,
    /// Prose files rendered to HTML and stored under their base name.
    pub markup: Vec<String>,
    /// Template files, in lookup priority order.
    pub templates: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            metadata: vec!["yaml".into(), "yml".into()],
            markup: vec!["md".into(), "mkd".into(), "markdown".into()],
            templates: vec!["html".into(), "jinja".into(), "j2".into()],
        }
    }
}

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub interface: String,
    pub port: u16,
    /// Quiet period after the last filesystem event before rebuilding.
    pub debounce_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 8080,
            debounce_ms: 300,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `tack.toml` from a site directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(base_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = base_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config for the site rooted at `base_dir`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(base_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let merged = match load_raw_config(base_dir)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `tack.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Tack Configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Template used for pages whose directory has no (non-empty) metadata file.
# Without it, such pages are reported and skipped.
# default_template = "page"

# ---------------------------------------------------------------------------
# Directory roles, relative to the site directory
# ---------------------------------------------------------------------------
[dirs]
# One sub-directory per page. Numeric prefixes ("1.intro") order pages.
content = "content"
# Templates, looked up by name: templates/<name>.<ext>
templates = "templates"
# Static files, mirrored into the output directory.
assets = "public"
# Generated site. Deleted and recreated on every build!
output = "output"

# ---------------------------------------------------------------------------
# Recognized extensions (without the dot)
# ---------------------------------------------------------------------------
[extensions]
# Metadata files: parsed as YAML, merged into page variables. The first
# non-empty one in a page directory names the page's template.
metadata = ["yaml", "yml"]
# Markup files: rendered from Markdown to HTML, stored under the file's base name.
markup = ["md", "mkd", "markdown"]
# Template files, in lookup priority order.
templates = ["html", "jinja", "j2"]

# ---------------------------------------------------------------------------
# Development server (tack serve)
# ---------------------------------------------------------------------------
[serve]
interface = "127.0.0.1"
port = 8080
# Quiet period after the last file change before a rebuild starts.
debounce_ms = 300
"##
}
