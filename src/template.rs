//! Template lookup and rendering.
//!
//! Templates are minijinja files found by name under the templates directory:
//! `name` resolves to the first existing `templates/name.<ext>` over the
//! configured extensions (`html`, `jinja`, `j2` by default). The same rule
//! serves the page's own template and every `{% include %}`, `{% extends %}` or
//! `{% import %}` inside it, because the resolver is installed as the
//! environment's loader.
//!
//! A page is rendered with a [`PageView`] as the root context: every variable a
//! template reads goes through [`Page::resolve_data`], and pages reachable from
//! it (`parent`, `siblings`, `navigation`...) are views too, so
//! `{% for p in navigation %}{{ p.name }}{% endfor %}` works without building a
//! copy of the site per page.
//!
//! Missing variables, and attributes of missing variables, render as empty
//! rather than failing.

use crate::graph::Site;
use crate::page::{Page, PageError, PageId, Renderer, Resolved};
use minijinja::value::{Object, Value};
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use std::error::Error as _;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Name used when a template is requested with an empty name.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Finds template files by name.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl TemplateResolver {
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    /// Path of the template called `name`, if one exists.
    ///
    /// An empty name means [`DEFAULT_TEMPLATE`]. Names may contain `/` to reach
    /// into sub-directories but never `..`. A name that already carries one of
    /// the recognized extensions also matches the file of that exact name.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let name = if name.is_empty() { DEFAULT_TEMPLATE } else { name };
        if !is_safe_name(name) {
            return None;
        }

        let by_extension = self
            .extensions
            .iter()
            .map(|ext| self.dir.join(format!("{name}.{ext}")))
            .find(|candidate| candidate.is_file());
        if by_extension.is_some() {
            return by_extension;
        }

        let exact = self.dir.join(name);
        let has_known_ext = exact
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(e)));
        (has_known_ext && exact.is_file()).then_some(exact)
    }

    /// A template environment that loads through this resolver.
    ///
    /// Output is never auto-escaped: page variables routinely hold rendered
    /// Markdown.
    pub fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        let resolver = self.clone();
        env.set_loader(move |name| match resolver.find(name) {
            Some(path) => fs::read_to_string(&path).map(Some).map_err(|err| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read template {}", path.display()),
                )
                .with_source(err)
            }),
            None => Ok(None),
        });
        env
    }
}

fn is_safe_name(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Renders pages of one [`Site`] through a shared template environment.
pub struct SiteRenderer {
    env: Environment<'static>,
    site: Arc<Site>,
}

impl SiteRenderer {
    pub fn new(resolver: &TemplateResolver, site: Arc<Site>) -> Self {
        Self {
            env: resolver.environment(),
            site,
        }
    }
}

impl Renderer for SiteRenderer {
    fn render(&self, template: &str, page: &Page) -> Result<String, PageError> {
        let name = if template.is_empty() {
            DEFAULT_TEMPLATE
        } else {
            template
        };

        let compiled = self.env.get_template(name).map_err(|err| match err.kind() {
            ErrorKind::TemplateNotFound => PageError::TemplateNotFound {
                permalink: page.permalink.clone(),
                name: name.to_string(),
            },
            _ => render_error(page, name, &err),
        })?;

        let view = PageView::new(Arc::clone(&self.site), page.id, page.id);
        compiled
            .render(Value::from_object(view))
            .map_err(|err| render_error(page, name, &err))
    }
}

fn render_error(page: &Page, name: &str, err: &minijinja::Error) -> PageError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    PageError::Render {
        permalink: page.permalink.clone(),
        name: name.to_string(),
        message,
    }
}

/// Template-side view of one page.
pub struct PageView {
    site: Arc<Site>,
    page: PageId,
    /// Page whose document is being rendered.
    current: PageId,
}

impl PageView {
    pub fn new(site: Arc<Site>, page: PageId, current: PageId) -> Self {
        Self {
            site,
            page,
            current,
        }
    }

    fn view_of(&self, page: PageId) -> Value {
        Value::from_object(PageView::new(Arc::clone(&self.site), page, self.current))
    }

    fn page(&self) -> &Page {
        &self.site.pages[self.page.index()]
    }
}

impl fmt::Debug for PageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageView")
            .field("permalink", &self.page().permalink)
            .finish()
    }
}

impl Object for PageView {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        let ctx = self.site.context(self.current);
        let resolved = self.page().resolve_data(key, &ctx)?;

        Some(match resolved {
            Resolved::Value(value) => Value::from_serialize(&value),
            Resolved::Borrowed(value) => Value::from_serialize(value),
            Resolved::Page(id) => self.view_of(id),
            Resolved::Pages(ids) => Value::from(
                ids.into_iter()
                    .map(|id| self.view_of(id))
                    .collect::<Vec<_>>(),
            ),
        })
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.page().permalink)
    }
}
