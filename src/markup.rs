//! Markdown → HTML transform.
//!
//! Used for page body files (`intro.md` becomes the `intro` variable) and for
//! literal-block metadata values (`body: |`). The transform is a plain value
//! handed to whoever needs it; there is no process-wide converter.

use pulldown_cmark::{Options, Parser, html as md_html};

#[derive(Debug, Clone, Copy)]
pub struct Markdown {
    options: Options,
}

impl Markdown {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }

    /// Render Markdown to an HTML fragment. Raw HTML passes through untouched.
    pub fn to_html(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options);
        let mut html = String::with_capacity(text.len() * 3 / 2);
        md_html::push_html(&mut html, parser);
        html
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a leading `---` YAML front-matter block off a markup document.
///
/// Returns `(Some(yaml), body)` when the text opens with a `---` line and a
/// closing `---` (or `...`) line follows; otherwise `(None, text)`.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let rest = match text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, text),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }
    (None, text)
}
