//! Development server with rebuild-on-change.
//!
//! Serves the output directory over HTTP with `tiny_http` while a watcher
//! thread rebuilds the site whenever its sources change.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │ read lock             │ write lock
//!          ▼                       ▼
//!    Serve files             Full rebuild (tack)
//!          └──────────┬────────────┘
//!                     ▼
//!                  output/
//! ```
//!
//! A rebuild holds the [`DevSite`] lock for writing from the moment it starts
//! wiping the output directory until the last asset is copied, and every
//! request holds it for reading, so a response never mixes two builds. If the
//! last rebuild failed, requests get a 500 page with the error until a rebuild
//! succeeds.

use crate::checkpoint::Checkpoint;
use crate::config;
use crate::graph::{PageGraph, TackError};
use crate::output;
use crate::watch::watch_for_changes_blocking;
use maud::{DOCTYPE, Markup, html};
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    (
        "Cache-Control",
        "no-cache, no-store, no-transform, must-revalidate, private, max-age=0",
    ),
    ("Expires", "Thu, 01 Jan 1970 00:00:00 GMT"),
    ("Pragma", "no-cache"),
];

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid interface address {0:?}")]
    Interface(String),
    #[error("failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("cannot install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tack(#[from] TackError),
}

/// Command-line overrides for the `[serve]` config section.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub interface: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default)]
struct BuildState {
    output_dir: PathBuf,
    checkpoint: Option<Checkpoint>,
    last_error: Option<String>,
}

/// A site being served: its location plus the state of the last build.
#[derive(Debug)]
pub struct DevSite {
    base_dir: PathBuf,
    state: RwLock<BuildState>,
}

impl DevSite {
    pub fn new(base_dir: &Path, output_dir: PathBuf) -> Result<Self, ServeError> {
        let base_dir = fs::canonicalize(base_dir)?;
        let output_dir = if output_dir.is_absolute() {
            output_dir
        } else {
            base_dir.join(output_dir)
        };
        Ok(Self {
            base_dir,
            state: RwLock::new(BuildState {
                output_dir,
                ..BuildState::default()
            }),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn output_dir(&self) -> PathBuf {
        self.read_state(|s| s.output_dir.clone())
    }

    fn read_state<T>(&self, f: impl FnOnce(&BuildState) -> T) -> T {
        match self.state.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    /// Rebuild the whole site if anything under the base directory changed
    /// since the last build, or unconditionally with `force`.
    ///
    /// Returns whether a build ran. Build errors are remembered and served as
    /// a 500 page; they are only returned when the directory is not a site.
    pub fn rebuild(&self, force: bool) -> Result<bool, TackError> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let (changed, now) =
            Checkpoint::has_changes(state.checkpoint.as_ref(), &self.base_dir, &state.output_dir);
        if !changed && !force {
            return Ok(false);
        }
        state.checkpoint = Some(now);

        let started = Instant::now();
        match self.build(&mut state) {
            Ok(()) => {
                state.last_error = None;
                tracing::info!("rebuilt in {:.0?}", started.elapsed());
            }
            Err(err @ TackError::NotASite { .. }) => return Err(err),
            Err(err) => {
                tracing::error!("build failed: {err}");
                state.last_error = Some(err.to_string());
            }
        }
        Ok(true)
    }

    fn build(&self, state: &mut BuildState) -> Result<(), TackError> {
        let config = config::load_config(&self.base_dir)?;
        state.output_dir = self.base_dir.join(&config.dirs.output);

        let graph = PageGraph::open(&self.base_dir)?;
        let report = graph.tack()?;
        for line in output::format_tack_report(&report, &state.output_dir) {
            tracing::debug!("{line}");
        }
        if !report.is_clean() {
            for failure in &report.failures {
                tracing::warn!("{}: {}", failure.permalink, failure.error);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Build, then serve the site at `base_dir` until Ctrl+C.
pub fn serve_site(base_dir: &Path, options: &ServeOptions) -> Result<(), ServeError> {
    let config = config::load_config(base_dir).map_err(TackError::from)?;
    let interface_text = options
        .interface
        .clone()
        .unwrap_or_else(|| config.serve.interface.clone());
    let interface: IpAddr = interface_text
        .parse()
        .map_err(|_| ServeError::Interface(interface_text.clone()))?;
    let port = options.port.unwrap_or(config.serve.port);
    let debounce = Duration::from_millis(config.serve.debounce_ms);

    let site = Arc::new(DevSite::new(
        base_dir,
        PathBuf::from(&config.dirs.output),
    )?);
    site.rebuild(true)?;

    let (server, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        tracing::info!("shutting down...");
        server_for_signal.unblock();
    })?;

    tracing::info!("serving {} on http://{}", site.base_dir().display(), addr);

    let watched = Arc::clone(&site);
    std::thread::spawn(move || {
        if let Err(err) = watch_for_changes_blocking(&watched, debounce) {
            tracing::error!("watcher stopped: {err}");
        }
    });

    for request in server.incoming_requests() {
        if let Err(err) = handle_request(request, &site) {
            tracing::warn!("request error: {err}");
        }
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    let mut last_port = base_port;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        last_port = port;

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    tracing::info!("port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(ServeError::Bind {
        attempts: max_retries,
        first: base_port,
        last: last_port,
        message: last_error,
    })
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
///
/// Request resolution order:
/// 1. Last build failed → 500 with the error
/// 2. Exact file match → serve file
/// 3. Directory with index.html → serve index.html
/// 4. Nothing found → 404
fn handle_request(request: Request, site: &DevSite) -> std::io::Result<()> {
    let state = match site.state.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    tracing::debug!("{} {}", request.method(), request.url());

    if let Some(message) = &state.last_error {
        return respond_html(request, 500, server_error_page(message));
    }

    match resolve_request_path(&state.output_dir, request.url()) {
        Some(path) => match fs::read(&path) {
            Ok(content) => respond(request, 200, content, guess_content_type(&path)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let url = request.url().to_string();
                respond_html(request, 404, not_found_page(&url))
            }
            Err(err) => {
                tracing::warn!("cannot read {}: {err}", path.display());
                respond_html(request, 500, server_error_page(&err.to_string()))
            }
        },
        None => {
            let url = request.url().to_string();
            respond_html(request, 404, not_found_page(&url))
        }
    }
}

/// Map a request URL onto a file below `root`.
///
/// Drops the query string, decodes percent-escapes, refuses `..`, and falls
/// back to `index.html` for directories.
fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path_without_query = url.split('?').next().unwrap_or(url);
    let decoded = urlencoding::decode(path_without_query).ok()?;
    let request_path = Path::new(decoded.trim_matches('/'));

    if !request_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local = root.join(request_path);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(
    request: Request,
    status: u16,
    body: Vec<u8>,
    content_type: &str,
) -> std::io::Result<()> {
    let mut response = Response::from_data(body).with_status_code(status);
    let headers = NO_CACHE_HEADERS
        .iter()
        .copied()
        .chain([("Content-Type", content_type)])
        .filter_map(|(name, value)| header(name, value));
    for h in headers {
        response.add_header(h);
    }
    request.respond(response)
}

fn respond_html(request: Request, status: u16, page: Markup) -> std::io::Result<()> {
    respond(
        request,
        status,
        page.into_string().into_bytes(),
        "text/html; charset=utf-8",
    )
}

fn not_found_page(url: &str) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "404 Not Found" }
            }
            body {
                h1 { "404 - File not found :(" }
                p { code { (url) } }
            }
        }
    }
}

fn server_error_page(message: &str) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Build failed" }
            }
            body {
                h1 { "Internal Server Error" }
                pre { (message) }
            }
        }
    }
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
