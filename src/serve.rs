//! Development server.
//!
//! Serves the output directory with `tiny_http` while a watcher thread
//! rebuilds the site on change.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │ (watch + build)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!    Serve files             Detect changes
//!    or last build error     Rebuild, report
//!          └───────────┬───────────┘
//!                      ▼
//!              config.build.output
//! ```
//!
//! When the latest build failed every HTML request gets a 500 page showing
//! the error, until a rebuild succeeds.

use crate::{builder::SiteBuilder, log, pipeline::FileSet, watch::watch_for_changes_blocking};
use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Error text of the latest failed build, shared with the request loop.
type BuildStatus = Arc<RwLock<Option<String>>>;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Build once, then serve the output and rebuild on change.
///
/// Every build result, the initial one included, is passed to `on_build`.
/// Blocks until Ctrl+C.
pub fn serve_site(
    mut builder: SiteBuilder,
    port: u16,
    mut on_build: impl FnMut(&Result<FileSet>) + Send + 'static,
) -> Result<()> {
    let status: BuildStatus = Arc::default();

    let initial = builder.generate(true);
    record_status(&status, &initial);
    on_build(&initial);

    let config = builder.config();
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid [serve.interface] `{}`", config.serve.interface))?;
    let serve_root = config.build.output.clone();
    let watch = config.serve.watch;

    let (server, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if watch {
        let status = Arc::clone(&status);
        std::thread::spawn(move || {
            let report = |result: Result<FileSet>| {
                record_status(&status, &result);
                on_build(&result);
            };
            if let Err(err) = watch_for_changes_blocking(&mut builder, report) {
                log!("watch"; "{err:#}");
            }
        });
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &serve_root, &status) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

fn record_status(status: &BuildStatus, result: &Result<FileSet>) {
    *status.write() = result.as_ref().err().map(|err| format!("{err:#}"));
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Map a request URL onto a file below `serve_root`.
///
/// Query strings are dropped, `..` segments refused and directories resolve
/// to their `index.html`.
fn resolve_request(serve_root: &Path, url: &str) -> Option<PathBuf> {
    let url_path = urlencoding::decode(url).map(|s| s.into_owned()).ok()?;
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');

    if request_path.split('/').any(|segment| segment == "..") {
        return None;
    }

    let local_path = serve_root.join(request_path);
    if local_path.is_file() {
        return Some(local_path);
    }
    let index = local_path.join("index.html");
    index.is_file().then_some(index)
}

/// Handle a single HTTP request.
fn handle_request(request: Request, serve_root: &Path, status: &BuildStatus) -> Result<()> {
    let target = resolve_request(serve_root, request.url());
    let is_page = target
        .as_deref()
        .is_none_or(|path| guess_content_type(path).starts_with("text/html"));

    let build_error = status.read().clone();
    if is_page && let Some(error) = build_error {
        return serve_build_error(request, &error);
    }

    match target {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|_| anyhow!("invalid header value `{value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response =
        Response::from_data(content).with_header(content_type_header(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

/// Serve the error of the latest failed build.
fn serve_build_error(request: Request, error: &str) -> Result<()> {
    let escaped = error
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let body = format!(
        "<!doctype html><html><head><title>Build failed</title></head>\
         <body><h1>Build failed</h1><pre>{escaped}</pre></body></html>"
    );
    let response = Response::from_string(body)
        .with_status_code(StatusCode(500))
        .with_header(content_type_header("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}
