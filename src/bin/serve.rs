//! Development server for the web build
//!
//! Serves the current directory so the game page, its loader and the
//! bridge module can be tried locally. `/` is `index.html`.

use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Response, Server};

const DEFAULT_PORT: u16 = 3000;

fn main() {
    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = format!("0.0.0.0:{}", port);
    let server = match Server::http(&addr) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("cannot listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    println!("Server is running on http://localhost:{}", port);

    for request in server.incoming_requests() {
        let response = match resolve(request.url()) {
            Some(path) => serve_file(&path),
            None => not_found(),
        };
        let _ = request.respond(response);
    }
}

/// Map a request URL to a file under the current directory
fn resolve(url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Some(PathBuf::from("index.html"));
    }

    let path = PathBuf::from(path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes { None } else { Some(path) }
}

fn serve_file(path: &Path) -> Response<Cursor<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => with_content_type(Response::from_data(contents), mime_type(path)),
        Err(_) => not_found(),
    }
}

fn not_found() -> Response<Cursor<Vec<u8>>> {
    with_content_type(
        Response::from_string("404 Not Found").with_status_code(404),
        "text/plain",
    )
}

fn with_content_type(response: Response<Cursor<Vec<u8>>>, mime: &str) -> Response<Cursor<Vec<u8>>> {
    match Header::from_bytes("Content-Type", mime) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
