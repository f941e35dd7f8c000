// src/static_files.rs
// Serving files from the static root; the fallback for every unproxied request

use actix_files::NamedFile;
use actix_web::{http::header, Error, HttpRequest, HttpResponse};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::Config;

/// Serve `static_dir + request path`, whatever the request method.
///
/// Paths that climb above the root and files that resolve outside it are
/// refused with 403; anything else that cannot be opened is a 404.
pub fn serve(req: &HttpRequest, config: &Config) -> Result<HttpResponse, Error> {
    let decoded = urlencoding::decode(req.path())
        .map_err(|_| actix_web::error::ErrorNotFound("Invalid path encoding"))?;

    let relative = match normalize_request_path(decoded.trim_start_matches('/')) {
        Some(p) => p,
        None => return Err(actix_web::error::ErrorForbidden("Invalid path")),
    };

    let file_path = config.static_dir.join(&relative);
    log::debug!("Trying to serve file: {:?}", file_path);

    if file_path.is_dir() {
        if !req.path().ends_with('/') {
            return Ok(redirect_to_directory(req));
        }
        let index_path = file_path.join("index.html");
        return open_file(&index_path, &config.static_dir, config.symlinks)
            .map(|file| file.into_response(req))
            .map_err(into_http_error);
    }

    open_file(&file_path, &config.static_dir, config.symlinks)
        .map(|file| file.into_response(req))
        .map_err(into_http_error)
}

fn open_file(candidate: &Path, root: &Path, follow_symlinks: bool) -> io::Result<NamedFile> {
    let file = NamedFile::open(candidate)?;

    if !follow_symlinks {
        let resolved = file.path().canonicalize()?;
        if !resolved.starts_with(root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Path escapes static directory",
            ));
        }
    }

    Ok(file)
}

fn into_http_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::PermissionDenied {
        actix_web::error::ErrorForbidden(err)
    } else {
        actix_web::error::ErrorNotFound(err)
    }
}

fn redirect_to_directory(req: &HttpRequest) -> HttpResponse {
    let mut location = format!("{}/", req.path());
    if let Some(query) = req.uri().query() {
        location.push('?');
        location.push_str(query);
    }

    HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Resolve `.` and `..` lexically. `None` when the path would leave the root.
fn normalize_request_path(path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in Path::new(path).components() {
        match component {
            Component::Prefix(_) => return None,
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }

    Some(normalized)
}
