// src/proxy.rs
// Forwarding requests under the intercept prefix to the upstream

use actix_web::{
    body::SizedStream,
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
    web, HttpRequest, HttpResponse,
};
use awc::Client;
use url::{Position, Url};

use crate::config::Config;

/// Connection-scoped headers that must not cross the proxy in either direction.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client used for upstream calls. One per worker, since `awc::Client` is
/// not `Send`.
///
/// No response timeout: a slow upstream holds its request open until the
/// transport gives up.
pub fn upstream_client() -> Client {
    Client::builder()
        .disable_timeout()
        .no_default_headers()
        .finish()
}

/// Remove one leading occurrence of `prefix`, if present.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// The path as it is sent upstream, before joining with the base URL.
pub fn forwarded_path<'a>(path: &'a str, config: &Config) -> &'a str {
    if config.strip_prefix {
        strip_prefix(path, &config.intercept_prefix)
    } else {
        path
    }
}

/// Upstream base URL joined with the request path and query.
///
/// The request path is copied as received: `..` and `%2e%2e` segments
/// reach the upstream unresolved.
pub fn upstream_url(base: &Url, path: &str, query: Option<&str>) -> String {
    let mut target = base[..Position::BeforePath].to_string();
    target.push_str(&join_paths(base.path(), path));

    let base_query = base.query().filter(|q| !q.is_empty());
    let query = query.filter(|q| !q.is_empty());
    let joined = match (base_query, query) {
        (Some(b), Some(q)) => Some(format!("{}&{}", b, q)),
        (Some(b), None) => Some(b.to_string()),
        (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    };
    if let Some(joined) = joined {
        target.push('?');
        target.push_str(&joined);
    }
    target
}

/// Join two paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::try_from(token.trim()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[derive(Debug, PartialEq, Eq)]
enum RequestBody {
    Empty,
    Sized(u64),
    Chunked,
}

fn request_body(headers: &HeaderMap) -> RequestBody {
    if let Some(len) = content_length(headers) {
        return RequestBody::Sized(len);
    }
    if headers.contains_key(header::TRANSFER_ENCODING) {
        RequestBody::Chunked
    } else {
        RequestBody::Empty
    }
}

fn forwarded_for(req: &HttpRequest) -> Option<String> {
    let client_ip = req.peer_addr()?.ip().to_string();
    let prior = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    Some(match prior {
        Some(prior) => format!("{}, {}", prior, client_ip),
        None => client_ip,
    })
}

/// Send the request to the upstream and stream its answer back.
///
/// Transport failures become `502 Bad Gateway`. Nothing is retried.
pub async fn forward(
    req: &HttpRequest,
    payload: web::Payload,
    config: &Config,
    client: &Client,
) -> HttpResponse {
    let target = upstream_url(
        &config.upstream,
        forwarded_path(req.path(), config),
        req.uri().query(),
    );
    log::debug!("Proxying {} {} -> {}", req.method(), req.path(), target);

    let body = request_body(req.headers());

    let mut upstream_req = client.request_from(target.as_str(), req.head()).no_decompress();
    remove_hop_by_hop(upstream_req.headers_mut());
    upstream_req.headers_mut().remove(header::CONTENT_LENGTH);
    if let Some(value) = forwarded_for(req).and_then(|v| HeaderValue::try_from(v).ok()) {
        upstream_req
            .headers_mut()
            .insert(HeaderName::from_static("x-forwarded-for"), value);
    }

    let sent = match body {
        RequestBody::Sized(len) => upstream_req.send_body(SizedStream::new(len, payload)).await,
        RequestBody::Chunked => upstream_req.send_stream(payload).await,
        RequestBody::Empty => upstream_req.send().await,
    };

    let upstream_res = match sent {
        Ok(res) => res,
        Err(err) => {
            log::warn!("proxy error: {} {}: {}", req.method(), target, err);
            return HttpResponse::BadGateway().finish();
        }
    };

    let mut headers = upstream_res.headers().clone();
    remove_hop_by_hop(&mut headers);
    let length = content_length(&headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut relayed = HttpResponse::build(upstream_res.status());
    for (name, value) in headers.iter() {
        relayed.append_header((name.clone(), value.clone()));
    }

    match length {
        Some(len) => relayed.body(SizedStream::new(len, upstream_res)),
        None => relayed.streaming(upstream_res),
    }
}
