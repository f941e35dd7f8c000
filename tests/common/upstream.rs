//! In-process mock upstream
//!
//! Echoes what it received so tests can see exactly what the proxy forwarded.
//! Behavior is steered through the query string:
//!
//! - `delay_ms=N` waits before answering
//! - `status=N` answers with that status code
//! - `chunks=N` streams the answer in N chunks without a content length
//! - `headers=1` answers with the received request headers as JSON

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use actix_web::{
    dev::ServerHandle, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer,
};
use futures_util::stream;

pub struct MockUpstream {
    pub addr: SocketAddr,
    handle: ServerHandle,
}

impl MockUpstream {
    /// Bind a free local port and start answering. Needs an actix runtime,
    /// so callers use `#[actix_web::test]`.
    pub fn start() -> Self {
        let server = HttpServer::new(|| App::new().default_service(web::to(echo)))
            .workers(2)
            .disable_signals()
            .bind(("127.0.0.1", 0))
            .expect("Failed to bind mock upstream");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        MockUpstream { addr, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

fn param(req: &HttpRequest, key: &str) -> Option<String> {
    url::form_urlencoded::parse(req.query_string().as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn header(req: &HttpRequest, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn echo(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    if let Some(ms) = param(&req, "delay_ms").and_then(|v| v.parse::<u64>().ok()) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let status = param(&req, "status")
        .and_then(|v| v.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let mut res = HttpResponse::build(status);
    res.insert_header(("x-upstream", "mock"))
        .insert_header(("x-echo-method", req.method().as_str()))
        .insert_header(("x-echo-path", req.path()))
        .insert_header(("x-echo-query", req.query_string()))
        .insert_header(("x-echo-host", header(&req, "host")))
        .insert_header(("x-echo-forwarded-for", header(&req, "x-forwarded-for")))
        .insert_header(("x-echo-content-type", header(&req, "content-type")));

    if param(&req, "headers").is_some() {
        let seen: BTreeMap<String, String> = req
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        return res.json(seen);
    }

    if let Some(n) = param(&req, "chunks").and_then(|v| v.parse::<usize>().ok()) {
        let chunks = (0..n).map(|i| Ok::<_, std::io::Error>(web::Bytes::from(format!("chunk-{};", i))));
        return res.streaming(stream::iter(chunks));
    }

    res.body(body)
}
