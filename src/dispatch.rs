// src/dispatch.rs
// Two-tier request dispatch: the proxy rule first, static files for everything else

use actix_web::{http::Method, web, Error, HttpRequest, HttpResponse};

use crate::config::Config;
use crate::proxy;
use crate::static_files;

/// Methods the proxy rule is registered for. Other methods under the
/// intercept prefix fall through to the static handler.
const PROXY_METHODS: [Method; 2] = [Method::GET, Method::POST];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Proxy,
    Static,
}

/// Plain string prefix test; `/apix` matches `/api`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix)
}

pub fn route(method: &Method, path: &str, prefix: &str) -> Route {
    if PROXY_METHODS.contains(method) && matches_prefix(path, prefix) {
        Route::Proxy
    } else {
        Route::Static
    }
}

async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    config: web::Data<Config>,
    client: web::Data<awc::Client>,
) -> Result<HttpResponse, Error> {
    match route(req.method(), req.path(), &config.intercept_prefix) {
        Route::Proxy => Ok(proxy::forward(&req, payload, &config, &client).await),
        Route::Static => static_files::serve(&req, &config),
    }
}

/// Every request lands in `dispatch`; nothing relies on router fallbacks.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::to(dispatch));
}
