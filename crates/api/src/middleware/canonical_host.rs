//! Redirects requests arriving on an alias host to the canonical host.
//!
//! Installed as the outermost layer so no credential is ever read on a host
//! its cookie was not scoped to.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::services::session::HostCanonicalizer;

pub async fn canonical_host(
    State(canonicalizer): State<Arc<HostCanonicalizer>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host());

    let target = host.and_then(|host| {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        canonicalizer.redirect_target(host, path_and_query)
    });

    match target.and_then(|t| HeaderValue::from_str(&t).ok()) {
        Some(location) => {
            debug!(
                host = host.unwrap_or_default(),
                canonical_host = canonicalizer.canonical_host(),
                "Redirecting to canonical host"
            );
            (
                StatusCode::PERMANENT_REDIRECT,
                [(header::LOCATION, location)],
            )
                .into_response()
        }
        None => next.run(req).await,
    }
}
