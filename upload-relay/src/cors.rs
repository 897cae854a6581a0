//! Fixed CORS response headers.
//!
//! Browser clients call the relay cross-origin with credentials, so the headers are stamped onto
//! every response, errors and preflights included, instead of going through `CorsLayer` (which
//! refuses to pair a wildcard origin with credentials).

use crate::config::CorsConfig;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, header},
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Header name/value pairs described by `config`, in the order they are applied.
pub fn cors_headers(config: &CorsConfig) -> anyhow::Result<Vec<(HeaderName, HeaderValue)>> {
    let mut headers = Vec::with_capacity(4);

    if config.allow_credentials {
        headers.push((header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true")));
    }
    headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_str(&config.allow_origin)?));
    headers.push((
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_str(&config.allow_methods.join(","))?,
    ));
    headers.push((
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_str(&config.allow_headers.join(", "))?,
    ));

    Ok(headers)
}

/// Wrap `router` so every response carries the configured CORS headers.
pub fn with_cors_headers<S>(mut router: Router<S>, config: &CorsConfig) -> anyhow::Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    for (name, value) in cors_headers(config)? {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }
    Ok(router)
}
