//! # upload-relay: attach browser uploads to CRM deals
//!
//! `upload-relay` sits between a browser form and a CRM's REST webhook. The browser cannot call
//! the CRM directly (CORS, and the payload needs reshaping), so it posts its files here:
//!
//! ```json
//! {
//!   "files": [{ "name": "a.pdf", "data": "data:application/pdf;base64,...", "size": 10 }],
//!   "dealId": "42",
//!   "webhook": "https://x.bitrix24.com/rest/1/abcd/",
//!   "fileField": "UF_FILES"
//! }
//! ```
//!
//! and the relay turns that into a single `crm.deal.update` call, answering with
//! `{"success": true, "uploaded": 1, "files": [{"name": "a.pdf", "size": 10}]}` or a JSON error.
//!
//! ## Request Flow
//!
//! Every path is served by the same handler ([`api::handlers::upload::upload_files`]):
//!
//! 1. The body limit (`limits.max_body_size`, 50 MiB by default) is enforced before the handler.
//! 2. `OPTIONS` gets an empty 200, any method other than `POST` a 405.
//! 3. `files`, `dealId`, then `webhook`/`fileField` are checked, each failing with a 400.
//! 4. Files become `[name, data]` pairs under the caller-named field, sent through a
//!    [`crm::DealUpdater`]. There is exactly one attempt.
//! 5. The CRM's `result` decides between 200 and a 500 carrying the CRM's error description.
//!
//! CORS headers ([`cors`]) and request tracing wrap every response.
//!
//! Nothing is kept between requests. The only shared state is configuration and the HTTP client.

pub mod api;
pub mod config;
pub mod cors;
pub mod crm;
pub mod errors;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use axum::{Router, extract::DefaultBodyLimit};
pub use config::Config;
use crm::{DealUpdater, ReqwestDealUpdater};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub crm: Arc<dyn DealUpdater>,
}

/// Build the application router.
///
/// The upload handler is the fallback, so it answers on every path. On top of it sit the body
/// limit, the CORS headers, and request tracing.
///
/// # Errors
///
/// Returns an error if the body limit or a CORS header value is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.limits.max_body_size)?;
    let cors = state.config.cors.clone();

    let router = Router::new()
        .fallback(api::handlers::upload::upload_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    let router = cors::with_cors_headers(router, &cors)?;

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The relay server.
///
/// ```ignore
/// let app = Application::new(config)?;
/// app.serve(shutdown_signal()).await?;
/// ```
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create the HTTP client and router
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting upload relay with configuration: {:#?}", config);

        let crm = ReqwestDealUpdater::new(&config.crm)?;
        let state = AppState {
            config: config.clone(),
            crm: Arc::new(crm),
        };
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Upload relay listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Application;
    use crate::test_utils::create_test_config;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Full stack over a real socket: bind, upload, shut down.
    #[test_log::test(tokio::test)]
    async fn test_application_serves_and_shuts_down() {
        let crm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/1/abcd/crm.deal.update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&crm)
            .await;

        // Reserve a port, then hand it to the application.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = create_test_config();
        config.port = port;

        let app = Application::new(config).expect("Failed to create application");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(app.serve(async move {
            let _ = shutdown_rx.await;
        }));

        let client = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{port}/api/upload-to-bitrix");
        let mut response = None;
        for _ in 0..50 {
            match client
                .post(&url)
                .json(&json!({
                    "files": [{"name": "a.pdf", "data": "base64...", "size": 10}],
                    "dealId": "42",
                    "webhook": format!("{}/rest/1/abcd/", crm.uri()),
                    "fileField": "UF_FILES"
                }))
                .send()
                .await
            {
                Ok(r) => {
                    response = Some(r);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
        let response = response.expect("server never came up");

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").map(|v| v.to_str().unwrap()),
            Some("*")
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"success": true, "uploaded": 1, "files": [{"name": "a.pdf", "size": 10}]}));

        shutdown_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
