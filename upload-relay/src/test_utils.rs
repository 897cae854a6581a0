//! Helpers for driving the router in-process.

use crate::config::{Config, CrmConfig};
use crate::crm::{DealUpdater, ReqwestDealUpdater};
use crate::{AppState, build_router};
use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        crm: CrmConfig {
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Test server backed by the real reqwest client; point uploads at a wiremock server.
pub fn create_test_app() -> TestServer {
    let config = create_test_config();
    let updater = ReqwestDealUpdater::new(&config.crm).expect("Failed to create CRM client");
    create_test_app_with_updater(config, Arc::new(updater))
}

pub fn create_test_app_with_updater(config: Config, crm: Arc<dyn DealUpdater>) -> TestServer {
    let state = AppState { config, crm };
    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}
