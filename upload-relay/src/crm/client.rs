//! reqwest-backed deal updater.

use super::{CrmError, DealUpdatePayload, DealUpdateReply, DealUpdater};
use crate::config::CrmConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// The concrete implementation of [`DealUpdater`].
#[derive(Debug, Clone)]
pub struct ReqwestDealUpdater {
    client: Client,
    update_method: String,
    request_timeout: Duration,
}

impl ReqwestDealUpdater {
    pub fn new(config: &CrmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            update_method: config.update_method.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Target URL for an update.
    ///
    /// This is plain concatenation: webhooks are issued with a trailing slash and no attempt is
    /// made to repair ones that lack it.
    pub fn update_url(&self, webhook: &str) -> String {
        format!("{webhook}{}", self.update_method)
    }
}

#[async_trait]
impl DealUpdater for ReqwestDealUpdater {
    #[instrument(skip_all, fields(deal_id = %payload.id))]
    async fn update_deal(&self, webhook: &str, payload: &DealUpdatePayload) -> Result<DealUpdateReply, CrmError> {
        if !webhook.ends_with('/') {
            warn!("Webhook URL does not end with '/', method name will be appended directly");
        }
        let url = self.update_url(webhook);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, "CRM response body: {}", String::from_utf8_lossy(&body));

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn updater() -> ReqwestDealUpdater {
        ReqwestDealUpdater::new(&CrmConfig::default()).unwrap()
    }

    fn payload() -> DealUpdatePayload {
        DealUpdatePayload::new(json!("42"), "UF_FILES", vec![(json!("a.pdf"), json!("base64..."))])
    }

    #[test]
    fn test_update_url_is_concatenated() {
        let updater = updater();
        assert_eq!(
            updater.update_url("https://x.bitrix24.com/rest/1/abcd/"),
            "https://x.bitrix24.com/rest/1/abcd/crm.deal.update"
        );
        assert_eq!(
            updater.update_url("https://x.bitrix24.com/rest/1/abcd"),
            "https://x.bitrix24.com/rest/1/abcdcrm.deal.update"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/1/abcd/crm.deal.update"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"id": "42", "fields": {"UF_FILES": [["a.pdf", "base64..."]]}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = updater()
            .update_deal(&format!("{}/rest/1/abcd/", server.uri()), &payload())
            .await
            .unwrap();

        assert!(reply.is_success());
    }

    #[test_log::test(tokio::test)]
    async fn test_error_status_with_json_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "ERROR_CORE",
                "error_description": "Not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = updater().update_deal(&format!("{}/", server.uri()), &payload()).await.unwrap();

        assert!(!reply.is_success());
        assert_eq!(reply.error, json!("ERROR_CORE"));
        assert_eq!(reply.failure_message(), "Not found");
    }

    #[test_log::test(tokio::test)]
    async fn test_rejection_with_numeric_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "result": false,
                "error": 400,
                "error_description": "x"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = updater().update_deal(&format!("{}/", server.uri()), &payload()).await.unwrap();

        assert!(!reply.is_success());
        assert_eq!(reply.error, json!(400));
        assert_eq!(reply.failure_message(), "x");
    }

    #[test_log::test(tokio::test)]
    async fn test_non_json_reply_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = updater().update_deal(&format!("{}/", server.uri()), &payload()).await.unwrap_err();

        assert!(matches!(err, CrmError::Decode(_)));
        assert!(err.to_string().starts_with("Invalid JSON in CRM response"));
    }

    #[test_log::test(tokio::test)]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let updater = ReqwestDealUpdater::new(&CrmConfig {
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        })
        .unwrap();

        let err = updater.update_deal(&format!("{}/", server.uri()), &payload()).await.unwrap_err();

        match err {
            CrmError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
