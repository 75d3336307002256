// src/notifier/webhook.rs
//! Generic JSON webhook transport with optional HMAC signature

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

use super::{Notifier, NotifyOutcome};
use crate::config::WebhookConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Cname-Sentry-Signature";

pub struct WebhookNotifier {
    client: Client,
    cfg: WebhookConfig,
    default_timeout: Duration,
}

#[derive(Serialize)]
pub struct WebhookPayload<'a> {
    pub text: &'a str,
    pub sent_at: String,
}

impl WebhookNotifier {
    pub fn new(cfg: WebhookConfig, default_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            cfg,
            default_timeout,
        }
    }

    pub fn sign(secret: &str, body: &[u8]) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("HMAC init error: {:?}", e))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn post(&self, message: &str) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            text: message,
            sent_at: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_vec(&payload)?;

        let timeout = self
            .cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut req = self
            .client
            .post(&self.cfg.url)
            .timeout(timeout)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.cfg.secret {
            req = req.header(SIGNATURE_HEADER, Self::sign(secret, &body)?);
        }

        // Webhook URLs often embed a token; keep them out of error text
        let resp = req.body(body).send().await.map_err(|e| e.without_url())?;
        resp.error_for_status().map_err(|e| e.without_url())?; // non-2xx -> error

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, message: &str) -> NotifyOutcome {
        match self.post(message).await {
            Ok(()) => NotifyOutcome::Delivered,
            Err(e) => NotifyOutcome::Failed(format!("webhook delivery failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn config(url: String, secret: Option<&str>, timeout_secs: Option<u64>) -> WebhookConfig {
        WebhookConfig {
            url,
            secret: secret.map(|s| s.to_string()),
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn test_webhook_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            config(mock_server.uri(), None, Some(5)),
            Duration::from_secs(15),
        );

        assert_eq!(notifier.notify("takeover risk").await, NotifyOutcome::Delivered);

        let requests: Vec<Request> = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["text"], "takeover risk");
    }

    #[tokio::test]
    async fn test_webhook_signature_matches_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            config(mock_server.uri(), Some("test_secret"), Some(5)),
            Duration::from_secs(15),
        );
        assert!(notifier.notify("hello").await.is_delivered());

        let requests = mock_server.received_requests().await.unwrap();
        let sent = requests[0]
            .headers
            .get(SIGNATURE_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let expected = WebhookNotifier::sign("test_secret", &requests[0].body).unwrap();
        assert_eq!(sent, expected);
        assert_eq!(sent.len(), 64);
    }

    #[tokio::test]
    async fn test_webhook_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            config(mock_server.uri(), None, Some(5)),
            Duration::from_secs(15),
        );
        assert!(!notifier.notify("hello").await.is_delivered());
    }

    #[tokio::test]
    async fn test_webhook_timeout_uses_default_when_unset() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            config(mock_server.uri(), None, None),
            Duration::from_secs(1),
        );
        assert!(!notifier.notify("hello").await.is_delivered());
    }

    #[tokio::test]
    async fn test_webhook_failure_hides_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks/T0KEN-abc123"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let url = format!("{}/hooks/T0KEN-abc123", mock_server.uri());
        let notifier = WebhookNotifier::new(config(url, None, Some(5)), Duration::from_secs(15));

        match notifier.notify("hello").await {
            NotifyOutcome::Failed(reason) => {
                assert!(reason.contains("403"));
                assert!(!reason.contains("T0KEN-abc123"));
                assert!(!reason.contains(&mock_server.uri()));
            }
            NotifyOutcome::Delivered => panic!("expected failure"),
        }
    }
}
