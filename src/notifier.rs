use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AnalyzerError;

/// Outbound chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AnalyzerError>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelegramResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub result: Option<T>,
}

pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: String,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(TelegramNotifier {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn post_message(&self, destination: &str, message: &str) -> Result<(), AnalyzerError> {
        let body = SendMessageRequest {
            chat_id: destination,
            text: message,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyzerError::DeliveryFailure(e.without_url().to_string()))?;

        let status = response.status();
        let parsed: Option<TelegramResponse<serde_json::Value>> = response.json().await.ok();
        match parsed {
            Some(r) if status.is_success() && r.ok => {
                debug!("Delivered message to {}", destination);
                Ok(())
            }
            Some(r) => Err(AnalyzerError::DeliveryFailure(format!(
                "Telegram returned {}: {}",
                status,
                r.description.unwrap_or_default()
            ))),
            None => Err(AnalyzerError::DeliveryFailure(format!(
                "Telegram returned {} with an unreadable body",
                status
            ))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AnalyzerError> {
        if self.token.is_empty() {
            return Err(AnalyzerError::DeliveryFailure(
                "TELEGRAM_BOT_TOKEN not set".into(),
            ));
        }

        match tokio::time::timeout(self.timeout, self.post_message(destination, message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Telegram delivery to {} timed out after {:?}",
                    destination, self.timeout
                );
                Err(AnalyzerError::DeliveryFailure(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

/// Deliver `message`, logging instead of failing. Returns whether it went out.
pub async fn notify_or_warn(notifier: &dyn Notifier, destination: &str, message: &str) -> bool {
    match notifier.send(destination, message).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Notification to {} not delivered: {}", destination, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), "TEST", 5).unwrap();
        notifier.send("42", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected_by_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botBAD/sendMessage"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), "BAD", 5).unwrap();
        let err = notifier.send("42", "hello").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::DeliveryFailure(_)));
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_send_timeout_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), "SLOW", 1).unwrap();
        let err = notifier.send("42", "hello").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::DeliveryFailure(_)));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let notifier = TelegramNotifier::new("http://unused", "", 1).unwrap();
        assert!(notifier.send("42", "hello").await.is_err());
        assert!(!notify_or_warn(&notifier, "42", "hello").await);
    }
}
