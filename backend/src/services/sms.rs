//! Delivery of one-time codes by text message.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::{sync::Arc, time::Duration};

use crate::{config::Config, models::phone::PhoneNumber};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Sends a code to a phone. Implementations must not retry; the caller
/// reports the failure and the user may ask again after the cooldown.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, phone: &PhoneNumber, code: &str) -> anyhow::Result<()>;
}

/// Posts `{to, from, body}` JSON to a generic SMS gateway.
pub struct HttpSmsSender {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    sender_id: String,
    code_ttl_minutes: u64,
}

impl HttpSmsSender {
    pub fn new(config: &Config, endpoint: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(config.sms_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.sms_api_key.clone(),
            sender_id: config.sms_sender_id.clone(),
            code_ttl_minutes: (config.otp_expiration_seconds / 60).max(1),
        })
    }

    fn message_body(&self, code: &str) -> String {
        format!(
            "Your verification code is {}. It expires in {} minutes.",
            code, self.code_ttl_minutes
        )
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send_code(&self, phone: &PhoneNumber, code: &str) -> anyhow::Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "to": phone.as_str(),
            "from": self.sender_id,
            "body": self.message_body(code),
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("SMS gateway responded with {}", status);
        }
        Ok(())
    }
}

/// Development sender: logs instead of texting.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, phone: &PhoneNumber, _code: &str) -> anyhow::Result<()> {
        tracing::info!(phone = %phone.masked(), "SMS gateway not configured; code not sent");
        Ok(())
    }
}

/// HTTP sender when a gateway URL is configured, log-only otherwise.
pub fn sender_from_config(config: &Config) -> anyhow::Result<Arc<dyn SmsSender>> {
    match &config.sms_api_url {
        Some(url) => Ok(Arc::new(HttpSmsSender::new(config, url.clone())?)),
        None => {
            if config.production_mode {
                anyhow::bail!("SMS_API_URL must be set in production mode");
            }
            tracing::warn!("SMS_API_URL is not set; verification codes will only be logged");
            Ok(Arc::new(LogSmsSender))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_mentions_code_and_lifetime() {
        let sender =
            HttpSmsSender::new(&Config::test_default(), "http://localhost:9/sms".into()).unwrap();
        let body = sender.message_body("012345");
        assert!(body.contains("012345"));
        assert!(body.contains("5 minutes"));
    }

    #[test]
    fn log_sender_is_used_without_gateway_outside_production() {
        let config = Config::test_default();
        assert!(sender_from_config(&config).is_ok());

        let mut production = Config::test_default();
        production.production_mode = true;
        assert!(sender_from_config(&production).is_err());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_an_error() {
        let mut config = Config::test_default();
        config.sms_timeout_seconds = 1;
        // Port 9 (discard) is closed on test hosts; the connect fails fast.
        let sender = HttpSmsSender::new(&config, "http://127.0.0.1:9/sms".into()).unwrap();
        let phone = PhoneNumber::parse("09012345678").unwrap();
        assert!(sender.send_code(&phone, "123456").await.is_err());
    }
}
