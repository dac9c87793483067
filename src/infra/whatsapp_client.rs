use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::app::ports::DeliveryPort;
use crate::config::WhatsAppConfig;
use crate::error::{DeliveryError, Result};

/// WhatsApp Business Cloud API text sender
pub struct WhatsAppClient {
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    fn phone_number_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version,
            self.config.phone_number_id
        )
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.phone_number_url())
    }

    fn token(&self) -> std::result::Result<&str, DeliveryError> {
        self.config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(DeliveryError::NotConfigured)
    }
}

#[async_trait]
impl DeliveryPort for WhatsAppClient {
    fn is_configured(&self) -> bool {
        self.config.has_token()
    }

    #[instrument(skip(self, body))]
    async fn send_text(&self, phone: &str, body: &str) -> std::result::Result<String, DeliveryError> {
        let token = self.token()?;
        let resp = self
            .http
            .post(self.messages_url())
            .bearer_auth(token)
            .json(&text_payload(phone, body))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(match serde_json::from_str::<Value>(&text) {
                Ok(payload) => DeliveryError::Provider(payload),
                Err(_) => DeliveryError::Transport(format!("HTTP {status}: {text}")),
            });
        }

        let payload: Value = serde_json::from_str(&text).map_err(|e| DeliveryError::Transport(e.to_string()))?;
        let id = message_id(&payload);
        debug!("Message accepted with id {:?}", id);
        Ok(id)
    }

    async fn verify_credentials(&self) -> bool {
        let Ok(token) = self.token() else {
            return false;
        };
        match self.http.get(self.phone_number_url()).bearer_auth(token).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }
}

fn text_payload(phone: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": phone,
        "type": "text",
        "text": { "preview_url": true, "body": body },
    })
}

/// Provider id of the first accepted message, empty when absent
fn message_id(payload: &Value) -> String {
    payload
        .pointer("/messages/0/id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
