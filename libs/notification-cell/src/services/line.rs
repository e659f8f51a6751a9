use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// LINE Messaging API push client. Channel credentials are per clinic
/// (multi-tenant), so every call takes the channel access token of the
/// clinic on whose behalf the message goes out.
pub struct LineClient {
    client: Client,
    base_url: String,
}

impl LineClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.line_api_base_url.clone(),
        }
    }

    pub async fn send_text_message(
        &self,
        channel_access_token: &str,
        to: &str,
        text: &str,
    ) -> Result<(), NotificationError> {
        let messages = json!([{
            "type": "text",
            "text": text,
        }]);
        self.push(channel_access_token, to, messages).await
    }

    /// Buttons template with a single URI action, used for patient form links.
    pub async fn send_button_template(
        &self,
        channel_access_token: &str,
        to: &str,
        alt_text: &str,
        text: &str,
        button_label: &str,
        button_uri: &str,
    ) -> Result<(), NotificationError> {
        let messages = json!([{
            "type": "template",
            "altText": alt_text,
            "template": {
                "type": "buttons",
                "text": text,
                "actions": [{
                    "type": "uri",
                    "label": button_label,
                    "uri": button_uri,
                }],
            },
        }]);
        self.push(channel_access_token, to, messages).await
    }

    async fn push(
        &self,
        channel_access_token: &str,
        to: &str,
        messages: Value,
    ) -> Result<(), NotificationError> {
        if channel_access_token.is_empty() {
            return Err(NotificationError::NotConfigured(
                "empty channel access token".to_string(),
            ));
        }

        let url = format!("{}/v2/bot/message/push", self.base_url);
        debug!("Pushing LINE message to {}", to);

        let response = self
            .client
            .post(&url)
            .bearer_auth(channel_access_token)
            .json(&json!({
                "to": to,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| NotificationError::LineApi(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotificationError::LineApi(format!(
                "push failed ({}): {}",
                status, error_text
            )));
        }

        info!("LINE message delivered to {}", to);
        Ok(())
    }
}
