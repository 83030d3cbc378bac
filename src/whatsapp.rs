//! The outbound messaging client that delivers replies to WhatsApp users.

use serde::Serialize;

/// A client for the WhatsApp messaging API.
///
/// Sending is fire-and-forget: delivery failures are logged and swallowed so
/// that an unreachable messaging provider never fails the inbound webhook.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'a str,
    recipient_type: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'a str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

impl WhatsAppClient {
    /// The base URL of the hosted messaging API.
    pub const DEFAULT_BASE_URL: &'static str = "https://waba-sandbox.360dialog.io";

    /// Create a new client that authenticates with `api_key`.
    ///
    /// `base_url` is the scheme-and-host part of the messaging API, without a
    /// trailing slash.
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Send `text` to `phone_number`.
    ///
    /// Failures are logged only; callers cannot observe them.
    pub async fn send_message(&self, phone_number: &str, text: &str) {
        let payload = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: phone_number,
            message_type: "text",
            text: TextBody { body: text },
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("D360-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Failed to send WhatsApp message: {status} {body}");
            }
            Err(error) => {
                tracing::error!("Failed to send WhatsApp message: {error}");
            }
        }
    }
}
