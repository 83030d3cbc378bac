//! Defines the endpoint that receives inbound WhatsApp webhook deliveries.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error, command::handle_message, parser::TransactionParser, whatsapp::WhatsAppClient,
};

/// The state needed to process a webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The client that extracts transactions from free text.
    pub parser: TransactionParser,
    /// The client that delivers replies to WhatsApp users.
    pub notifier: WhatsAppClient,
}

impl FromRef<AppState> for WebhookState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            parser: state.parser.clone(),
            notifier: state.notifier.clone(),
        }
    }
}

/// The webhook payload: a batch of inbound messages.
///
/// The messaging provider sends more fields than these; everything not listed
/// here is ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    /// The delivered messages. Only the first one is processed.
    pub messages: Option<Vec<WebhookMessage>>,
}

/// One inbound message as it appears on the wire.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    /// The sender's phone number.
    pub from: String,
    /// The text content; absent for non-text messages.
    pub text: Option<MessageText>,
}

/// The text content of an inbound message.
#[derive(Debug, Deserialize)]
pub struct MessageText {
    /// The message body.
    pub body: String,
}

/// A validated inbound message, ready for the command router.
#[derive(Debug, PartialEq)]
pub struct IncomingMessage {
    /// The sender's phone number, guaranteed non-empty.
    pub from: String,
    /// The trimmed message text, when the message had any.
    pub text: Option<String>,
}

/// Why a wire message failed validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidMessage {
    /// The sender field was empty.
    #[error("message sender is empty")]
    EmptySender,
}

/// Check the shape of a wire message and normalize it.
pub fn validate_message(message: WebhookMessage) -> Result<IncomingMessage, InvalidMessage> {
    if message.from.is_empty() {
        return Err(InvalidMessage::EmptySender);
    }

    Ok(IncomingMessage {
        from: message.from,
        text: message.text.map(|text| text.body.trim().to_owned()),
    })
}

/// A route handler for inbound webhook deliveries.
///
/// The body is parsed from raw bytes rather than an extractor so that
/// malformed payloads produce this API's own error body. The reply is also
/// pushed to the sender through the notifier; delivery failures do not affect
/// the response.
pub async fn post_webhook(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Response, Error> {
    tracing::debug!("received webhook: {}", String::from_utf8_lossy(&body));

    let body: WebhookBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!("invalid webhook body: {error}");
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid request body"})),
            )
                .into_response());
        }
    };

    let Some(message) = body.messages.into_iter().flatten().next() else {
        return Ok(Json(json!({"status": "ok"})).into_response());
    };

    let message = match validate_message(message) {
        Ok(message) => message,
        Err(error) => {
            tracing::error!("invalid message: {error}");
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid message format"})),
            )
                .into_response());
        }
    };

    let reply = handle_message(
        &message.from,
        message.text.as_deref(),
        &state.parser,
        &state.db_connection,
    )
    .await?;

    if !reply.is_empty() {
        state.notifier.send_message(&message.from, &reply).await;
    }

    Ok(Json(json!({"status": "processed", "response": reply})).into_response())
}
