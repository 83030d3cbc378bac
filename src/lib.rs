//! Spendbot is a WhatsApp bot for tracking personal spending.
//!
//! This library implements the webhook service behind the bot: inbound
//! messages are routed to chat commands (summary, history, clear, help) or
//! handed to a language model that extracts a structured transaction from
//! free text. Transactions are persisted per phone number in SQLite and the
//! reply is delivered through the WhatsApp messaging API.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod command;
mod database_id;
mod db;
mod endpoints;
mod format;
mod parser;
mod routing;
mod transaction;
mod webhook;
mod whatsapp;

pub use app_state::AppState;
pub use command::handle_message;
pub use db::initialize as initialize_db;
pub use parser::{ParsedTransaction, TransactionParser};
pub use routing::build_router;
pub use transaction::{
    CategorySummary, DEFAULT_LIST_LIMIT, NewTransaction, Summary, Transaction, clear_transactions,
    create_transaction, get_recent_transactions, summarize_transactions,
};
pub use whatsapp::WhatsAppClient;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Storage faults are the only errors that escape a webhook handler.
        // The detail is for the server logs, not the caller.
        tracing::error!("An unexpected error occurred: {}", self);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal error"})),
        )
            .into_response()
    }
}
