//! Implements a struct that holds the state of the webhook server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize, parser::TransactionParser, whatsapp::WhatsAppClient};

/// The state of the webhook server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The client that extracts transactions from free text.
    pub parser: TransactionParser,

    /// The client that delivers replies to WhatsApp users.
    pub notifier: WhatsAppClient,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        parser: TransactionParser,
        notifier: WhatsAppClient,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            parser,
            notifier,
        })
    }
}
