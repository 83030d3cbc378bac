//! Routes incoming chat messages to command handlers.
//!
//! The command set is closed: a message either matches one of the literal
//! commands below or it is treated as a transaction description. Dispatch is
//! a plain `match`, the mapping is fixed at compile time.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{
    Error,
    format::{format_history, format_saved_confirmation, format_summary},
    parser::TransactionParser,
    transaction::{
        NewTransaction, clear_transactions, create_transaction, get_recent_transactions,
        summarize_transactions,
    },
};

/// How many transactions the history command shows.
const HISTORY_LIMIT: i64 = 10;

const NO_TRANSACTIONS_SUMMARY: &str = "📊 No transactions yet. Start by adding one!";
const NO_TRANSACTIONS_HISTORY: &str = "📋 No transactions yet";
const CLEARED_REPLY: &str = "🗑️ All transactions cleared";
const PARSE_FAILURE_REPLY: &str =
    "❌ Could not parse transaction. Try: \"bought coffee for $5\" or type \"help\"";
const INVALID_TRANSACTION_REPLY: &str = "❌ Invalid transaction data. Please try again.";

const HELP_REPLY: &str = "📖 *Finance Tracker Help*\n\n\
    *Add transaction:*\n  \
    \"bought coffee for $5 at Starbucks\"\n  \
    \"spent $20 on groceries\"\n\n\
    *Commands:*\n  \
    \"summary\" - Show spending summary\n  \
    \"history\" - Show recent transactions\n  \
    \"clear\" - Clear all transactions\n  \
    \"help\" - Show this message";

/// The chat commands a message can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Show total spend, transaction count and category breakdown.
    Summary,
    /// Show the most recent transactions.
    History,
    /// Delete all of the user's transactions.
    Clear,
    /// Show the usage message.
    Help,
}

/// Match `text` against the known command literals and their aliases.
///
/// Matching is case-insensitive and ignores surrounding whitespace. `None`
/// means the message is a transaction description, not an error.
fn parse_command(text: &str) -> Option<Command> {
    match text.trim().to_lowercase().as_str() {
        "summary" | "total" => Some(Command::Summary),
        "history" | "list" => Some(Command::History),
        "clear" => Some(Command::Clear),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Process one incoming message and produce the reply text.
///
/// An absent or empty message yields an empty reply, which callers should
/// treat as "send nothing". Free text that matches no command is handed to
/// the transaction parser with its original casing.
///
/// # Errors
/// Returns an [Error] only for storage faults; parser failures become
/// conversational replies instead.
pub async fn handle_message(
    from: &str,
    text: Option<&str>,
    parser: &TransactionParser,
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<String, Error> {
    let Some(text) = text else {
        return Ok(String::new());
    };

    let text = text.trim();
    if text.is_empty() {
        return Ok(String::new());
    }

    match parse_command(text) {
        Some(Command::Summary) => {
            let connection = lock_connection(db_connection)?;
            summary_command(from, &connection)
        }
        Some(Command::History) => {
            let connection = lock_connection(db_connection)?;
            history_command(from, &connection)
        }
        Some(Command::Clear) => {
            let connection = lock_connection(db_connection)?;
            clear_command(from, &connection)
        }
        Some(Command::Help) => Ok(HELP_REPLY.to_owned()),
        None => record_transaction(from, text, parser, db_connection).await,
    }
}

fn summary_command(phone_number: &str, connection: &Connection) -> Result<String, Error> {
    let summary = summarize_transactions(phone_number, connection)?;

    if summary.transactions_count == 0 {
        return Ok(NO_TRANSACTIONS_SUMMARY.to_owned());
    }

    Ok(format_summary(&summary))
}

fn history_command(phone_number: &str, connection: &Connection) -> Result<String, Error> {
    let transactions = get_recent_transactions(phone_number, HISTORY_LIMIT, connection)?;

    if transactions.is_empty() {
        return Ok(NO_TRANSACTIONS_HISTORY.to_owned());
    }

    Ok(format_history(&transactions))
}

fn clear_command(phone_number: &str, connection: &Connection) -> Result<String, Error> {
    clear_transactions(phone_number, connection)?;

    Ok(CLEARED_REPLY.to_owned())
}

/// The fallback handler: extract a transaction from free text and store it.
async fn record_transaction(
    phone_number: &str,
    text: &str,
    parser: &TransactionParser,
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<String, Error> {
    let Some(parsed) = parser.parse(text).await else {
        return Ok(PARSE_FAILURE_REPLY.to_owned());
    };

    // The negated comparison also rejects NaN.
    if !(parsed.amount > 0.0) || parsed.item.is_empty() || parsed.category.is_empty() {
        tracing::error!("invalid parsed transaction: {parsed:?}");
        return Ok(INVALID_TRANSACTION_REPLY.to_owned());
    }

    let new_transaction = NewTransaction {
        phone_number: phone_number.to_owned(),
        amount: parsed.amount,
        item: parsed.item,
        category: parsed.category,
        store: parsed.store,
    };

    let transaction = {
        let connection = lock_connection(db_connection)?;
        create_transaction(new_transaction, &connection)?
    };

    Ok(format_saved_confirmation(&transaction))
}

fn lock_connection(
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

#[cfg(test)]
mod routing_tests {
    use super::{Command, parse_command};

    #[test]
    fn commands_match_case_insensitively_and_ignore_whitespace() {
        assert_eq!(parse_command("summary"), Some(Command::Summary));
        assert_eq!(parse_command("SUMMARY"), Some(Command::Summary));
        assert_eq!(parse_command(" Summary "), Some(Command::Summary));
        assert_eq!(parse_command("history"), Some(Command::History));
        assert_eq!(parse_command("\tHeLp\n"), Some(Command::Help));
    }

    #[test]
    fn aliases_map_to_their_commands() {
        assert_eq!(parse_command("total"), Some(Command::Summary));
        assert_eq!(parse_command("list"), Some(Command::History));
    }

    #[test]
    fn free_text_is_not_a_command() {
        assert_eq!(parse_command("bought coffee for $5"), None);
        assert_eq!(parse_command("summarize"), None);
        assert_eq!(parse_command("clear history"), None);
    }
}

#[cfg(test)]
mod handler_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::{
        db::initialize,
        parser::TransactionParser,
        transaction::{NewTransaction, create_transaction, summarize_transactions},
    };

    use super::{
        CLEARED_REPLY, HELP_REPLY, INVALID_TRANSACTION_REPLY, NO_TRANSACTIONS_HISTORY,
        NO_TRANSACTIONS_SUMMARY, PARSE_FAILURE_REPLY, handle_message,
    };

    fn get_test_connection() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    /// A parser whose endpoint does not exist. Tests that never hit the
    /// fallback handler should not care about the inference API.
    fn unused_parser() -> TransactionParser {
        TransactionParser::new("test-token".to_owned(), "http://127.0.0.1:9".to_owned())
    }

    fn seed_transaction(db_connection: &Arc<Mutex<Connection>>, amount: f64, item: &str, category: &str) {
        let connection = db_connection.lock().unwrap();
        create_transaction(
            NewTransaction {
                phone_number: "64123456789".to_owned(),
                amount,
                item: item.to_owned(),
                category: category.to_owned(),
                store: None,
            },
            &connection,
        )
        .expect("Could not create transaction");
    }

    async fn mock_parser_output(server: &MockServer, output: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/models/openai/o4-mini/predictions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"output": output})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn absent_or_blank_text_yields_empty_reply() {
        let db_connection = get_test_connection();
        let parser = unused_parser();

        let absent = handle_message("64123456789", None, &parser, &db_connection).await;
        let blank = handle_message("64123456789", Some("   "), &parser, &db_connection).await;

        assert_eq!(absent, Ok(String::new()));
        assert_eq!(blank, Ok(String::new()));
    }

    #[tokio::test]
    async fn summary_on_empty_user_replies_with_fixed_message() {
        let db_connection = get_test_connection();

        let reply = handle_message("64123456789", Some("summary"), &unused_parser(), &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, NO_TRANSACTIONS_SUMMARY);
    }

    #[tokio::test]
    async fn summary_renders_totals_and_alias_matches() {
        let db_connection = get_test_connection();
        seed_transaction(&db_connection, 5.5, "coffee", "food");
        seed_transaction(&db_connection, 45.0, "gas", "transport");
        let parser = unused_parser();

        let summary = handle_message("64123456789", Some("summary"), &parser, &db_connection)
            .await
            .unwrap();
        let total = handle_message("64123456789", Some("total"), &parser, &db_connection)
            .await
            .unwrap();

        assert!(summary.contains("💰 Total spent: $50.50"));
        assert!(summary.contains("📝 Transactions: 2"));
        assert!(summary.contains("• transport: $45.00 (1)"));
        assert!(summary.contains("• food: $5.50 (1)"));
        assert_eq!(summary, total);
    }

    #[tokio::test]
    async fn history_on_empty_user_replies_with_fixed_message() {
        let db_connection = get_test_connection();

        let reply = handle_message("64123456789", Some("history"), &unused_parser(), &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, NO_TRANSACTIONS_HISTORY);
    }

    #[tokio::test]
    async fn history_shows_at_most_ten_most_recent_transactions() {
        let db_connection = get_test_connection();
        for i in 1..=12 {
            seed_transaction(&db_connection, i as f64, &format!("item {i}"), "other");
        }

        let reply = handle_message("64123456789", Some("history"), &unused_parser(), &db_connection)
            .await
            .unwrap();

        assert_eq!(reply.matches('•').count(), 10);
        // Most recent first, the two oldest entries fall off.
        assert!(reply.contains("item 12"));
        assert!(!reply.contains("item 1 -"));
        assert!(!reply.contains("item 2 -"));
    }

    #[tokio::test]
    async fn clear_always_replies_with_confirmation() {
        let db_connection = get_test_connection();
        seed_transaction(&db_connection, 5.5, "coffee", "food");
        let parser = unused_parser();

        let first = handle_message("64123456789", Some("clear"), &parser, &db_connection)
            .await
            .unwrap();
        let second = handle_message("64123456789", Some("clear"), &parser, &db_connection)
            .await
            .unwrap();

        assert_eq!(first, CLEARED_REPLY);
        assert_eq!(second, CLEARED_REPLY);
        let connection = db_connection.lock().unwrap();
        let summary = summarize_transactions("64123456789", &connection).unwrap();
        assert_eq!(summary.transactions_count, 0);
    }

    #[tokio::test]
    async fn help_replies_with_usage_text() {
        let db_connection = get_test_connection();

        let reply = handle_message("64123456789", Some("help"), &unused_parser(), &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, HELP_REPLY);
    }

    #[tokio::test]
    async fn free_text_records_transaction_and_confirms() {
        let server = MockServer::start().await;
        mock_parser_output(
            &server,
            r#"{"amount": 5.5, "item": "coffee", "category": "Food", "store": "Starbucks"}"#,
        )
        .await;
        let db_connection = get_test_connection();
        let parser = TransactionParser::new("test-token".to_owned(), server.uri());

        let reply = handle_message(
            "64123456789",
            Some("bought coffee for $5.50 at Starbucks"),
            &parser,
            &db_connection,
        )
        .await
        .unwrap();

        assert_eq!(reply, "✅ Saved: coffee - $5.50 at Starbucks (food)");
        let connection = db_connection.lock().unwrap();
        let summary = summarize_transactions("64123456789", &connection).unwrap();
        assert_eq!(summary.transactions_count, 1);
        assert_eq!(summary.total_spent, 5.5);
        assert_eq!(summary.categories[0].category, "food");
    }

    #[tokio::test]
    async fn unparseable_text_replies_with_failure_and_stores_nothing() {
        let server = MockServer::start().await;
        mock_parser_output(&server, "Sorry, I have no idea what that was.").await;
        let db_connection = get_test_connection();
        let parser = TransactionParser::new("test-token".to_owned(), server.uri());

        let reply = handle_message("64123456789", Some("gibberish"), &parser, &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, PARSE_FAILURE_REPLY);
        let connection = db_connection.lock().unwrap();
        let summary = summarize_transactions("64123456789", &connection).unwrap();
        assert_eq!(summary.transactions_count, 0);
    }

    #[tokio::test]
    async fn parser_network_failure_replies_with_failure_message() {
        let db_connection = get_test_connection();

        let reply = handle_message(
            "64123456789",
            Some("bought coffee for $5"),
            &unused_parser(),
            &db_connection,
        )
        .await
        .unwrap();

        assert_eq!(reply, PARSE_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn non_positive_amount_replies_with_invalid_data_and_stores_nothing() {
        let server = MockServer::start().await;
        mock_parser_output(
            &server,
            r#"{"amount": -5, "item": "refund", "category": "other"}"#,
        )
        .await;
        let db_connection = get_test_connection();
        let parser = TransactionParser::new("test-token".to_owned(), server.uri());

        let reply = handle_message("64123456789", Some("refund me $5"), &parser, &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, INVALID_TRANSACTION_REPLY);
        let connection = db_connection.lock().unwrap();
        let summary = summarize_transactions("64123456789", &connection).unwrap();
        assert_eq!(summary.transactions_count, 0);
    }

    #[tokio::test]
    async fn commands_are_scoped_to_the_sender() {
        let db_connection = get_test_connection();
        seed_transaction(&db_connection, 5.5, "coffee", "food");

        let reply = handle_message("64000000000", Some("summary"), &unused_parser(), &db_connection)
            .await
            .unwrap();

        assert_eq!(reply, NO_TRANSACTIONS_SUMMARY);
    }
}
