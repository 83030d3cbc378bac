//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row, named_params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId};

/// The number of transactions a listing returns when the caller does not ask
/// for anything narrower.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

// ============================================================================
// MODELS
// ============================================================================

/// A single recorded expense for one phone number.
///
/// Transactions are insert-only: once created they are never updated, only
/// deleted in bulk via [clear_transactions].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The phone number of the user that recorded this transaction.
    ///
    /// All queries are partitioned by this value, one user can never see
    /// another user's transactions.
    pub phone_number: String,
    /// The amount of money spent.
    pub amount: f64,
    /// A short description of what was bought.
    pub item: String,
    /// A lowercase spending category, e.g. "food" or "transport".
    pub category: String,
    /// The merchant name, when one was mentioned.
    pub store: Option<String>,
    /// When the transaction was recorded. Immutable after insertion.
    pub created_at: OffsetDateTime,
}

/// The data needed to record a new [Transaction].
///
/// The ID and creation timestamp are assigned by [create_transaction].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The phone number of the user recording the transaction.
    pub phone_number: String,
    /// The amount of money spent. Callers must have validated this is > 0.
    pub amount: f64,
    /// A short description of what was bought.
    pub item: String,
    /// A lowercase spending category.
    pub category: String,
    /// The merchant name, when one was mentioned.
    pub store: Option<String>,
}

/// A user's spending aggregates, computed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// The sum of all transaction amounts, 0.0 when there are none.
    pub total_spent: f64,
    /// How many transactions the user has recorded.
    pub transactions_count: i64,
    /// Per-category totals, ordered by total descending.
    ///
    /// Categories without any transactions are omitted rather than
    /// zero-filled.
    pub categories: Vec<CategorySummary>,
}

/// The spending aggregates for one category within a [Summary].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// The category name.
    pub category: String,
    /// The sum of amounts in this category.
    pub total: f64,
    /// How many transactions fall in this category.
    pub count: i64,
}

// ============================================================================
// QUERIES
// ============================================================================

/// Record a new transaction, assigning its ID and creation timestamp.
///
/// # Errors
/// Returns an [Error::SqlError] if the underlying write fails.
pub fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let created_at = OffsetDateTime::now_utc();

    let transaction = connection
        .prepare(
            "INSERT INTO transactions (phone_number, amount, item, category, store, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, phone_number, amount, item, category, store, created_at",
        )?
        .query_row(
            (
                new_transaction.phone_number,
                new_transaction.amount,
                new_transaction.item,
                new_transaction.category,
                new_transaction.store,
                created_at,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve up to `limit` of a user's transactions, most recent first.
///
/// Ties on the creation timestamp are broken by descending ID so the order is
/// total. An empty vector is returned if the user has no transactions.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_recent_transactions(
    phone_number: &str,
    limit: i64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, phone_number, amount, item, category, store, created_at
             FROM transactions
             WHERE phone_number = :phone_number
             ORDER BY created_at DESC, id DESC
             LIMIT :limit",
        )?
        .query_map(
            named_params! {":phone_number": phone_number, ":limit": limit},
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

/// Compute a user's [Summary]: total spent, transaction count and
/// per-category aggregates ordered by total descending.
///
/// A user without transactions gets a summary of zeroes and no categories.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn summarize_transactions(
    phone_number: &str,
    connection: &Connection,
) -> Result<Summary, Error> {
    let (total_spent, transactions_count) = connection
        .prepare("SELECT SUM(amount), COUNT(*) FROM transactions WHERE phone_number = :phone_number")?
        .query_row(named_params! {":phone_number": phone_number}, |row| {
            // SUM over zero rows is NULL.
            Ok((
                row.get::<_, Option<f64>>(0)?.unwrap_or(0.0),
                row.get::<_, i64>(1)?,
            ))
        })?;

    let categories = connection
        .prepare(
            "SELECT category, SUM(amount) AS total, COUNT(*) AS count
             FROM transactions
             WHERE phone_number = :phone_number
             GROUP BY category
             ORDER BY total DESC",
        )?
        .query_map(named_params! {":phone_number": phone_number}, |row| {
            Ok(CategorySummary {
                category: row.get(0)?,
                total: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .map(|maybe_category| maybe_category.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Summary {
        total_spent,
        transactions_count,
        categories,
    })
}

/// Delete every transaction belonging to `phone_number`.
///
/// Clearing a user that has no transactions succeeds silently.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn clear_transactions(phone_number: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM transactions WHERE phone_number = :phone_number",
        named_params! {":phone_number": phone_number},
    )?;

    Ok(())
}

/// Create the table that stores transactions.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_number TEXT NOT NULL,
                amount REAL NOT NULL,
                item TEXT NOT NULL,
                category TEXT NOT NULL,
                store TEXT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Map a row from the transactions table to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        amount: row.get(2)?,
        item: row.get(3)?,
        category: row.get(4)?,
        store: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
