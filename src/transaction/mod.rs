//! Transaction storage: the persisted model, derived summaries and their
//! database queries.

mod core;

pub use core::{
    CategorySummary, DEFAULT_LIST_LIMIT, NewTransaction, Summary, Transaction, clear_transactions,
    create_transaction, create_transaction_table, get_recent_transactions, map_transaction_row,
    summarize_transactions,
};
