//! Renders query results into the reply text sent back over WhatsApp.
//!
//! Everything in this module is a pure function from data to display text.
//! Ordering is inherited from the store (summary categories by descending
//! total, history by descending recency), nothing here re-sorts.

use time::{Date, Month};

use crate::transaction::{Summary, Transaction};

/// Render a non-empty [Summary] as the reply to the summary command.
pub fn format_summary(summary: &Summary) -> String {
    let mut response = String::from("📊 *Summary*\n\n");
    response.push_str(&format!("💰 Total spent: ${:.2}\n", summary.total_spent));
    response.push_str(&format!("📝 Transactions: {}\n\n", summary.transactions_count));

    if !summary.categories.is_empty() {
        response.push_str("*Categories:*\n");
        for category in &summary.categories {
            response.push_str(&format!(
                "• {}: ${:.2} ({})\n",
                category.category, category.total, category.count
            ));
        }
    }

    response
}

/// Render a non-empty transaction list as the reply to the history command.
pub fn format_history(transactions: &[Transaction]) -> String {
    let mut response = String::from("📋 *Recent Transactions*\n\n");

    for transaction in transactions {
        response.push_str(&format!(
            "• {} - ${:.2} ({})",
            transaction.item, transaction.amount, transaction.category
        ));
        if let Some(store) = &transaction.store {
            response.push_str(&format!(" @ {store}"));
        }
        response.push_str(&format!("\n  {}\n\n", format_date(transaction.created_at.date())));
    }

    response
}

/// Render the confirmation reply for a newly recorded transaction.
pub fn format_saved_confirmation(transaction: &Transaction) -> String {
    let mut response = format!("✅ Saved: {} - ${:.2}", transaction.item, transaction.amount);
    if let Some(store) = &transaction.store {
        response.push_str(&format!(" at {store}"));
    }
    response.push_str(&format!(" ({})", transaction.category));

    response
}

/// Format a date like "06 Aug 2026".
fn format_date(date: Date) -> String {
    format!("{:02} {} {}", date.day(), month_abbrev(date.month()), date.year())
}

fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}
