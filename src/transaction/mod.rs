//! Transaction management for the budgeting application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - The JSON endpoints for listing, editing and importing transactions

mod core;
mod endpoints;
mod form;
mod import;
mod query;

pub use core::{
    Direction, Transaction, TransactionBuilder, create_transaction, create_transaction_table,
    delete_transaction, external_id_exists, get_account_transactions, get_transaction,
    get_transactions_in_range, set_name_and_category, update_transaction,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
pub use form::{ImportRequest, TransactionForm};
pub use import::import_transactions_endpoint;
pub use query::{TransactionFilter, list_transactions};
