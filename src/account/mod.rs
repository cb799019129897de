//! Cash accounts, credit cards and loans.

mod core;
mod db;
mod endpoints;

pub use core::{
    AccountDetails, AccountKind, Accountable, ConnectionType, ExternalConnection, NewAccount,
    SyncStatus,
};
pub use db::{
    BalanceUpdate, account_exists, clear_external_connection, create_account_tables, get_account,
    insert_account, list_accounts, mark_sync_failed, mark_sync_succeeded, mark_syncing,
    update_balance,
};
pub use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint, get_accounts_endpoint,
    update_account_endpoint,
};

#[cfg(test)]
pub(crate) use core::Account;
