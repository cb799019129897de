//! Linking accounts to a bank-data aggregator (Plaid) and syncing their balances and
//! transactions.

mod aggregator;
mod endpoints;
mod plaid;
mod sync;

pub use aggregator::{
    AggregatorError, BankAggregator, LinkToken, RemoteAccount, RemoteBalances, RemoteTransaction,
    TokenExchange,
};
pub use endpoints::{
    create_link_token_endpoint, disconnect_endpoint, exchange_token_endpoint, sync_balance_endpoint,
    sync_transactions_endpoint,
};
pub use plaid::PlaidClient;
