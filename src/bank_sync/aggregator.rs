//! The seam between the app and the bank-data aggregator.

use std::fmt::Debug;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

/// A failed call to the bank-data aggregator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AggregatorError {
    /// The aggregator's error code, e.g. "ITEM_LOGIN_REQUIRED", or a local code such as
    /// "REQUEST_FAILED" when the aggregator could not be reached.
    pub code: String,
    /// A human readable description of the error.
    pub message: String,
}

impl AggregatorError {
    /// Create an error from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A short-lived token the client uses to open the aggregator's account linking flow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkToken {
    /// The token passed to the linking flow.
    pub link_token: String,
    /// When the token expires, as reported by the aggregator.
    pub expiration: String,
}

/// The long-lived credentials for a linked bank login (an "item").
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenExchange {
    /// The secret used for every later call about the item.
    pub access_token: String,
    /// The aggregator's ID for the item.
    pub item_id: String,
}

/// The balances the aggregator reports for an account.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct RemoteBalances {
    /// The current balance, or the amount owed for credit and loan accounts.
    #[serde(default)]
    pub current: Option<Decimal>,
    /// The credit limit of a credit account.
    #[serde(default)]
    pub limit: Option<Decimal>,
}

/// An account as reported by the aggregator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteAccount {
    /// The aggregator's ID for the account.
    pub account_id: String,
    /// The name of the account at the bank.
    pub name: String,
    /// The broad account type, e.g. "depository", "credit" or "loan".
    #[serde(rename = "type")]
    pub account_type: String,
    /// The narrower account type, e.g. "checking" or "mortgage".
    #[serde(default)]
    pub subtype: Option<String>,
    /// The last few digits of the account number.
    #[serde(default)]
    pub mask: Option<String>,
    /// The account's balances.
    #[serde(default)]
    pub balances: RemoteBalances,
}

/// A transaction as reported by the aggregator.
///
/// Positive amounts are money leaving the account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTransaction {
    /// The aggregator's ID for the transaction.
    pub transaction_id: String,
    /// The aggregator's ID for the account the transaction belongs to.
    pub account_id: String,
    /// When the transaction happened.
    pub date: Date,
    /// The description of the transaction.
    pub name: String,
    /// The signed amount, positive for money out.
    pub amount: Decimal,
    /// The merchant, if the aggregator recognised one.
    #[serde(default)]
    pub merchant_name: Option<String>,
    /// Whether the transaction has not settled yet.
    #[serde(default)]
    pub pending: bool,
}

/// The calls the app makes to a bank-data aggregator such as Plaid.
#[async_trait]
pub trait BankAggregator: Debug + Send + Sync {
    /// Create a token for starting the linking flow on behalf of `client_user_id`.
    async fn create_link_token(&self, client_user_id: &str) -> Result<LinkToken, AggregatorError>;

    /// Swap the public token returned by the linking flow for an access token.
    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<TokenExchange, AggregatorError>;

    /// List the accounts that belong to the item.
    async fn get_accounts(&self, access_token: &str) -> Result<Vec<RemoteAccount>, AggregatorError>;

    /// List the accounts of the item with freshly fetched balances.
    async fn get_balances(&self, access_token: &str) -> Result<Vec<RemoteAccount>, AggregatorError>;

    /// Fetch every transaction of `account_id` dated between `start_date` and `end_date`,
    /// inclusive.
    async fn get_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        start_date: Date,
        end_date: Date,
    ) -> Result<Vec<RemoteTransaction>, AggregatorError>;

    /// Revoke the access token and unlink the item.
    async fn remove_item(&self, access_token: &str) -> Result<(), AggregatorError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use super::{AggregatorError, RemoteAccount, RemoteTransaction};

    #[test]
    fn error_displays_code_and_message() {
        let error = AggregatorError::new("ITEM_LOGIN_REQUIRED", "the login details changed");

        assert_eq!(
            error.to_string(),
            "ITEM_LOGIN_REQUIRED: the login details changed"
        );
    }

    #[test]
    fn remote_account_tolerates_missing_fields() {
        let account: RemoteAccount = serde_json::from_str(
            r#"{"account_id": "abc", "name": "Checking", "type": "depository"}"#,
        )
        .unwrap();

        assert_eq!(account.account_type, "depository");
        assert_eq!(account.subtype, None);
        assert_eq!(account.balances.current, None);
    }

    #[test]
    fn remote_transaction_parses_date_and_amount() {
        let transaction: RemoteTransaction = serde_json::from_str(
            r#"{
                "transaction_id": "t1",
                "account_id": "abc",
                "date": "2025-03-14",
                "name": "Coffee",
                "amount": 4.5,
                "merchant_name": null
            }"#,
        )
        .unwrap();

        assert_eq!(transaction.date, date!(2025 - 03 - 14));
        assert_eq!(transaction.amount, Decimal::new(45, 1));
        assert!(!transaction.pending);
    }
}
