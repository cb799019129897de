//! A [BankAggregator] that talks to the Plaid API over HTTPS.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use time::Date;

use crate::{
    bank_sync::aggregator::{
        AggregatorError, BankAggregator, LinkToken, RemoteAccount, RemoteTransaction,
        TokenExchange,
    },
    config::PlaidConfig,
};

/// The most transactions Plaid returns per `/transactions/get` page.
const TRANSACTIONS_PAGE_SIZE: usize = 500;

/// A Plaid API client.
///
/// Every request is a JSON POST carrying the client ID and secret.
#[derive(Debug, Clone)]
pub struct PlaidClient {
    http: Client,
    config: PlaidConfig,
}

#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    error_code: String,
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<RemoteAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<RemoteTransaction>,
    total_transactions: usize,
}

#[derive(Debug, Serialize)]
struct TransactionsRequest<'a> {
    access_token: &'a str,
    start_date: Date,
    end_date: Date,
    options: TransactionsOptions<'a>,
}

#[derive(Debug, Serialize)]
struct TransactionsOptions<'a> {
    account_ids: [&'a str; 1],
    count: usize,
    offset: usize,
}

impl PlaidClient {
    /// Create a client for the environment in `config`.
    ///
    /// # Errors
    /// Returns an [AggregatorError] if the HTTP client cannot be built, e.g. when no TLS
    /// backend is available.
    pub fn new(config: PlaidConfig) -> Result<Self, AggregatorError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| AggregatorError::new("CLIENT_BUILD_FAILED", error.to_string()))?;

        Ok(Self { http, config })
    }

    /// POST `body` to `path`, adding the credentials, and parse the JSON response.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Serialize,
    ) -> Result<T, AggregatorError> {
        let mut body = serde_json::to_value(body)
            .map_err(|error| AggregatorError::new("INVALID_REQUEST", error.to_string()))?;
        if let Value::Object(fields) = &mut body {
            fields.insert("client_id".to_owned(), json!(self.config.client_id));
            fields.insert("secret".to_owned(), json!(self.config.secret));
        }

        let url = format!("{}{path}", self.config.environment.base_url());
        tracing::debug!("sending Plaid request to {url}");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|error| AggregatorError::new("REQUEST_FAILED", error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error = match response.json::<PlaidErrorBody>().await {
                Ok(body) => AggregatorError::new(body.error_code, body.error_message),
                Err(_) => {
                    AggregatorError::new("HTTP_ERROR", format!("Plaid responded with {status}"))
                }
            };
            tracing::warn!("Plaid request to {path} failed: {error}");
            return Err(error);
        }

        response
            .json::<T>()
            .await
            .map_err(|error| AggregatorError::new("INVALID_RESPONSE", error.to_string()))
    }
}

#[async_trait]
impl BankAggregator for PlaidClient {
    async fn create_link_token(&self, client_user_id: &str) -> Result<LinkToken, AggregatorError> {
        self.post(
            "/link/token/create",
            json!({
                "user": { "client_user_id": client_user_id },
                "client_name": self.config.client_name,
                "products": ["transactions"],
                "country_codes": ["US"],
                "language": "en",
            }),
        )
        .await
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<TokenExchange, AggregatorError> {
        self.post(
            "/item/public_token/exchange",
            json!({ "public_token": public_token }),
        )
        .await
    }

    async fn get_accounts(
        &self,
        access_token: &str,
    ) -> Result<Vec<RemoteAccount>, AggregatorError> {
        let response: AccountsResponse = self
            .post("/accounts/get", json!({ "access_token": access_token }))
            .await?;

        Ok(response.accounts)
    }

    async fn get_balances(
        &self,
        access_token: &str,
    ) -> Result<Vec<RemoteAccount>, AggregatorError> {
        let response: AccountsResponse = self
            .post(
                "/accounts/balance/get",
                json!({ "access_token": access_token }),
            )
            .await?;

        Ok(response.accounts)
    }

    async fn get_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        start_date: Date,
        end_date: Date,
    ) -> Result<Vec<RemoteTransaction>, AggregatorError> {
        let mut transactions = Vec::new();

        loop {
            let request = TransactionsRequest {
                access_token,
                start_date,
                end_date,
                options: TransactionsOptions {
                    account_ids: [account_id],
                    count: TRANSACTIONS_PAGE_SIZE,
                    offset: transactions.len(),
                },
            };
            let page: TransactionsResponse = self.post("/transactions/get", request).await?;
            let page_len = page.transactions.len();
            transactions.extend(page.transactions);

            if page_len == 0 || transactions.len() >= page.total_transactions {
                break;
            }
        }

        Ok(transactions)
    }

    async fn remove_item(&self, access_token: &str) -> Result<(), AggregatorError> {
        let _: Value = self
            .post("/item/remove", json!({ "access_token": access_token }))
            .await?;

        Ok(())
    }
}
