//! Route handlers for linking and syncing accounts with the bank-data aggregator.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;

use crate::{
    AppState,
    account::{AccountKind, Accountable},
    auth::UserID,
    bank_sync::{
        aggregator::BankAggregator,
        sync::{
            BalanceSync, InstitutionMetadata, disconnect, exchange_token, resolve_sync_range,
            sync_balance, sync_transactions,
        },
    },
    database_id::AccountId,
    timezone::local_today,
};

/// The state needed for talking to the bank-data aggregator.
#[derive(Debug, Clone)]
pub struct BankSyncState {
    /// The database connection for reading and updating accounts.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The client for the bank-data aggregator.
    pub aggregator: Arc<dyn BankAggregator>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for BankSyncState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            aggregator: state.aggregator.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The institution details sent by the linking flow.
#[derive(Debug, Default, Deserialize)]
pub struct InstitutionData {
    /// The aggregator's ID for the institution.
    #[serde(default)]
    pub institution_id: Option<String>,
    /// The display name of the institution.
    #[serde(default)]
    pub name: Option<String>,
}

/// The metadata sent by the linking flow.
#[derive(Debug, Default, Deserialize)]
pub struct LinkMetadata {
    /// The institution the user linked.
    #[serde(default)]
    pub institution: InstitutionData,
}

/// The request body for exchanging a public token.
#[derive(Debug, Deserialize)]
pub struct ExchangeTokenRequest {
    /// The public token returned by the linking flow.
    pub public_token: String,
    /// What the linking flow reported about the institution.
    #[serde(default)]
    pub metadata: LinkMetadata,
}

/// The request body naming a connected account.
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    /// The kind of account.
    pub account_type: AccountKind,
    /// The ID of the account within its kind.
    pub account_id: AccountId,
}

impl AccountRequest {
    fn accountable(&self) -> Accountable {
        Accountable::new(self.account_type, self.account_id)
    }
}

/// The request body for syncing an account's transactions.
#[derive(Debug, Deserialize)]
pub struct SyncTransactionsRequest {
    /// The kind of account.
    pub account_type: AccountKind,
    /// The ID of the account within its kind.
    pub account_id: AccountId,
    /// The earliest date to sync, defaults to 30 days ago.
    #[serde(default)]
    pub start_date: Option<Date>,
    /// The latest date to sync, defaults to today.
    #[serde(default)]
    pub end_date: Option<Date>,
}

#[derive(Serialize)]
struct BalanceSyncResponse {
    message: &'static str,
    #[serde(flatten)]
    sync: BalanceSync,
}

/// A route handler that creates a token for opening the aggregator's linking flow.
pub async fn create_link_token_endpoint(
    State(state): State<BankSyncState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    match state
        .aggregator
        .create_link_token(&user_id.to_string())
        .await
    {
        Ok(token) => Json(json!({
            "link_token": token.link_token,
            "expiration": token.expiration,
        }))
        .into_response(),
        Err(error) => {
            tracing::error!("could not create link token for user {user_id}: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create Link token" })),
            )
                .into_response()
        }
    }
}

/// A route handler that finishes linking a bank login and creates its accounts.
pub async fn exchange_token_endpoint(
    State(state): State<BankSyncState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<ExchangeTokenRequest>,
) -> Response {
    let institution = InstitutionMetadata {
        institution_id: request.metadata.institution.institution_id,
        name: request.metadata.institution.name,
    };

    match exchange_token(
        &request.public_token,
        institution,
        user_id,
        state.aggregator.as_ref(),
        &state.db_connection,
    )
    .await
    {
        Ok(accounts) => Json(json!({
            "message": "Accounts connected successfully",
            "accounts": accounts,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that refreshes a connected account's balance.
pub async fn sync_balance_endpoint(
    State(state): State<BankSyncState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<AccountRequest>,
) -> Response {
    match sync_balance(
        request.accountable(),
        user_id,
        state.aggregator.as_ref(),
        &state.db_connection,
    )
    .await
    {
        Ok(synced) => Json(BalanceSyncResponse {
            message: "Balance synced successfully",
            sync: synced,
        })
        .into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that imports a connected account's transactions for a date range.
pub async fn sync_transactions_endpoint(
    State(state): State<BankSyncState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<SyncTransactionsRequest>,
) -> Response {
    let range = match local_today(&state.local_timezone)
        .and_then(|today| resolve_sync_range(request.start_date, request.end_date, today))
    {
        Ok(range) => range,
        Err(error) => return error.into_response(),
    };

    match sync_transactions(
        Accountable::new(request.account_type, request.account_id),
        range,
        user_id,
        state.aggregator.as_ref(),
        &state.db_connection,
    )
    .await
    {
        Ok(counts) => Json(json!({
            "message": "Transactions synced successfully",
            "imported": counts.imported,
            "skipped": counts.skipped,
            "total": counts.total,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that unlinks an account from its bank login.
pub async fn disconnect_endpoint(
    State(state): State<BankSyncState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<AccountRequest>,
) -> Response {
    match disconnect(
        request.accountable(),
        user_id,
        state.aggregator.as_ref(),
        &state.db_connection,
    )
    .await
    {
        Ok(()) => Json(json!({ "message": "Account disconnected successfully" })).into_response(),
        Err(error) => error.into_response(),
    }
}
