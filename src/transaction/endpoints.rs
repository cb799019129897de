//! The JSON endpoints for listing, creating and editing transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::TransactionId,
    transaction::{
        TransactionFilter, TransactionForm, create_transaction, delete_transaction,
        get_transaction, list_transactions, update_transaction,
    },
};

/// The state needed by the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns a filtered page of the user's transactions.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(filter): Query<TransactionFilter>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match list_transactions(user_id, &filter, &connection) {
        Ok(page) => Json(page).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<TransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = form
        .validate(user_id, &connection)
        .and_then(|builder| create_transaction(user_id, builder, &connection));

    match result {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that returns one of the user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_transaction(transaction_id, user_id, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for overwriting a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(form): Json<TransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = form
        .validate(user_id, &connection)
        .and_then(|builder| update_transaction(transaction_id, user_id, builder, &connection));

    match result {
        Ok(transaction) => Json(transaction).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_transaction(transaction_id, user_id, &connection) {
        Ok(()) => Json(json!({ "message": "Transaction deleted successfully" })).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};

    use crate::{
        AppState,
        account::{AccountDetails, Accountable},
        auth::UserID,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, get_test_state, insert_test_account, insert_test_user},
    };

    use super::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    };

    fn router() -> Router<AppState> {
        Router::new()
            .route(
                endpoints::TRANSACTIONS_API,
                get(get_transactions_endpoint).post(create_transaction_endpoint),
            )
            .route(
                endpoints::TRANSACTION,
                get(get_transaction_endpoint)
                    .put(update_transaction_endpoint)
                    .delete(delete_transaction_endpoint),
            )
    }

    fn setup() -> (AppState, UserID, Accountable) {
        let state = get_test_state();
        let (user, account) = {
            let connection = state.db_connection.lock().unwrap();
            let user = insert_test_user(&connection);
            let account = insert_test_account(
                user.id,
                AccountDetails::CashAccount {
                    subtype: "checking".to_owned(),
                    account_number: None,
                    balance: Decimal::ZERO,
                },
                &connection,
            );
            (user, account.accountable())
        };

        (state, user.id, account)
    }

    #[tokio::test]
    async fn create_then_list_transaction() {
        let (state, user_id, account) = setup();
        let server = get_test_server(router(), state, user_id);

        let response = server
            .post(endpoints::TRANSACTIONS_API)
            .json(&json!({
                "account": account,
                "amount": "12.30",
                "date": "2025-04-01",
                "name": "Lunch",
                "direction": "debit"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created = response.json::<Value>();
        assert_eq!(created["direction"], "expense");
        assert_eq!(created["amount"], "12.30");

        let page = server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("direction", "expense")
            .await
            .json::<Value>();
        assert_eq!(page["total"], 1);
        assert_eq!(page["transactions"][0]["name"], "Lunch");
    }

    #[tokio::test]
    async fn update_and_delete_transaction() {
        let (state, user_id, account) = setup();
        let server = get_test_server(router(), state, user_id);
        let id = server
            .post(endpoints::TRANSACTIONS_API)
            .json(&json!({
                "account": account,
                "amount": 5,
                "date": "2025-04-01",
                "name": "Coffee",
                "direction": "expense"
            }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        let updated = server
            .put(&format_endpoint(endpoints::TRANSACTION, id))
            .json(&json!({
                "account": account,
                "amount": 6,
                "date": "2025-04-02",
                "name": "Flat white",
                "direction": "expense",
                "reconciled": true
            }))
            .await
            .json::<Value>();
        assert_eq!(updated["name"], "Flat white");
        assert_eq!(updated["reconciled"], true);

        server
            .delete(&format_endpoint(endpoints::TRANSACTION, id))
            .await
            .assert_status_ok();
        server
            .get(&format_endpoint(endpoints::TRANSACTION, id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_transaction_is_not_found() {
        let (state, owner_id, account) = setup();
        let intruder = insert_test_user(&state.db_connection.lock().unwrap());
        let owner_server = get_test_server(router(), state.clone(), owner_id);
        let id = owner_server
            .post(endpoints::TRANSACTIONS_API)
            .json(&json!({
                "account": account,
                "amount": 5,
                "date": "2025-04-01",
                "name": "Coffee",
                "direction": "expense"
            }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();
        let server = get_test_server(router(), state, intruder.id);

        server
            .get(&format_endpoint(endpoints::TRANSACTION, id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format_endpoint(endpoints::TRANSACTION, id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
