//! Importing a batch of transactions for one account.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    Error,
    auth::UserID,
    rule::{apply_rules, get_account_rules},
    transaction::{ImportRequest, Transaction, create_transaction, endpoints::TransactionState},
};

/// A route handler that stores a batch of transactions for one of the user's accounts.
///
/// The account's rules rename the rows and categorise rows that arrive without a category.
pub async fn import_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<ImportRequest>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match import_transactions(request, user_id, &connection) {
        Ok(transactions) => (
            StatusCode::CREATED,
            Json(json!({
                "imported": transactions.len(),
                "transactions": transactions,
            })),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

/// Validate and store a batch in one SQL transaction, creating exactly one transaction per row.
///
/// # Errors
/// Returns a validation error if any row is invalid, in which case nothing is stored.
pub fn import_transactions(
    request: ImportRequest,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let account = request.account;
    let builders = request.validate(user_id, connection)?;
    let rules = get_account_rules(account, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;
    let mut imported = Vec::with_capacity(builders.len());

    for mut builder in builders {
        if let Some(outcome) = apply_rules(&rules, &builder.name, builder.category_id, false) {
            builder.name = outcome.name;
            builder.category_id = outcome.category_id;
        }

        imported.push(create_transaction(user_id, builder, &sql_transaction)?);
    }

    sql_transaction.commit()?;
    tracing::info!("Imported {} transactions into {account}", imported.len());

    Ok(imported)
}
